//! Loaders for the on-disk hand-eye dataset layouts.
//!
//! Two layouts are supported:
//! - **Koide** (`st_handeye_eval`): one directory with the images and one
//!   `*.csv` file per capture holding the 4×4 hand pose.
//! - **Tabb** (RWHEC): `calibration_object.txt`, `robot_cali.txt` with every
//!   hand pose, and the images under `images/camera<ID>/`.
//!
//! Files are processed in lexical-numeric order (see [`natural_key`]); that
//! order defines the view index of every loaded item.

mod images;
mod object;
mod poses;

use std::path::{Path, PathBuf};

use handeye_core::{CalibError, CalibResult};

pub use images::{
    load_image_detections, Detection, DetectionEntry, PatternDetector, PrecomputedDetections,
    IMAGE_EXTENSIONS,
};
pub use object::{read_tabb_object, TabbObject};
pub use poses::{load_koide_poses, load_tabb_poses, parse_tabb_poses, TaggedPose};

/// Integer formed by all decimal digits of `name`, in order.
///
/// `"img_0012.png"` gives `12`, `"a1b2"` gives `12`. Names without digits (or
/// with more digits than fit a `u64`) give `None`.
pub fn natural_key(name: &str) -> Option<u64> {
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Files of `dir` accepted by `keep`, in lexical-numeric order.
///
/// Files with a key come first, ordered by key then name; the rest follow by name.
pub(crate) fn list_files_sorted(
    dir: &Path,
    keep: impl Fn(&Path) -> bool,
) -> CalibResult<Vec<(PathBuf, Option<u64>)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| CalibError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CalibError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() || !keep(&path) {
            continue;
        }
        let key = file_name(&path).and_then(natural_key);
        files.push((path, key));
    }
    files.sort_by(|(pa, ka), (pb, kb)| {
        let order = match (ka, kb) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        order.then_with(|| pa.file_name().cmp(&pb.file_name()))
    });
    Ok(files)
}

pub(crate) fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_key_concatenates_digits() {
        assert_eq!(natural_key("img_0012.png"), Some(12));
        assert_eq!(natural_key("a1b2.csv"), Some(12));
        assert_eq!(natural_key("camera.png"), None);
        assert_eq!(natural_key("99999999999999999999999.png"), None);
    }

    #[test]
    fn listing_orders_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10.csv", "9.csv", "100.csv", "notes.txt", "b.csv", "a.csv"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let files = list_files_sorted(dir.path(), |p| has_extension(p, &["csv"])).unwrap();
        let names: Vec<_> = files.iter().map(|(p, _)| file_name(p).unwrap()).collect();
        assert_eq!(names, ["9.csv", "10.csv", "100.csv", "a.csv", "b.csv"]);
        assert_eq!(files[1].1, Some(10));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let err = list_files_sorted(Path::new("/nonexistent/handeye"), |_| true).unwrap_err();
        assert!(matches!(err, CalibError::Io { .. }));
    }
}
