use std::path::Path;

use handeye_core::{CalibError, CalibResult, Real, RigidPose, ViewTag};
use log::{debug, info};

use super::{file_name, has_extension, list_files_sorted};

/// A hand pose together with the capture it belongs to.
pub type TaggedPose = (ViewTag, RigidPose);

fn parse_numbers(text: &str, source_name: &str) -> CalibResult<Vec<Real>> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<Real>().map_err(|_| {
                CalibError::input_format(source_name, format!("'{tok}' is not a number"))
            })
        })
        .collect()
}

/// Read every `*.csv` pose file of a Koide-layout directory.
///
/// Each file holds the 16 entries of a row-major 4×4 homogeneous transform.
/// Poses are returned in lexical-numeric file order.
pub fn load_koide_poses(dir: &Path) -> CalibResult<Vec<TaggedPose>> {
    let files = list_files_sorted(dir, |p| has_extension(p, &["csv"]))?;
    if files.is_empty() {
        return Err(CalibError::input_format(
            dir.display().to_string(),
            "no *.csv pose files found",
        ));
    }

    let mut poses = Vec::with_capacity(files.len());
    for (index, (path, key)) in files.into_iter().enumerate() {
        let name = file_name(&path).unwrap_or_default().to_string();
        let text = std::fs::read_to_string(&path).map_err(|e| CalibError::io(&path, e))?;
        let values = parse_numbers(&text, &name)?;
        let pose = RigidPose::from_row_major(&values, &name)?;
        debug!("pose {index} from {name}");
        poses.push((ViewTag::new(index, key, name), pose));
    }
    info!("read {} hand poses from {}", poses.len(), dir.display());
    Ok(poses)
}

/// Parse the contents of a Tabb `robot_cali.txt`.
///
/// The first line holds the pose count; 4×4 row-major blocks follow, separated
/// by blank lines. A final block without a trailing blank line is accepted.
pub fn parse_tabb_poses(text: &str, source_name: &str) -> CalibResult<Vec<TaggedPose>> {
    let mut lines = text.lines().map(str::trim).skip_while(|l| l.is_empty());
    let header = lines
        .next()
        .ok_or_else(|| CalibError::input_format(source_name, "empty file"))?;
    let declared: usize = header.parse().map_err(|_| {
        CalibError::input_format(source_name, format!("pose count '{header}' is not an integer"))
    })?;

    let mut blocks: Vec<Vec<Real>> = Vec::new();
    let mut current: Vec<Real> = Vec::new();
    for line in lines {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.extend(parse_numbers(line, source_name)?);
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    if blocks.len() != declared {
        return Err(CalibError::input_format(
            source_name,
            format!("header declares {declared} poses, found {}", blocks.len()),
        ));
    }

    blocks
        .iter()
        .enumerate()
        .map(|(index, values)| {
            let block_name = format!("{source_name}#{index}");
            let pose = RigidPose::from_row_major(values, &block_name)?;
            Ok((ViewTag::positional(index, block_name), pose))
        })
        .collect()
}

/// Read a Tabb `robot_cali.txt` file.
pub fn load_tabb_poses(path: &Path) -> CalibResult<Vec<TaggedPose>> {
    let text = std::fs::read_to_string(path).map_err(|e| CalibError::io(path, e))?;
    let name = file_name(path).unwrap_or("robot_cali.txt");
    let poses = parse_tabb_poses(&text, name)?;
    info!("read {} hand poses from {}", poses.len(), path.display());
    Ok(poses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use handeye_core::Vec3;

    const ROT_Z_90: &str = "0 -1 0 0.5\n1 0 0 -0.25\n0 0 1 1.0\n0 0 0 1\n";

    #[test]
    fn parses_blocks_with_and_without_trailing_blank() {
        let text = format!("2\n{ROT_Z_90}\n1 0 0 0\n0 1 0 0\n0 0 1 2\n0 0 0 1");
        let poses = parse_tabb_poses(&text, "robot_cali.txt").unwrap();
        assert_eq!(poses.len(), 2);
        assert_relative_eq!(
            poses[0].1.rvec,
            Vec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            epsilon = 1e-12
        );
        assert_relative_eq!(poses[0].1.tvec, Vec3::new(0.5, -0.25, 1.0));
        assert_eq!(poses[1].1.tvec.z, 2.0);
        assert_eq!(poses[1].0.source, "robot_cali.txt#1");
        assert_eq!(poses[1].0.key, None);
    }

    #[test]
    fn count_mismatch_is_input_format() {
        let text = format!("3\n{ROT_Z_90}\n{ROT_Z_90}\n");
        let err = parse_tabb_poses(&text, "robot_cali.txt").unwrap_err();
        assert!(matches!(err, CalibError::InputFormat { .. }), "{err}");
    }

    #[test]
    fn rejects_short_block_and_garbage() {
        let err = parse_tabb_poses("1\n1 0 0\n0 1 0\n", "r.txt").unwrap_err();
        assert!(matches!(err, CalibError::InputFormat { .. }));
        let err = parse_tabb_poses("1\n1 0 x 0\n", "r.txt").unwrap_err();
        assert!(err.to_string().contains("'x'"));
        let err = parse_tabb_poses("two\n", "r.txt").unwrap_err();
        assert!(matches!(err, CalibError::InputFormat { .. }));
    }
}
