use std::collections::HashMap;
use std::path::Path;

use handeye_core::{CalibError, CalibResult, ImageDetections, ImageSize, Pt2, Real, ViewTag};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{file_name, has_extension, list_files_sorted};

/// File extensions treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm", "ppm"];

/// Target detected in one image, points in target-model order.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub image_size: ImageSize,
    pub points: Vec<Pt2>,
}

/// Source of target detections for image files.
pub trait PatternDetector {
    /// Detect the target in `path`. `Ok(None)` means the pattern was not found.
    fn detect(&self, path: &Path) -> CalibResult<Option<Detection>>;
}

/// Detection record of one image in a precomputed detections file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEntry {
    pub width: u32,
    pub height: u32,
    /// `null` when the detector found no pattern.
    pub points: Option<Vec<[Real; 2]>>,
}

/// Detector backed by a JSON file produced by an external corner/circle detector:
///
/// ```json
/// { "images": { "0001.png": { "width": 640, "height": 480, "points": [[u, v], ...] } } }
/// ```
///
/// Images are looked up by file name; an image without an entry has no detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedDetections {
    pub images: HashMap<String, DetectionEntry>,
}

impl PrecomputedDetections {
    pub fn from_json_str(json: &str, source_name: &str) -> CalibResult<Self> {
        serde_json::from_str(json).map_err(|e| CalibError::input_format(source_name, e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> CalibResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| CalibError::io(path, e))?;
        let detections = Self::from_json_str(&json, &path.display().to_string())?;
        debug!(
            "loaded detections for {} images from {}",
            detections.images.len(),
            path.display()
        );
        Ok(detections)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: DetectionEntry) {
        self.images.insert(name.into(), entry);
    }
}

impl PatternDetector for PrecomputedDetections {
    fn detect(&self, path: &Path) -> CalibResult<Option<Detection>> {
        let Some(entry) = file_name(path).and_then(|name| self.images.get(name)) else {
            return Ok(None);
        };
        Ok(entry.points.as_ref().map(|pts| Detection {
            image_size: ImageSize::new(entry.width, entry.height),
            points: pts.iter().map(|&[u, v]| Pt2::new(u, v)).collect(),
        }))
    }
}

/// Run `detector` over the images of `dir` in lexical-numeric order.
///
/// # Errors
///
/// - [`CalibError::InputFormat`] if the directory holds no image files.
/// - [`CalibError::DetectionFailure`] on the first image without a detection.
/// - [`CalibError::DimensionMismatch`] if an image differs in size from the first.
pub fn load_image_detections<D: PatternDetector + ?Sized>(
    dir: &Path,
    detector: &D,
) -> CalibResult<Vec<ImageDetections>> {
    let files = list_files_sorted(dir, |p| has_extension(p, IMAGE_EXTENSIONS))?;
    if files.is_empty() {
        return Err(CalibError::input_format(
            dir.display().to_string(),
            "no image files found",
        ));
    }

    let mut out: Vec<ImageDetections> = Vec::with_capacity(files.len());
    for (index, (path, key)) in files.into_iter().enumerate() {
        let Some(detection) = detector.detect(&path)? else {
            return Err(CalibError::DetectionFailure { file: path });
        };
        if let Some(first) = out.first() {
            if detection.image_size != first.image_size {
                return Err(CalibError::DimensionMismatch {
                    file: path,
                    expected: first.image_size.as_tuple(),
                    found: detection.image_size.as_tuple(),
                });
            }
        }
        let name = file_name(&path).unwrap_or_default().to_string();
        debug!("{name}: {} points", detection.points.len());
        out.push(ImageDetections::new(
            ViewTag::new(index, key, name),
            detection.image_size,
            detection.points,
        ));
    }
    info!("detected the target in {} images of {}", out.len(), dir.display());
    Ok(out)
}
