//! Dataset preparation pipeline for hand-eye calibration.
//!
//! - [`dataset`]: pose, metadata and detection loaders for the Koide and Tabb layouts,
//! - [`IntrinsicCalibrationSolver`]: camera intrinsics and per-view target poses
//!   from a [`handeye_core::CorrespondenceSet`],
//! - [`CalibrationRecordAssembler`]: joins detections, hand poses and target
//!   poses into the serialized [`CalibrationRecord`].
//!
//! ```no_run
//! use std::path::Path;
//! use handeye_core::{CorrespondenceSet, PatternGeometry, PatternKind, TargetModel};
//! use handeye_pipeline::dataset::{load_image_detections, load_koide_poses, PrecomputedDetections};
//! use handeye_pipeline::{CalibrationRecordAssembler, IntrinsicCalibrationSolver, SolverConfig};
//!
//! # fn main() -> handeye_core::CalibResult<()> {
//! let dir = Path::new("dataset");
//! let detector = PrecomputedDetections::from_json_file(&dir.join("detections.json"))?;
//! let model = TargetModel::from_geometry(&PatternGeometry::new(4, 11, 0.016, PatternKind::AsymmetricCircles));
//! let detections = load_image_detections(dir, &detector)?;
//! let wth = load_koide_poses(dir)?;
//!
//! let set = CorrespondenceSet::new(model.clone(), detections)?;
//! let solution = IntrinsicCalibrationSolver::new(SolverConfig::default()).solve(&set)?;
//! let record = CalibrationRecordAssembler.from_solution(solution, model, set.into_views(), wth)?;
//! record.write_json(Path::new("out.json"))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dataset;
pub mod record;
pub mod solver;

pub use config::{BackendKind, SolverConfig};
pub use record::{
    assemble, CalibrationRecord, CalibrationRecordAssembler, RecordDocument, View,
};
pub use solver::{calibrate_intrinsics, CalibrationSolution, IntrinsicCalibrationSolver};
