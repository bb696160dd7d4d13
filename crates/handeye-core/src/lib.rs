//! Core math and geometry primitives for `handeye-prep`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, ...),
//! - the planar target description and its canonical 3D model,
//! - the pose codec (rotation matrix <-> axis-angle, 4×4 <-> 6-parameter pose),
//! - the pinhole camera model with Brown–Conrady distortion,
//! - the tagged correspondence set consumed by the intrinsics solver,
//! - the error taxonomy shared by every stage of the pipeline.
//!
//! Camera pipeline:
//! `pixel = K ∘ distortion ∘ pinhole(cam_from_target * p_target)`

/// Error taxonomy and non-fatal warnings.
pub mod error;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Camera models and distortion utilities.
pub mod models;
/// Calibration pattern geometry and target model.
pub mod pattern;
/// Rotation and rigid-pose encodings.
pub mod pose;
/// Deterministic synthetic data for tests and demos.
pub mod synthetic;
/// Tagged 2D detections and correspondence sets.
pub mod types;

pub use error::*;
pub use math::*;
pub use models::*;
pub use pattern::*;
pub use pose::*;
pub use types::*;
