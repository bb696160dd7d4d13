//! Deterministic synthetic data generation helpers.
//!
//! This module provides small, reusable building blocks for constructing
//! synthetic calibration problems used in tests and examples:
//! - pose generators that keep a planar target in front of the camera,
//! - projection helpers producing tagged [`crate::ImageDetections`].
//!
//! The helpers are deterministic (stable point ordering, no randomness).
//!
//! # Example
//!
//! ```
//! use handeye_core::{
//!     synthetic::planar, BrownConrady5, CameraModel, FxFyCxCySkew, ImageSize, PatternGeometry,
//!     PatternKind, TargetModel,
//! };
//!
//! let k = FxFyCxCySkew { fx: 800.0, fy: 800.0, cx: 640.0, cy: 360.0, skew: 0.0 };
//! let cam = CameraModel::new(ImageSize::new(1280, 720), k, BrownConrady5::zero());
//!
//! let model = TargetModel::from_geometry(&PatternGeometry::new(6, 5, 0.04, PatternKind::Chessboard));
//! let poses = planar::poses_around_target(&model, 5, 0.6);
//! let views = planar::project_views_all(&cam, &model, &poses).unwrap();
//! assert_eq!(views.len(), 5);
//! ```

pub mod planar;
