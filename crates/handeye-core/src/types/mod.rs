//! Observation types for calibration data.
//!
//! This module provides the tagged per-view detections produced by loaders and
//! the correspondence set that pairs them with the shared target model.

mod correspondence;
mod tag;

pub use correspondence::*;
pub use tag::*;
