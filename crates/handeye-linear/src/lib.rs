//! Closed-form initializers for planar calibration.
//!
//! - [`HomographySolver`]: normalized DLT plane-to-image homography,
//! - [`estimate_intrinsics_from_homographies`]: Zhang's closed form,
//! - [`estimate_focal_with_principal_point`]: focal lengths with a known principal point,
//! - [`PlanarPoseSolver`]: target pose from a homography and intrinsics.
//!
//! These seed the non-linear refinement in `handeye-optim`.

pub mod homography;
pub mod math;
pub mod planar_pose;
pub mod zhang_intrinsics;

pub use homography::*;
pub use planar_pose::*;
pub use zhang_intrinsics::*;
