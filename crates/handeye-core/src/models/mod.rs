//! Camera model building blocks.
//!
//! The camera used by this workspace is a pinhole with Brown–Conrady
//! distortion and a general upper-triangular intrinsic matrix:
//!
//! `pixel = K(distortion(x / z, y / z))`
//!
//! [`CameraModel`] is an immutable value created once by the solver and
//! handed to downstream stages by reference.

mod camera;
mod distortion;
mod intrinsics;

pub use camera::*;
pub use distortion::*;
pub use intrinsics::*;
