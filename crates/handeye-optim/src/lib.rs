//! Non-linear least-squares refinement for planar camera calibration.
//!
//! The crate provides a small solver abstraction ([`NllsProblem`],
//! [`NllsSolverBackend`]) with two Levenberg-Marquardt backends, and the joint
//! intrinsics/distortion/pose refinement problem used after linear
//! initialization. Jacobians are computed per view with forward-mode autodiff.

pub mod backend_dense;
pub mod backend_lm;
mod jacobian_ad;
pub mod planar_intrinsics;
pub mod projection;
pub mod traits;

pub use backend_dense::DampedLmBackend;
pub use backend_lm::LmBackend;
pub use planar_intrinsics::{
    refine_planar_intrinsics, OptimError, PlanarIntrinsicsEstimate, PlanarIntrinsicsProblem,
};
pub use traits::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
