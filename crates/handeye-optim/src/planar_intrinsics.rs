//! Joint refinement of pinhole intrinsics, Brown-Conrady distortion and the
//! per-view target poses of a planar calibration dataset.
//!
//! Parameter vector layout:
//! - the free entries of the shared block `[fx, fy, cx, cy, skew, k1, k2, p1, p2]`,
//!   in that order (skew is dropped when it is held fixed),
//! - then `[rx, ry, rz, tx, ty, tz]` for each view, where `r` is the
//!   camera-from-target rotation vector.
//!
//! The third radial coefficient is not part of the problem and stays at zero.
//! Residuals are ordered view by view, point by point, `[du, dv]` with
//! `measured - projected`.

use crate::jacobian_ad::jacobian_unweighted_ad;
use crate::projection::{project_point, rotate_rvec};
use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use handeye_core::{
    BrownConrady5, CameraModel, FxFyCxCySkew, ImageSize, Pt2, Pt3, Real, RigidPose, TargetModel,
    Vec3,
};
use nalgebra::{convert, DMatrix, DVector, RealField, Vector3};
use thiserror::Error;

/// Size of the shared intrinsics + distortion block.
pub const SHARED_DIM: usize = 9;
/// Size of one per-view pose block.
pub const POSE_DIM: usize = 6;
/// Local parameter count seen by one view.
pub const LOCAL_DIM: usize = SHARED_DIM + POSE_DIM;

const SKEW_IDX: usize = 4;

#[derive(Debug, Error)]
pub enum OptimError {
    #[error("problem needs at least one view")]
    NoViews,
    #[error("view {view} has {found} image points, target has {expected}")]
    PointCount {
        view: usize,
        expected: usize,
        found: usize,
    },
    #[error("expected {expected} poses, got {found}")]
    PoseCount { expected: usize, found: usize },
}

/// Which entries of the shared block are free.
#[derive(Debug, Clone)]
pub(crate) struct ParamLayout {
    free_shared: Vec<usize>,
    num_views: usize,
}

impl ParamLayout {
    fn new(fix_skew: bool, num_views: usize) -> Self {
        let free_shared = (0..SHARED_DIM)
            .filter(|&i| !(fix_skew && i == SKEW_IDX))
            .collect();
        Self {
            free_shared,
            num_views,
        }
    }

    pub(crate) fn free_shared(&self) -> &[usize] {
        &self.free_shared
    }

    pub(crate) fn pose_offset(&self, view_idx: usize) -> usize {
        self.free_shared.len() + POSE_DIM * view_idx
    }

    fn param_dim(&self) -> usize {
        self.free_shared.len() + POSE_DIM * self.num_views
    }
}

/// Non-linear refinement problem for planar intrinsics (and per-view poses).
#[derive(Debug, Clone)]
pub struct PlanarIntrinsicsProblem {
    model: TargetModel,
    views: Vec<Vec<Pt2>>,
    image_size: ImageSize,
    /// Values used for shared entries that are not optimized.
    fixed_shared: [Real; SHARED_DIM],
    layout: ParamLayout,
}

/// Refined camera, poses and solver report.
#[derive(Debug, Clone)]
pub struct PlanarIntrinsicsEstimate {
    pub camera: CameraModel,
    pub poses: Vec<RigidPose>,
    pub report: SolveReport,
    /// RMS reprojection error over all points, in pixels.
    pub rms: Real,
}

fn shared_from_camera(camera: &CameraModel) -> [Real; SHARED_DIM] {
    let k = &camera.intrinsics;
    let d = &camera.distortion;
    [k.fx, k.fy, k.cx, k.cy, k.skew, d.k1, d.k2, d.p1, d.p2]
}

impl PlanarIntrinsicsProblem {
    /// Build the problem. `initial` supplies the image size and the values of
    /// shared entries that stay fixed.
    pub fn new(
        model: TargetModel,
        views: Vec<Vec<Pt2>>,
        initial: &CameraModel,
        fix_skew: bool,
    ) -> Result<Self, OptimError> {
        if views.is_empty() {
            return Err(OptimError::NoViews);
        }
        for (view, pts) in views.iter().enumerate() {
            if pts.len() != model.len() {
                return Err(OptimError::PointCount {
                    view,
                    expected: model.len(),
                    found: pts.len(),
                });
            }
        }
        let mut fixed_shared = shared_from_camera(initial);
        if fix_skew {
            fixed_shared[SKEW_IDX] = 0.0;
        }
        let layout = ParamLayout::new(fix_skew, views.len());
        Ok(Self {
            model,
            views,
            image_size: initial.image_size,
            fixed_shared,
            layout,
        })
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn param_dim(&self) -> usize {
        self.layout.param_dim()
    }

    pub fn residual_dim(&self) -> usize {
        2 * self.model.len() * self.views.len()
    }

    pub(crate) fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    pub(crate) fn target_points(&self) -> &[Pt3] {
        self.model.points()
    }

    pub(crate) fn view_points(&self, view_idx: usize) -> &[Pt2] {
        &self.views[view_idx]
    }

    /// Pack a camera and camera-from-target poses into a parameter vector.
    pub fn pack_params(
        &self,
        camera: &CameraModel,
        poses: &[RigidPose],
    ) -> Result<DVector<Real>, OptimError> {
        if poses.len() != self.num_views() {
            return Err(OptimError::PoseCount {
                expected: self.num_views(),
                found: poses.len(),
            });
        }
        let shared = shared_from_camera(camera);
        let mut x = DVector::zeros(self.param_dim());
        for (slot, &idx) in self.layout.free_shared.iter().enumerate() {
            x[slot] = shared[idx];
        }
        for (view_idx, pose) in poses.iter().enumerate() {
            let off = self.layout.pose_offset(view_idx);
            x.fixed_rows_mut::<3>(off).copy_from(&pose.rvec);
            x.fixed_rows_mut::<3>(off + 3).copy_from(&pose.tvec);
        }
        Ok(x)
    }

    /// Full shared block for a parameter vector, with fixed entries filled in.
    pub(crate) fn shared_block(&self, x: &DVector<Real>) -> [Real; SHARED_DIM] {
        let mut shared = self.fixed_shared;
        for (slot, &idx) in self.layout.free_shared.iter().enumerate() {
            shared[idx] = x[slot];
        }
        shared
    }

    pub(crate) fn pose_block(&self, x: &DVector<Real>, view_idx: usize) -> [Real; POSE_DIM] {
        let off = self.layout.pose_offset(view_idx);
        let mut pose = [0.0; POSE_DIM];
        pose.copy_from_slice(&x.as_slice()[off..off + POSE_DIM]);
        pose
    }

    /// Decode a parameter vector into camera + per-view poses.
    pub fn unpack_params(&self, x: &DVector<Real>) -> (CameraModel, Vec<RigidPose>) {
        let s = self.shared_block(x);
        let camera = CameraModel::new(
            self.image_size,
            FxFyCxCySkew {
                fx: s[0],
                fy: s[1],
                cx: s[2],
                cy: s[3],
                skew: s[4],
            },
            BrownConrady5 {
                k1: s[5],
                k2: s[6],
                k3: 0.0,
                p1: s[7],
                p2: s[8],
            },
        );
        let poses = (0..self.num_views())
            .map(|i| {
                let p = self.pose_block(x, i);
                RigidPose::new(Vec3::new(p[0], p[1], p[2]), Vec3::new(p[3], p[4], p[5]))
            })
            .collect();
        (camera, poses)
    }

    /// RMS reprojection error in pixels.
    pub fn rms_error(&self, x: &DVector<Real>) -> Real {
        let n = self.model.len() * self.views.len();
        if n == 0 {
            return 0.0;
        }
        (self.residuals_unweighted(x).norm_squared() / n as Real).sqrt()
    }
}

/// Residuals of one view, generic so that the same code runs on dual numbers.
///
/// `shared` is the full `[fx, fy, cx, cy, skew, k1, k2, p1, p2]` block and
/// `pose` is `[rx, ry, rz, tx, ty, tz]`.
pub(crate) fn residuals_view_generic<T: RealField>(
    shared: &[T],
    pose: &[T],
    target: &[Pt3],
    measured: &[Pt2],
) -> DVector<T> {
    debug_assert_eq!(shared.len(), SHARED_DIM);
    debug_assert_eq!(pose.len(), POSE_DIM);

    let intr = &shared[..5];
    let dist = &shared[5..];
    let rvec = Vector3::new(pose[0].clone(), pose[1].clone(), pose[2].clone());
    let tvec = Vector3::new(pose[3].clone(), pose[4].clone(), pose[5].clone());

    let mut r = DVector::from_element(2 * target.len(), T::zero());
    for (j, (pw, uv)) in target.iter().zip(measured).enumerate() {
        let pw_t = Vector3::new(
            convert::<_, T>(pw.x),
            convert::<_, T>(pw.y),
            convert::<_, T>(pw.z),
        );
        let pc = rotate_rvec(&rvec, &pw_t) + tvec.clone();
        let proj = project_point(intr, dist, &pc);
        r[2 * j] = convert::<_, T>(uv.x) - proj.x.clone();
        r[2 * j + 1] = convert::<_, T>(uv.y) - proj.y.clone();
    }
    r
}

impl NllsProblem for PlanarIntrinsicsProblem {
    fn num_params(&self) -> usize {
        self.param_dim()
    }

    fn num_residuals(&self) -> usize {
        self.residual_dim()
    }

    fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real> {
        let shared = self.shared_block(x);
        let mut r = DVector::zeros(self.residual_dim());
        let mut offset = 0;
        for (view_idx, measured) in self.views.iter().enumerate() {
            let pose = self.pose_block(x, view_idx);
            let r_view = residuals_view_generic(&shared, &pose, self.model.points(), measured);
            r.rows_mut(offset, r_view.len()).copy_from(&r_view);
            offset += r_view.len();
        }
        r
    }

    fn jacobian_unweighted(&self, x: &DVector<Real>) -> DMatrix<Real> {
        jacobian_unweighted_ad(self, x)
    }
}

/// High-level API: refine camera intrinsics & per-view poses.
pub fn refine_planar_intrinsics<B: NllsSolverBackend>(
    backend: &B,
    problem: &PlanarIntrinsicsProblem,
    initial_params: DVector<Real>,
    opts: &SolveOptions,
) -> PlanarIntrinsicsEstimate {
    debug_assert_eq!(
        initial_params.len(),
        problem.param_dim(),
        "initial parameter vector has wrong dimension"
    );

    let (x_opt, report) = backend.solve(problem, initial_params, opts);
    let (camera, poses) = problem.unpack_params(&x_opt);
    let rms = problem.rms_error(&x_opt);
    PlanarIntrinsicsEstimate {
        camera,
        poses,
        report,
        rms,
    }
}
