//! Per-view Jacobian assembly using `num-dual`.
//!
//! Each view depends only on:
//! - the shared intrinsics/distortion block, and
//! - that view's 6-DoF pose block (axis-angle + translation).
//!
//! Autodiff runs on a small local vector (`LOCAL_DIM = 9 + 6`). Columns of
//! shared entries that are held fixed are dropped while scattering the
//! per-view Jacobian into the global matrix.

use crate::planar_intrinsics::{
    residuals_view_generic, PlanarIntrinsicsProblem, LOCAL_DIM, POSE_DIM, SHARED_DIM,
};
use handeye_core::Real;
use nalgebra::{Const, DMatrix, DVector, Dyn, OMatrix, SVector};
use num_dual::{jacobian, DualSVec64};

fn build_local_params(
    problem: &PlanarIntrinsicsProblem,
    x: &DVector<Real>,
    view_idx: usize,
) -> SVector<Real, LOCAL_DIM> {
    let mut local = SVector::<Real, LOCAL_DIM>::zeros();
    for (i, v) in problem.shared_block(x).into_iter().enumerate() {
        local[i] = v;
    }
    for (k, v) in problem.pose_block(x, view_idx).into_iter().enumerate() {
        local[SHARED_DIM + k] = v;
    }
    local
}

fn scatter_jacobian(
    j_global: &mut DMatrix<Real>,
    j_view: &OMatrix<Real, Dyn, Const<LOCAL_DIM>>,
    row_offset: usize,
    view_idx: usize,
    problem: &PlanarIntrinsicsProblem,
) {
    let layout = problem.layout();
    let pose_offset = layout.pose_offset(view_idx);

    for r in 0..j_view.nrows() {
        for (global_col, &local_col) in layout.free_shared().iter().enumerate() {
            j_global[(row_offset + r, global_col)] = j_view[(r, local_col)];
        }
        for k in 0..POSE_DIM {
            j_global[(row_offset + r, pose_offset + k)] = j_view[(r, SHARED_DIM + k)];
        }
    }
}

/// Compute the global unweighted Jacobian using per-view autodiff.
pub(crate) fn jacobian_unweighted_ad(
    problem: &PlanarIntrinsicsProblem,
    x: &DVector<Real>,
) -> DMatrix<Real> {
    debug_assert_eq!(x.len(), problem.param_dim());

    let m = problem.residual_dim();
    let n = x.len();
    let mut j_global = DMatrix::zeros(m, n);
    let target = problem.target_points();

    let mut row_offset = 0;
    for view_idx in 0..problem.num_views() {
        let measured = problem.view_points(view_idx);
        let p0_local = build_local_params(problem, x, view_idx);
        let (r_view, j_view) = jacobian(
            |p: SVector<DualSVec64<LOCAL_DIM>, LOCAL_DIM>| {
                let p_slice = p.as_slice();
                residuals_view_generic(
                    &p_slice[..SHARED_DIM],
                    &p_slice[SHARED_DIM..],
                    target,
                    measured,
                )
            },
            p0_local,
        );

        debug_assert_eq!(r_view.len(), measured.len() * 2);
        scatter_jacobian(&mut j_global, &j_view, row_offset, view_idx, problem);
        row_offset += r_view.len();
    }

    debug_assert_eq!(row_offset, m);
    j_global
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NllsProblem;
    use handeye_core::synthetic::planar::{poses_around_target, project_views_all};
    use handeye_core::{
        BrownConrady5, CameraModel, FxFyCxCySkew, ImageSize, PatternGeometry, PatternKind,
        TargetModel,
    };

    #[test]
    fn autodiff_matches_central_differences() {
        let camera = CameraModel::new(
            ImageSize::new(640, 480),
            FxFyCxCySkew {
                fx: 500.0,
                fy: 505.0,
                cx: 320.0,
                cy: 240.0,
                skew: 0.5,
            },
            BrownConrady5 {
                k1: -0.05,
                k2: 0.02,
                k3: 0.0,
                p1: 0.002,
                p2: 0.001,
            },
        );
        let model =
            TargetModel::from_geometry(&PatternGeometry::new(4, 3, 0.05, PatternKind::Chessboard));
        let poses = poses_around_target(&model, 3, 0.8);
        let views: Vec<Vec<_>> = project_views_all(&camera, &model, &poses)
            .unwrap()
            .into_iter()
            .map(|v| v.points)
            .collect();

        for fix_skew in [true, false] {
            let problem = PlanarIntrinsicsProblem::new(model.clone(), views.clone(), &camera, fix_skew)
                .unwrap();
            let mut x = problem.pack_params(&camera, &poses).unwrap();
            // move away from the optimum so residuals are non-zero
            x[0] += 3.0;
            x[problem.param_dim() - 1] += 0.01;

            let j_ad = problem.jacobian_unweighted(&x);
            assert_eq!(j_ad.ncols(), if fix_skew { 8 + 18 } else { 9 + 18 });

            for c in 0..x.len() {
                let h = 1e-6 * x[c].abs().max(1.0);
                let mut xp = x.clone();
                let mut xm = x.clone();
                xp[c] += h;
                xm[c] -= h;
                let fd = (problem.residuals_unweighted(&xp) - problem.residuals_unweighted(&xm))
                    / (2.0 * h);
                let err = (fd - j_ad.column(c)).amax();
                assert!(err < 1e-4 * (1.0 + j_ad.column(c).amax()), "column {c}: {err}");
            }
        }
    }
}
