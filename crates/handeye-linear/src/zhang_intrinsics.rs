//! Closed-form intrinsics from plane homographies.
//!
//! Two initializers are provided:
//! - Zhang's method, recovering the full `K` (focal lengths, skew, principal
//!   point) from three or more homographies;
//! - a reduced solve for `fx, fy` with the principal point fixed (usually at
//!   the image center), which works from a single tilted view and is the
//!   fallback when Zhang's system is ill-posed.
//!
//! Both ignore lens distortion.

use crate::math::image_conditioning;
use handeye_core::{FxFyCxCySkew, Mat3, Pt2, Real};
use log::debug;
use nalgebra::{DMatrix, Matrix2, Vector2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntrinsicsInitError {
    #[error("need at least {required} homographies, got {found}")]
    NotEnoughHomographies { required: usize, found: usize },
    #[error("homographies do not constrain the intrinsics: {0}")]
    Degenerate(String),
    #[error("closed-form solution is not a valid camera: {0}")]
    InvalidSolution(String),
}

/// Build the 6-vector v_ij(H) as in Zhang's method (0-based column indices).
fn v_ij(hmtx: &Mat3, i: usize, j: usize) -> nalgebra::SVector<Real, 6> {
    let hi = hmtx.column(i);
    let hj = hmtx.column(j);

    nalgebra::SVector::<Real, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Estimate camera intrinsics K from a set of plane homographies H_k using
/// Zhang's closed-form solution (no distortion).
///
/// Requires at least 3 homographies. Homographies should be reasonably
/// conditioned; see [`estimate_intrinsics_conditioned`] for pixel-space input.
pub fn estimate_intrinsics_from_homographies(
    hmtxs: &[Mat3],
) -> Result<FxFyCxCySkew<Real>, IntrinsicsInitError> {
    if hmtxs.len() < 3 {
        return Err(IntrinsicsInitError::NotEnoughHomographies {
            required: 3,
            found: hmtxs.len(),
        });
    }

    let m = hmtxs.len();
    let mut vmtx = DMatrix::<Real>::zeros(2 * m, 6);

    for (k, hmtx) in hmtxs.iter().enumerate() {
        let hmtx = hmtx / hmtx.norm();
        let v11 = v_ij(&hmtx, 0, 0);
        let v22 = v_ij(&hmtx, 1, 1);
        let v12 = v_ij(&hmtx, 0, 1);

        // Row 2k: v_12^T
        vmtx.row_mut(2 * k).copy_from(&v12.transpose());
        // Row 2k+1: (v_11 - v_22)^T
        vmtx.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    // Solve V b = 0 via SVD: take the singular vector corresponding to the
    // smallest singular value. The second smallest one must be clearly
    // non-zero, otherwise the null space is not one-dimensional.
    let svd = vmtx.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| IntrinsicsInitError::Degenerate("svd failed".into()))?;
    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[a].total_cmp(&svd.singular_values[b]));
    let s_max = svd.singular_values.max();
    let s_second = svd.singular_values[order[1]];
    debug!(
        "zhang: singular values {:?}",
        svd.singular_values.as_slice()
    );
    if s_max <= 0.0 || s_second / s_max < 1e-9 {
        return Err(IntrinsicsInitError::Degenerate(format!(
            "rank-deficient constraint matrix (σ₂/σ_max = {:.3e})",
            if s_max > 0.0 { s_second / s_max } else { 0.0 }
        )));
    }
    let b = v_t.row(order[0]);

    let b11 = b[0];
    let b12 = b[1];
    let b22 = b[2];
    let b13 = b[3];
    let b23 = b[4];
    let b33 = b[5];

    // From Zhang's paper:
    //
    // v0 = (B12 B13 - B11 B23) / (B11 B22 - B12^2)
    // λ = B33 - (B13^2 + v0 (B12 B13 - B11 B23)) / B11
    // α = sqrt(λ / B11)
    // β = sqrt(λ B11 / (B11 B22 - B12^2))
    // γ = -B12 α^2 β / λ
    // u0 = γ v0 / β - B13 α^2 / λ

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    let denom_rel = if denom_norm > 0.0 {
        denom.abs() / denom_norm
    } else {
        0.0
    };
    if denom_rel <= 1e-9 {
        return Err(IntrinsicsInitError::Degenerate(
            "B11 B22 - B12² vanishes".into(),
        ));
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;

    if lambda.signum() != b11.signum() || lambda / b11 <= 0.0 || lambda * b11 / denom <= 0.0 {
        return Err(IntrinsicsInitError::InvalidSolution(
            "imaginary focal length".into(),
        ));
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    Ok(FxFyCxCySkew {
        fx: alpha,
        fy: beta,
        cx: u0,
        cy: v0,
        skew: gamma,
    })
}

/// Zhang's method on pixel-space homographies, conditioned by the image size.
///
/// Each `H` is premultiplied by a similarity `T` that maps the image onto
/// roughly `[-1, 1]²`; the recovered matrix is mapped back with `K = T⁻¹ K'`.
pub fn estimate_intrinsics_conditioned(
    hmtxs: &[Mat3],
    width: Real,
    height: Real,
) -> Result<FxFyCxCySkew<Real>, IntrinsicsInitError> {
    let t = image_conditioning(width, height);
    let t_inv = t
        .try_inverse()
        .ok_or_else(|| IntrinsicsInitError::Degenerate("zero image size".into()))?;
    let conditioned: Vec<Mat3> = hmtxs.iter().map(|h| t * h).collect();
    let k_norm = estimate_intrinsics_from_homographies(&conditioned)?;
    FxFyCxCySkew::try_from_k_matrix(&(t_inv * k_norm.k_matrix()), 1e-9).ok_or_else(|| {
        IntrinsicsInitError::InvalidSolution("de-conditioned K is not upper triangular".into())
    })
}

/// Estimate `fx, fy` with a known principal point and zero skew.
///
/// With `K = diag(fx, fy, 1)` after moving the origin to the principal point,
/// each homography contributes the two orthonormality constraints on its first
/// two columns, linear in `1/fx²` and `1/fy²`. Works from one tilted view.
/// `scale` should be of the order of the focal length (e.g. `(w + h) / 2`).
pub fn estimate_focal_with_principal_point(
    hmtxs: &[Mat3],
    principal_point: &Pt2,
    scale: Real,
) -> Result<FxFyCxCySkew<Real>, IntrinsicsInitError> {
    if hmtxs.is_empty() {
        return Err(IntrinsicsInitError::NotEnoughHomographies {
            required: 1,
            found: 0,
        });
    }
    let scale = scale.max(f64::EPSILON);
    // S · T_c⁻¹: shift to the principal point, then shrink pixels by `scale`.
    let pre = Mat3::new(
        1.0 / scale,
        0.0,
        -principal_point.x / scale,
        0.0,
        1.0 / scale,
        -principal_point.y / scale,
        0.0,
        0.0,
        1.0,
    );

    let mut ata = Matrix2::<Real>::zeros();
    let mut atb = Vector2::<Real>::zeros();
    for h in hmtxs {
        let hp = pre * h;
        let hp = hp / hp.norm();
        let rows = [
            (
                Vector2::new(hp[(0, 0)] * hp[(0, 1)], hp[(1, 0)] * hp[(1, 1)]),
                -hp[(2, 0)] * hp[(2, 1)],
            ),
            (
                Vector2::new(
                    hp[(0, 0)] * hp[(0, 0)] - hp[(0, 1)] * hp[(0, 1)],
                    hp[(1, 0)] * hp[(1, 0)] - hp[(1, 1)] * hp[(1, 1)],
                ),
                -(hp[(2, 0)] * hp[(2, 0)] - hp[(2, 1)] * hp[(2, 1)]),
            ),
        ];
        for (a, rhs) in rows {
            ata += a * a.transpose();
            atb += a * rhs;
        }
    }

    let det = ata.determinant();
    if det.abs() <= 1e-12 * ata.norm_squared().max(f64::EPSILON) {
        return Err(IntrinsicsInitError::Degenerate(
            "focal-length system is singular".into(),
        ));
    }
    let inv = ata
        .try_inverse()
        .ok_or_else(|| IntrinsicsInitError::Degenerate("focal-length system is singular".into()))?;
    let sol = inv * atb;
    if sol.x <= 0.0 || sol.y <= 0.0 {
        return Err(IntrinsicsInitError::InvalidSolution(format!(
            "non-positive 1/f² estimates ({:.3e}, {:.3e}); views may be fronto-parallel",
            sol.x, sol.y
        )));
    }

    Ok(FxFyCxCySkew {
        fx: scale / sol.x.sqrt(),
        fy: scale / sol.y.sqrt(),
        cx: principal_point.x,
        cy: principal_point.y,
        skew: 0.0,
    })
}
