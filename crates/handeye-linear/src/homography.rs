//! Homography estimation (plane-induced projective transform).
//!
//! The homography `H` maps **target points** on the `Z = 0` plane to **image
//! points** in pixels: `x' ~ H x`. Normalization is applied internally for
//! numerical stability and the output is de-normalized.

use crate::math::normalize_points_2d;
use handeye_core::{from_homogeneous, to_homogeneous, Mat3, Pt2, Real};
use nalgebra::DMatrix;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("point count mismatch: {world} target points vs {image} image points")]
    CountMismatch { world: usize, image: usize },
    #[error("degenerate point configuration for normalization")]
    DegeneratePoints,
    #[error("svd failed")]
    SvdFailed,
}

/// Normalized DLT homography estimation.
#[derive(Debug, Clone, Copy)]
pub struct HomographySolver;

/// Estimate `H` such that `x' ~ H x` using normalized DLT.
///
/// The returned homography is scaled so that `H[2,2] == 1` when possible.
pub fn dlt_homography(world: &[Pt2], image: &[Pt2]) -> Result<Mat3, HomographyError> {
    HomographySolver::dlt(world, image)
}

impl HomographySolver {
    /// Estimate a homography `H` such that `x' ~ H x` using the normalized DLT.
    ///
    /// This uses Hartley-style point normalization (zero-mean, average distance
    /// sqrt(2)) and solves `A h = 0` via SVD on the design matrix `A`.
    pub fn dlt(world: &[Pt2], image: &[Pt2]) -> Result<Mat3, HomographyError> {
        let n = world.len();
        if image.len() != n {
            return Err(HomographyError::CountMismatch {
                world: n,
                image: image.len(),
            });
        }
        if n < 4 {
            return Err(HomographyError::NotEnoughPoints(n));
        }

        let (world_n, t_w) =
            normalize_points_2d(world).ok_or(HomographyError::DegeneratePoints)?;
        let (image_n, t_i) =
            normalize_points_2d(image).ok_or(HomographyError::DegeneratePoints)?;

        let mut a = DMatrix::<f64>::zeros(2 * n, 9);

        for (i, (pw, pi)) in world_n.iter().zip(image_n.iter()).enumerate() {
            let x = pw.x;
            let y = pw.y;
            let u = pi.x;
            let v = pi.y;

            let r0 = 2 * i;
            let r1 = 2 * i + 1;

            a[(r0, 0)] = -x;
            a[(r0, 1)] = -y;
            a[(r0, 2)] = -1.0;
            a[(r0, 6)] = u * x;
            a[(r0, 7)] = u * y;
            a[(r0, 8)] = u;

            a[(r1, 3)] = -x;
            a[(r1, 4)] = -y;
            a[(r1, 5)] = -1.0;
            a[(r1, 6)] = v * x;
            a[(r1, 7)] = v * y;
            a[(r1, 8)] = v;
        }

        // With exactly 4 points A is 8×9; pad so the thin SVD still yields a full V.
        if a.nrows() < a.ncols() {
            let rows = a.nrows();
            let mut a_pad = DMatrix::<f64>::zeros(9, 9);
            a_pad.view_mut((0, 0), (rows, 9)).copy_from(&a);
            a = a_pad;
        }

        // Solve A h = 0 via SVD: take the singular vector for the smallest singular value.
        let svd = a.svd(false, true);
        let v_t = svd.v_t.ok_or(HomographyError::SvdFailed)?;
        let (min_idx, _) = svd.singular_values.argmin();
        let h_vec = v_t.row(min_idx);

        let mut h_mat = Mat3::zeros();
        for r in 0..3 {
            for c in 0..3 {
                h_mat[(r, c)] = h_vec[3 * r + c];
            }
        }

        let t_i_inv = t_i.try_inverse().ok_or(HomographyError::SvdFailed)?;
        h_mat = t_i_inv * h_mat * t_w;

        // normalise such that H[2,2] = 1
        let scale = h_mat[(2, 2)];
        if scale.abs() > f64::EPSILON {
            h_mat /= scale;
        }

        Ok(h_mat)
    }
}

/// Map a target point through a homography.
pub fn apply_homography(h: &Mat3, p: &Pt2) -> Pt2 {
    from_homogeneous(&(h * to_homogeneous(p)))
}

/// RMS transfer error of a homography over correspondences, in pixels.
pub fn homography_rms(h: &Mat3, world: &[Pt2], image: &[Pt2]) -> Real {
    if world.is_empty() {
        return 0.0;
    }
    let sum: Real = world
        .iter()
        .zip(image)
        .map(|(w, i)| (apply_homography(h, w) - i).norm_squared())
        .sum();
    (sum / world.len() as Real).sqrt()
}
