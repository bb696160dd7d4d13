use handeye_core::{Iso3, Mat3, Real};
use nalgebra::{Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanarPoseError {
    #[error("intrinsic matrix is singular")]
    SingularIntrinsics,
    #[error("homography columns vanish after removing K")]
    DegenerateHomography,
    #[error("svd failed")]
    SvdFailed,
}

/// Linear pose initialisation from a homography and intrinsics.
///
/// This implements the classic decomposition of a plane-induced homography
/// `H` into a rotation and translation, assuming the target lies on the plane
/// `Z = 0` in its own coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PlanarPoseSolver;

/// Estimate pose of a planar board (Z=0) relative to camera, given intrinsics K
/// and homography H (plane -> image).
///
/// Returns an Iso3 that maps board coordinates into camera coordinates.
pub fn estimate_planar_pose_from_h(kmtx: &Mat3, hmtx: &Mat3) -> Result<Iso3, PlanarPoseError> {
    PlanarPoseSolver::from_homography(kmtx, hmtx)
}

impl PlanarPoseSolver {
    /// Decompose a homography into a pose `T_C_B` given intrinsics `K`.
    ///
    /// The sign of `H` is chosen so that the target lies in front of the camera.
    pub fn from_homography(kmtx: &Mat3, hmtx: &Mat3) -> Result<Iso3, PlanarPoseError> {
        let k_inv = kmtx
            .try_inverse()
            .ok_or(PlanarPoseError::SingularIntrinsics)?;

        let h1 = hmtx.column(0);
        let h2 = hmtx.column(1);
        let h3 = hmtx.column(2).into_owned();

        let k_inv_h1 = k_inv * h1;
        let k_inv_h2 = k_inv * h2;

        // Scale factor λ: normalize first two columns (average for robustness)
        let norm1 = k_inv_h1.norm();
        let norm2 = k_inv_h2.norm();
        if norm1 + norm2 <= f64::EPSILON {
            return Err(PlanarPoseError::DegenerateHomography);
        }
        let mut lambda = 1.0 / ((norm1 + norm2) * 0.5);
        if (k_inv * h3).z < 0.0 {
            lambda = -lambda;
        }

        let r1 = (lambda * k_inv_h1).into_owned();
        let r2 = (lambda * k_inv_h2).into_owned();
        let r3 = r1.cross(&r2);

        let mut r_mat = Matrix3::<Real>::zeros();
        r_mat.set_column(0, &r1);
        r_mat.set_column(1, &r2);
        r_mat.set_column(2, &r3);

        // Project onto SO(3) (polar decomposition via SVD)
        let svd = r_mat.svd(true, true);
        let u = svd.u.ok_or(PlanarPoseError::SvdFailed)?;
        let v_t = svd.v_t.ok_or(PlanarPoseError::SvdFailed)?;
        let mut r_orth = u * v_t;

        // Ensure det(R) > 0
        if r_orth.determinant() < 0.0 {
            let mut u_flipped = u;
            u_flipped.column_mut(2).neg_mut();
            r_orth = u_flipped * v_t;
        }
        Ok(build_iso(r_orth, lambda, &k_inv, &h3))
    }
}

fn build_iso(r_orth: Matrix3<Real>, lambda: Real, k_inv: &Mat3, h3: &Vector3<Real>) -> Iso3 {
    let t_vec: Vector3<Real> = lambda * (k_inv * h3);

    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    let trans = Translation3::from(t_vec);

    Iso3::from_parts(trans, rot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use handeye_core::FxFyCxCySkew;
    use nalgebra::{Isometry3, Matrix3, Rotation3, Vector3};

    fn make_kmtx() -> Mat3 {
        let k = FxFyCxCySkew {
            fx: 800.0,
            fy: 780.0,
            cx: 640.0,
            cy: 360.0,
            skew: 0.0,
        };
        k.k_matrix()
    }

    fn homography_for(kmtx: &Mat3, iso: &Isometry3<Real>) -> Mat3 {
        // For a plane Z=0, homography is H = K [r1 r2 t]
        let r_mat_binding = iso.rotation.to_rotation_matrix();
        let r_mat = r_mat_binding.matrix();
        let mut hmtx = Mat3::zeros();
        hmtx.set_column(0, &(kmtx * r_mat.column(0)));
        hmtx.set_column(1, &(kmtx * r_mat.column(1)));
        hmtx.set_column(2, &(kmtx * iso.translation.vector));
        hmtx
    }

    fn rotation_error(a: &Iso3, b: &Iso3) -> Real {
        let r_diff = a.rotation.to_rotation_matrix().matrix().transpose()
            * b.rotation.to_rotation_matrix().matrix();
        ((r_diff.trace() - 1.0) * 0.5).clamp(-1.0, 1.0).acos()
    }

    #[test]
    fn planar_pose_from_h_recovers_pose() {
        let kmtx = make_kmtx();

        // Synthetic pose: small rotation & translation
        let rot = Rotation3::from_euler_angles(0.1, -0.05, 0.2);
        let t = Vector3::new(0.1, -0.05, 1.0);
        let iso_gt = Isometry3::from_parts(Translation3::from(t), rot.into());

        let hmtx = homography_for(&kmtx, &iso_gt);
        let iso_est = estimate_planar_pose_from_h(&kmtx, &hmtx).unwrap();

        assert!((iso_est.translation.vector - iso_gt.translation.vector).norm() < 1e-9);
        let angle = rotation_error(&iso_est, &iso_gt);
        assert!(angle < 1e-9, "rotation error too large: {}", angle);
    }

    #[test]
    fn negated_homography_gives_same_pose() {
        let kmtx = make_kmtx();
        let iso_gt = Isometry3::from_parts(
            Translation3::new(-0.05, 0.02, 0.7),
            Rotation3::from_euler_angles(-0.2, 0.3, 0.0).into(),
        );
        let hmtx = -homography_for(&kmtx, &iso_gt) * 2.5;
        let iso_est = estimate_planar_pose_from_h(&kmtx, &hmtx).unwrap();
        assert!(iso_est.translation.vector.z > 0.0);
        assert!((iso_est.translation.vector - iso_gt.translation.vector).norm() < 1e-9);
        assert!(rotation_error(&iso_est, &iso_gt) < 1e-9);
    }
}
