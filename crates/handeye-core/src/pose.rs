//! Rotation and rigid-pose encodings.
//!
//! A rigid pose is stored as an OpenCV-style rotation vector (axis scaled by
//! the rotation angle) plus a translation. Conversions to and from 3×3
//! rotation matrices and 4×4 homogeneous transforms live here.
//!
//! Rotation vectors are not canonicalized: `theta` and `2π - theta` about
//! opposite axes describe the same rotation but stay numerically distinct.
//! Near `theta = π` the recovered axis sign follows the (tiny) skew-symmetric
//! part of the matrix when it is measurable, and is otherwise arbitrary.

use nalgebra::{Rotation3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{skew, vee, CalibError, CalibResult, Iso3, Mat3, Mat4, Real, Vec3};

/// Below this angle the rotation axis is considered undefined.
pub const NEAR_IDENTITY_ANGLE: Real = 1e-10;
/// Within this distance from π the axis is recovered from the symmetric part.
pub const NEAR_PI_MARGIN: Real = 1e-3;

/// Convert a rotation matrix to an axis-angle vector.
pub fn rotation_to_rvec(r: &Mat3) -> Vec3 {
    let v = vee(r); // sin(theta) * axis
    let sin_theta = v.norm();
    let cos_theta = ((r.trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
    let theta = sin_theta.atan2(cos_theta);

    if theta < NEAR_IDENTITY_ANGLE {
        return Vec3::zeros();
    }

    if std::f64::consts::PI - theta > NEAR_PI_MARGIN {
        return v * (theta / sin_theta);
    }

    // (R + Rᵀ)/2 = cos θ I + (1 - cos θ) n nᵀ
    let sym = (r + r.transpose()) * 0.5;
    let nn = (sym - Mat3::identity() * cos_theta) / (1.0 - cos_theta);
    let (k, _) = (0..3)
        .map(|i| (i, nn[(i, i)]))
        .fold((0, Real::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
    let mut axis: Vec3 = nn.column(k).into_owned() / nn[(k, k)].max(0.0).sqrt().max(Real::EPSILON);
    axis.normalize_mut();

    if sin_theta > Real::EPSILON && axis.dot(&v) < 0.0 {
        axis = -axis;
    }
    axis * theta
}

/// Convert an axis-angle vector to a rotation matrix (Rodrigues formula).
pub fn rvec_to_rotation(rvec: &Vec3) -> Mat3 {
    let theta = rvec.norm();
    let w = skew(rvec);
    if theta < NEAR_IDENTITY_ANGLE {
        return Mat3::identity() + w;
    }
    let a = theta.sin() / theta;
    let b = (1.0 - theta.cos()) / (theta * theta);
    Mat3::identity() + w * a + w * w * b
}

/// Why a 4×4 matrix is not a rigid transform.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RigidMatrixError {
    #[error("bottom row is not [0 0 0 1]: {0:?}")]
    BottomRow([Real; 4]),
    #[error("rotation block is not orthonormal (|RᵀR - I| = {0:.3e})")]
    NotOrthonormal(Real),
    #[error("rotation block is a reflection")]
    Reflection,
}

/// Check that a 4×4 matrix is a proper rigid transform.
pub fn validate_rigid_matrix(m: &Mat4, tol: Real) -> Result<(), RigidMatrixError> {
    let bottom = [m[(3, 0)], m[(3, 1)], m[(3, 2)], m[(3, 3)]];
    let expected = [0.0, 0.0, 0.0, 1.0];
    if bottom.iter().zip(expected).any(|(v, e)| (v - e).abs() > tol) {
        return Err(RigidMatrixError::BottomRow(bottom));
    }
    let r: Mat3 = m.fixed_view::<3, 3>(0, 0).into_owned();
    let ortho = (r.transpose() * r - Mat3::identity()).norm();
    if ortho > tol {
        return Err(RigidMatrixError::NotOrthonormal(ortho));
    }
    if r.determinant() < 0.0 {
        return Err(RigidMatrixError::Reflection);
    }
    Ok(())
}

/// Rigid transform as rotation vector + translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidPose {
    /// Axis-angle rotation, in radians.
    pub rvec: Vec3,
    /// Translation.
    pub tvec: Vec3,
}

impl RigidPose {
    pub fn new(rvec: Vec3, tvec: Vec3) -> Self {
        Self { rvec, tvec }
    }

    pub fn identity() -> Self {
        Self::new(Vec3::zeros(), Vec3::zeros())
    }

    /// Decode a homogeneous transform. The rotation block is taken as-is.
    pub fn from_matrix(m: &Mat4) -> Self {
        let r: Mat3 = m.fixed_view::<3, 3>(0, 0).into_owned();
        let t: Vec3 = m.fixed_view::<3, 1>(0, 3).into_owned();
        Self::new(rotation_to_rvec(&r), t)
    }

    /// Decode a row-major 4×4 matrix, validating that it is rigid.
    pub fn from_row_major(values: &[Real], source_name: &str) -> CalibResult<Self> {
        if values.len() != 16 {
            return Err(CalibError::input_format(
                source_name,
                format!("expected 16 matrix entries, got {}", values.len()),
            ));
        }
        let m = Mat4::from_row_slice(values);
        validate_rigid_matrix(&m, 1e-4)
            .map_err(|e| CalibError::input_format(source_name, e.to_string()))?;
        Ok(Self::from_matrix(&m))
    }

    pub fn rotation(&self) -> Mat3 {
        rvec_to_rotation(&self.rvec)
    }

    pub fn to_matrix(&self) -> Mat4 {
        let mut m = Mat4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.tvec);
        m
    }

    pub fn from_isometry(iso: &Iso3) -> Self {
        let r = iso.rotation.to_rotation_matrix();
        Self::new(rotation_to_rvec(r.matrix()), iso.translation.vector)
    }

    pub fn to_isometry(&self) -> Iso3 {
        let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
            self.rotation(),
        ));
        Iso3::from_parts(Translation3::from(self.tvec), rot)
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> Real {
        self.rvec.norm()
    }
}
