use serde::{Deserialize, Serialize};

use super::{BrownConrady5, DistortionModel, FxFyCxCySkew};
use crate::{Mat3, Pt2, Pt3, Real, Vec2};

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Geometric image center, the default principal point guess.
    pub fn center(&self) -> Pt2 {
        Pt2::new(
            (self.width as Real - 1.0) * 0.5,
            (self.height as Real - 1.0) * 0.5,
        )
    }

    pub fn as_tuple(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Calibrated pinhole camera shared by every view of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub image_size: ImageSize,
    pub intrinsics: FxFyCxCySkew<Real>,
    pub distortion: BrownConrady5<Real>,
}

impl CameraModel {
    pub fn new(
        image_size: ImageSize,
        intrinsics: FxFyCxCySkew<Real>,
        distortion: BrownConrady5<Real>,
    ) -> Self {
        Self {
            image_size,
            intrinsics,
            distortion,
        }
    }

    pub fn k_matrix(&self) -> Mat3 {
        self.intrinsics.k_matrix()
    }

    /// Project a point expressed in the camera frame.
    ///
    /// Returns `None` for points on or behind the image plane.
    pub fn project(&self, p_c: &Pt3) -> Option<Pt2> {
        if p_c.z <= 0.0 {
            return None;
        }
        let n = Vec2::new(p_c.x / p_c.z, p_c.y / p_c.z);
        let nd = self.distortion.distort(&n);
        let px = self.intrinsics.to_pixel(&nd);
        Some(Pt2::new(px.x, px.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_principal_axis_to_principal_point() {
        let cam = CameraModel::new(
            ImageSize::new(1280, 720),
            FxFyCxCySkew {
                fx: 800.0,
                fy: 800.0,
                cx: 640.0,
                cy: 360.0,
                skew: 0.0,
            },
            BrownConrady5::zero(),
        );
        let px = cam.project(&Pt3::new(0.0, 0.0, 2.0)).unwrap();
        assert_eq!(px, Pt2::new(640.0, 360.0));
        assert!(cam.project(&Pt3::new(0.0, 0.0, -1.0)).is_none());
        assert_eq!(cam.image_size.center(), Pt2::new(639.5, 359.5));
    }
}
