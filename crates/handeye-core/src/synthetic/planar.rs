//! Synthetic planar target helpers.
//!
//! The functions here generate camera-from-target poses that look at a planar
//! target from varied directions and project the target into the camera to
//! produce [`crate::ImageDetections`] instances.

use crate::{CameraModel, ImageDetections, Pt3, Real, RigidPose, TargetModel, Vec3, ViewTag};
use anyhow::Result;
use nalgebra::{Rotation3, Translation3, UnitQuaternion};

/// Centroid of the target points.
pub fn target_center(model: &TargetModel) -> Pt3 {
    let n = model.len().max(1) as Real;
    let sum = model.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords);
    Pt3::from(sum / n)
}

/// Pose that places the target center at `distance` on the optical axis,
/// tilted by `(tilt_x, tilt_y)` and rolled by `roll` (radians).
pub fn look_at_target(
    center: &Pt3,
    tilt_x: Real,
    tilt_y: Real,
    roll: Real,
    distance: Real,
) -> RigidPose {
    let rot = Rotation3::from_euler_angles(tilt_x, tilt_y, roll);
    let t = Vec3::new(0.0, 0.0, distance) - rot * center.coords;
    let iso = crate::Iso3::from_parts(
        Translation3::from(t),
        UnitQuaternion::from_rotation_matrix(&rot),
    );
    RigidPose::from_isometry(&iso)
}

/// Generate `n_views` distinct poses with tilts cycling through both axes.
///
/// Views alternate tilt direction so that any three consecutive views
/// constrain the intrinsics.
pub fn poses_around_target(model: &TargetModel, n_views: usize, distance: Real) -> Vec<RigidPose> {
    let center = target_center(model);
    (0..n_views)
        .map(|i| {
            let phase = i as Real * 2.0 * std::f64::consts::PI / n_views.max(1) as Real;
            let tilt = 0.25 + 0.05 * (i % 3) as Real;
            look_at_target(
                &center,
                tilt * phase.cos(),
                tilt * phase.sin(),
                0.1 * (i as Real - n_views as Real * 0.5) / n_views.max(1) as Real,
                distance + 0.05 * (i % 4) as Real,
            )
        })
        .collect()
}

/// Project the target through one pose, requiring every point to be visible.
///
/// `cam_from_target` must map target-frame points into the camera frame.
pub fn project_view_all(
    camera: &CameraModel,
    cam_from_target: &RigidPose,
    model: &TargetModel,
    tag: ViewTag,
) -> Result<ImageDetections> {
    let iso = cam_from_target.to_isometry();
    let mut pixels = Vec::with_capacity(model.len());
    for (idx, pw) in model.iter().enumerate() {
        let pc = iso.transform_point(pw);
        let Some(uv) = camera.project(&pc) else {
            anyhow::bail!("point {idx} not projectable (z={:.6})", pc.z);
        };
        pixels.push(uv);
    }
    Ok(ImageDetections::new(tag, camera.image_size, pixels))
}

/// Project multiple views, tagging them `synthetic#<index>`.
pub fn project_views_all(
    camera: &CameraModel,
    model: &TargetModel,
    cam_from_target: &[RigidPose],
) -> Result<Vec<ImageDetections>> {
    cam_from_target
        .iter()
        .enumerate()
        .map(|(idx, pose)| {
            project_view_all(
                camera,
                pose,
                model,
                ViewTag::positional(idx, format!("synthetic#{idx}")),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrownConrady5, FxFyCxCySkew, ImageSize, PatternGeometry, PatternKind};

    fn camera() -> CameraModel {
        CameraModel::new(
            ImageSize::new(1280, 720),
            FxFyCxCySkew {
                fx: 800.0,
                fy: 800.0,
                cx: 640.0,
                cy: 360.0,
                skew: 0.0,
            },
            BrownConrady5::zero(),
        )
    }

    #[test]
    fn look_at_puts_center_on_axis() {
        let model =
            TargetModel::from_geometry(&PatternGeometry::new(5, 4, 0.05, PatternKind::Chessboard));
        let center = target_center(&model);
        let pose = look_at_target(&center, 0.2, -0.1, 0.3, 0.8);
        let pc = pose.to_isometry().transform_point(&center);
        assert!((pc.coords - Vec3::new(0.0, 0.0, 0.8)).norm() < 1e-12);
    }

    #[test]
    fn projected_views_stay_in_image() {
        let model =
            TargetModel::from_geometry(&PatternGeometry::new(9, 6, 0.025, PatternKind::Chessboard));
        let poses = poses_around_target(&model, 8, 0.6);
        let views = project_views_all(&camera(), &model, &poses).unwrap();
        assert_eq!(views.len(), 8);
        for v in &views {
            assert_eq!(v.len(), model.len());
            for p in &v.points {
                assert!(p.x > 0.0 && p.x < 1280.0 && p.y > 0.0 && p.y < 720.0);
            }
        }
    }

    #[test]
    fn poses_are_distinct() {
        let model =
            TargetModel::from_geometry(&PatternGeometry::new(4, 3, 0.05, PatternKind::Chessboard));
        let poses = poses_around_target(&model, 6, 0.7);
        for i in 0..poses.len() {
            for j in (i + 1)..poses.len() {
                assert!((poses[i].rvec - poses[j].rvec).norm() > 1e-3);
            }
        }
    }
}
