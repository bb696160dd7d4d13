//! Final per-view calibration record and its serialized layout.

use std::path::Path;

use handeye_core::{
    CalibError, CalibResult, CameraModel, ImageDetections, Pt2, Real, RigidPose, TargetModel,
    ViewTag,
};
use log::info;
use serde::{Deserialize, Serialize};

use crate::solver::CalibrationSolution;

/// One capture: detected target points with the hand pose and the estimated
/// target pose.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub tag: ViewTag,
    pub image_points: Vec<Pt2>,
    /// Hand (end-effector) pose in the world/robot base frame.
    pub wth: RigidPose,
    /// Target pose in the camera (eye) frame.
    pub eto: RigidPose,
}

/// Camera, target and views of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    camera: CameraModel,
    target: TargetModel,
    views: Vec<View>,
    rms_reprojection_error: Option<Real>,
}

impl CalibrationRecord {
    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    pub fn target(&self) -> &TargetModel {
        &self.target
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn rms_reprojection_error(&self) -> Option<Real> {
        self.rms_reprojection_error
    }

    /// Attach the RMS reprojection error of the calibration.
    pub fn with_rms(mut self, rms: Real) -> Self {
        self.rms_reprojection_error = Some(rms);
        self
    }

    /// Serializable document in the dataset exchange layout.
    pub fn to_document(&self) -> RecordDocument {
        let k = &self.camera.intrinsics;
        RecordDocument {
            camera_calibration: CameraCalibration {
                fx: k.fx,
                fy: k.fy,
                s: k.skew,
                u0: k.cx,
                v0: k.cy,
            },
            distortion_coefficients: self.camera.distortion.coefficients().to_vec(),
            object_points: self.target.iter().map(|p| [p.x, p.y, p.z]).collect(),
            views: self
                .views
                .iter()
                .map(|v| ViewDocument {
                    source: v.tag.source.clone(),
                    image_points: v.image_points.iter().map(|p| [p.x, p.y]).collect(),
                    wth: PoseDocument::from(&v.wth),
                    eto: PoseDocument::from(&v.eto),
                })
                .collect(),
            image_width: self.camera.image_size.width,
            image_height: self.camera.image_size.height,
            rms_reprojection_error: self.rms_reprojection_error,
        }
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_document())
    }

    /// Write the record as pretty JSON.
    pub fn write_json(&self, path: &Path) -> CalibResult<()> {
        let json = self
            .to_json_string()
            .map_err(|e| CalibError::input_format(path.display().to_string(), e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CalibError::io(path, e))?;
        info!("wrote {} views to {}", self.views.len(), path.display());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub fx: Real,
    pub fy: Real,
    pub s: Real,
    pub u0: Real,
    pub v0: Real,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseDocument {
    pub rvec: [Real; 3],
    pub tvec: [Real; 3],
}

impl From<&RigidPose> for PoseDocument {
    fn from(p: &RigidPose) -> Self {
        Self {
            rvec: [p.rvec.x, p.rvec.y, p.rvec.z],
            tvec: [p.tvec.x, p.tvec.y, p.tvec.z],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDocument {
    pub source: String,
    pub image_points: Vec<[Real; 2]>,
    #[serde(rename = "wTh")]
    pub wth: PoseDocument,
    #[serde(rename = "eTo")]
    pub eto: PoseDocument,
}

/// Serialized form of a [`CalibrationRecord`].
///
/// Distortion coefficients are in OpenCV order `[k1, k2, p1, p2, k3]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDocument {
    pub camera_calibration: CameraCalibration,
    pub distortion_coefficients: Vec<Real>,
    pub object_points: Vec<[Real; 3]>,
    pub views: Vec<ViewDocument>,
    pub image_width: u32,
    pub image_height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rms_reprojection_error: Option<Real>,
}

/// Zips detections, hand poses and estimated target poses into a
/// [`CalibrationRecord`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CalibrationRecordAssembler;

/// Shorthand for [`CalibrationRecordAssembler::assemble`].
pub fn assemble(
    camera: CameraModel,
    target: TargetModel,
    detections: Vec<ImageDetections>,
    wth: Vec<(ViewTag, RigidPose)>,
    eto: Vec<(ViewTag, RigidPose)>,
) -> CalibResult<CalibrationRecord> {
    CalibrationRecordAssembler.assemble(camera, target, detections, wth, eto)
}

fn check_tags(position: usize, left: &ViewTag, right: &ViewTag) -> CalibResult<()> {
    if left.matches(right) {
        Ok(())
    } else {
        Err(CalibError::ViewTagMismatch {
            position,
            left: left.to_string(),
            right: right.to_string(),
        })
    }
}

impl CalibrationRecordAssembler {
    /// Build the record.
    ///
    /// # Errors
    ///
    /// - [`CalibError::ViewCountMismatch`] when the three sequences differ in
    ///   length.
    /// - [`CalibError::ViewTagMismatch`] when a position carries different
    ///   captures in two sequences.
    /// - [`CalibError::CorrespondenceLengthMismatch`] when a view's point count
    ///   differs from the target.
    pub fn assemble(
        &self,
        camera: CameraModel,
        target: TargetModel,
        detections: Vec<ImageDetections>,
        wth: Vec<(ViewTag, RigidPose)>,
        eto: Vec<(ViewTag, RigidPose)>,
    ) -> CalibResult<CalibrationRecord> {
        if detections.len() != wth.len() || wth.len() != eto.len() {
            return Err(CalibError::ViewCountMismatch {
                image_points: detections.len(),
                wth: wth.len(),
                eto: eto.len(),
            });
        }

        for (position, ((det, (wth_tag, _)), (eto_tag, _))) in
            detections.iter().zip(&wth).zip(&eto).enumerate()
        {
            check_tags(position, &det.tag, wth_tag)?;
            check_tags(position, &det.tag, eto_tag)?;
            if det.len() != target.len() {
                return Err(CalibError::CorrespondenceLengthMismatch {
                    view: position,
                    expected: target.len(),
                    found: det.len(),
                });
            }
        }

        let views = detections
            .into_iter()
            .zip(wth)
            .zip(eto)
            .map(|((det, (_, wth)), (_, eto))| View {
                tag: det.tag,
                image_points: det.points,
                wth,
                eto,
            })
            .collect();

        Ok(CalibrationRecord {
            camera,
            target,
            views,
            rms_reprojection_error: None,
        })
    }

    /// Assemble from a solver result and the detections it was computed from.
    pub fn from_solution(
        &self,
        solution: CalibrationSolution,
        target: TargetModel,
        detections: Vec<ImageDetections>,
        wth: Vec<(ViewTag, RigidPose)>,
    ) -> CalibResult<CalibrationRecord> {
        let rms = solution.rms;
        self.assemble(solution.camera, target, detections, wth, solution.poses)
            .map(|record| record.with_rms(rms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handeye_core::{
        BrownConrady5, FxFyCxCySkew, ImageSize, PatternGeometry, PatternKind, Vec3,
    };

    fn camera() -> CameraModel {
        CameraModel::new(
            ImageSize::new(640, 480),
            FxFyCxCySkew {
                fx: 500.0,
                fy: 501.0,
                cx: 320.0,
                cy: 240.0,
                skew: 0.0,
            },
            BrownConrady5 {
                k1: -0.1,
                k2: 0.02,
                k3: 0.0,
                p1: 0.001,
                p2: 0.002,
            },
        )
    }

    fn target() -> TargetModel {
        TargetModel::from_geometry(&PatternGeometry::new(2, 2, 0.01, PatternKind::Chessboard))
    }

    fn detections(n: usize) -> Vec<ImageDetections> {
        (0..n)
            .map(|i| {
                ImageDetections::new(
                    ViewTag::new(i, Some(i as u64), format!("img{i}.png")),
                    ImageSize::new(640, 480),
                    vec![Pt2::new(i as Real, 1.0); 4],
                )
            })
            .collect()
    }

    fn poses(n: usize, prefix: &str) -> Vec<(ViewTag, RigidPose)> {
        (0..n)
            .map(|i| {
                (
                    ViewTag::new(i, Some(i as u64), format!("{prefix}{i}")),
                    RigidPose::new(Vec3::new(0.1 * i as Real, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
                )
            })
            .collect()
    }

    #[test]
    fn five_detections_four_poses_is_rejected() {
        let err = assemble(camera(), target(), detections(5), poses(4, "pose"), poses(4, "eto"))
            .unwrap_err();
        match err {
            CalibError::ViewCountMismatch {
                image_points,
                wth,
                eto,
            } => assert_eq!((image_points, wth, eto), (5, 4, 4)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tag_mismatch_is_reported_with_position() {
        let mut wth = poses(3, "pose");
        wth.swap(1, 2);
        let err = assemble(camera(), target(), detections(3), wth, poses(3, "eto")).unwrap_err();
        assert!(matches!(err, CalibError::ViewTagMismatch { position: 1, .. }));
    }

    #[test]
    fn unkeyed_poses_match_by_index() {
        let wth = (0..3)
            .map(|i| (ViewTag::positional(i, "robot_cali.txt"), RigidPose::identity()))
            .collect();
        let record = assemble(camera(), target(), detections(3), wth, poses(3, "eto")).unwrap();
        assert_eq!(record.views().len(), 3);
        assert_eq!(record.views()[2].tag.source, "img2.png");
    }

    #[test]
    fn document_layout_matches_exchange_format() {
        let record = assemble(camera(), target(), detections(2), poses(2, "pose"), poses(2, "eto"))
            .unwrap()
            .with_rms(0.25);
        let value: serde_json::Value = serde_json::from_str(&record.to_json_string().unwrap()).unwrap();

        assert_eq!(value["camera_calibration"]["u0"], 320.0);
        assert_eq!(value["camera_calibration"]["s"], 0.0);
        let dist = value["distortion_coefficients"].as_array().unwrap();
        assert_eq!(dist.len(), 5);
        assert_eq!(dist[2], 0.001);
        assert_eq!(dist[4], 0.0);
        assert_eq!(value["object_points"].as_array().unwrap().len(), 4);
        assert_eq!(value["object_points"][1][0], 0.01);
        let view = &value["views"][1];
        assert_eq!(view["source"], "img1.png");
        assert_eq!(view["image_points"][0][0], 1.0);
        assert_eq!(view["wTh"]["rvec"][0], 0.1);
        assert_eq!(view["eTo"]["tvec"][2], 1.0);
        assert_eq!(value["image_width"], 640);
        assert_eq!(value["rms_reprojection_error"], 0.25);

        let doc: RecordDocument = serde_json::from_value(value).unwrap();
        assert_eq!(doc, record.to_document());
    }
}
