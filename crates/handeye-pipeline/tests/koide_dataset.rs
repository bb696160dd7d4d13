use std::fmt::Write as _;
use std::path::Path;

use approx::assert_relative_eq;
use handeye_core::synthetic::planar::{poses_around_target, project_views_all};
use handeye_core::{
    BrownConrady5, CalibError, CameraModel, CorrespondenceSet, FxFyCxCySkew, ImageSize,
    PatternGeometry, PatternKind, RigidPose, TargetModel, Vec3,
};
use handeye_pipeline::dataset::{
    load_image_detections, load_koide_poses, DetectionEntry, PrecomputedDetections,
};
use handeye_pipeline::{CalibrationRecordAssembler, IntrinsicCalibrationSolver, RecordDocument};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const N_VIEWS: usize = 8;

fn camera() -> CameraModel {
    CameraModel::new(
        ImageSize::new(640, 480),
        FxFyCxCySkew {
            fx: 520.0,
            fy: 518.0,
            cx: 322.0,
            cy: 241.0,
            skew: 0.0,
        },
        BrownConrady5 {
            k1: -0.08,
            k2: 0.01,
            k3: 0.0,
            p1: 0.0,
            p2: 0.0,
        },
    )
}

fn model() -> TargetModel {
    TargetModel::from_geometry(&PatternGeometry::new(4, 11, 0.016, PatternKind::AsymmetricCircles))
}

fn random_hand_pose(rng: &mut StdRng) -> RigidPose {
    let axis = Vec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    )
    .normalize();
    let angle = rng.random_range(0.1..3.0);
    let t = Vec3::new(
        rng.random_range(-0.5..0.5),
        rng.random_range(-0.5..0.5),
        rng.random_range(0.2..1.0),
    );
    RigidPose::new(axis * angle, t)
}

fn write_pose_csv(path: &Path, pose: &RigidPose) {
    let m = pose.to_matrix();
    let mut text = String::new();
    for r in 0..4 {
        let row: Vec<String> = (0..4).map(|c| format!("{:.17e}", m[(r, c)])).collect();
        writeln!(text, "{}", row.join(" ")).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

/// Build a Koide-style directory: `<i>.png`, `<i>.csv` and a detections file.
fn write_dataset(dir: &Path, n_poses: usize) -> (Vec<RigidPose>, Vec<RigidPose>, PrecomputedDetections) {
    let cam = camera();
    let model = model();
    let eto = poses_around_target(&model, N_VIEWS, 0.45);
    let views = project_views_all(&cam, &model, &eto).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let mut wth = Vec::new();
    let mut detections = PrecomputedDetections::default();
    for (i, view) in views.iter().enumerate() {
        let image = format!("{i}.png");
        std::fs::write(dir.join(&image), b"").unwrap();
        detections.insert(
            image,
            DetectionEntry {
                width: 640,
                height: 480,
                points: Some(view.points.iter().map(|p| [p.x, p.y]).collect()),
            },
        );
        if i < n_poses {
            let pose = random_hand_pose(&mut rng);
            write_pose_csv(&dir.join(format!("{i}.csv")), &pose);
            wth.push(pose);
        }
    }
    (wth, eto, detections)
}

#[test]
fn koide_directory_to_record() {
    let dir = tempfile::tempdir().unwrap();
    let (wth_gt, eto_gt, detector) = write_dataset(dir.path(), N_VIEWS);

    let model = model();
    let detections = load_image_detections(dir.path(), &detector).unwrap();
    let wth = load_koide_poses(dir.path()).unwrap();
    assert_eq!(wth.len(), N_VIEWS);

    let set = CorrespondenceSet::new(model.clone(), detections).unwrap();
    let solution = IntrinsicCalibrationSolver::default().solve(&set).unwrap();
    let record = CalibrationRecordAssembler
        .from_solution(solution, model, set.into_views(), wth)
        .unwrap();

    assert_eq!(record.views().len(), N_VIEWS);
    assert!((record.camera().intrinsics.fx - 520.0).abs() < 1e-2);
    assert!(record.rms_reprojection_error().unwrap() < 1e-6);
    for (i, view) in record.views().iter().enumerate() {
        assert_eq!(view.tag.source, format!("{i}.png"));
        assert_relative_eq!(view.wth.rvec, wth_gt[i].rvec, epsilon = 1e-9);
        assert_relative_eq!(view.wth.tvec, wth_gt[i].tvec, epsilon = 1e-12);
        assert_relative_eq!(view.eto.tvec, eto_gt[i].tvec, epsilon = 1e-5);
    }

    let out = dir.path().join("out.json");
    record.write_json(&out).unwrap();
    let doc: RecordDocument =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc.views.len(), N_VIEWS);
    assert_eq!(doc.object_points.len(), 44);
    assert_eq!(doc.object_points[4], [0.016, 0.016, 0.0]);
}

#[test]
fn missing_pose_file_is_view_count_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, detector) = write_dataset(dir.path(), N_VIEWS - 1);

    let model = model();
    let detections = load_image_detections(dir.path(), &detector).unwrap();
    let wth = load_koide_poses(dir.path()).unwrap();
    let set = CorrespondenceSet::new(model.clone(), detections).unwrap();
    let solution = IntrinsicCalibrationSolver::default().solve(&set).unwrap();

    let err = CalibrationRecordAssembler
        .from_solution(solution, model, set.into_views(), wth)
        .unwrap_err();
    match err {
        CalibError::ViewCountMismatch {
            image_points,
            wth,
            eto,
        } => assert_eq!((image_points, wth, eto), (N_VIEWS, N_VIEWS - 1, N_VIEWS)),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_pose_file_is_input_format() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("0.csv"), "1 0 0 0\n0 1 0 0\n0 0 1 0\n").unwrap();
    let err = load_koide_poses(dir.path()).unwrap_err();
    assert!(matches!(err, CalibError::InputFormat { .. }), "{err}");

    std::fs::write(
        dir.path().join("0.csv"),
        "1 0 0 0\n0 2 0 0\n0 0 1 0\n0 0 0 1\n",
    )
    .unwrap();
    let err = load_koide_poses(dir.path()).unwrap_err();
    assert!(err.to_string().contains("0.csv"), "{err}");
}
