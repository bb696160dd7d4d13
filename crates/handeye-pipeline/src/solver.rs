//! Planar intrinsic calibration: closed-form initialization followed by joint
//! Levenberg-Marquardt refinement of intrinsics, distortion and view poses.

use handeye_core::{
    BrownConrady5, CalibError, CalibResult, CalibWarning, CameraModel, CorrespondenceSet,
    FxFyCxCySkew, ImageDetections, ImageSize, Iso3, Mat3, Pt2, Real, RigidPose, ViewTag,
};
use handeye_linear::{
    dlt_homography, estimate_focal_with_principal_point, estimate_intrinsics_conditioned,
    estimate_planar_pose_from_h, homography_rms,
};
use handeye_optim::{
    refine_planar_intrinsics, DampedLmBackend, LmBackend, PlanarIntrinsicsEstimate,
    PlanarIntrinsicsProblem, SolveReport,
};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::{BackendKind, SolverConfig};

/// Views whose initial orientations all lie within this angle (radians) of
/// each other do not constrain the intrinsics.
const MIN_ROTATION_SPREAD: Real = 1e-2;

/// Result of an intrinsic calibration run.
#[derive(Debug, Clone)]
pub struct CalibrationSolution {
    pub camera: CameraModel,
    /// Camera-from-target pose (`eTo`) of every view, in input order.
    pub poses: Vec<(ViewTag, RigidPose)>,
    pub report: SolveReport,
    pub warnings: Vec<CalibWarning>,
    /// RMS reprojection error in pixels.
    pub rms: Real,
}

/// Estimates camera intrinsics and per-view target poses from a
/// [`CorrespondenceSet`].
#[derive(Debug, Clone, Default)]
pub struct IntrinsicCalibrationSolver {
    config: SolverConfig,
}

/// Shorthand for `IntrinsicCalibrationSolver::new(config.clone()).solve(set)`.
pub fn calibrate_intrinsics(
    set: &CorrespondenceSet,
    config: &SolverConfig,
) -> CalibResult<CalibrationSolution> {
    IntrinsicCalibrationSolver::new(config.clone()).solve(set)
}

impl IntrinsicCalibrationSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Calibrate the camera.
    ///
    /// # Errors
    ///
    /// - [`CalibError::InsufficientViews`] for an empty set.
    /// - [`CalibError::DegenerateGeometry`] when views disagree on image size,
    ///   the target has fewer than 4 points or is not planar, all views share
    ///   one pose, or no initialization can be found.
    pub fn solve(&self, set: &CorrespondenceSet) -> CalibResult<CalibrationSolution> {
        let n_views = set.num_views();
        if n_views < 1 {
            return Err(CalibError::InsufficientViews {
                required: 1,
                found: n_views,
            });
        }
        let image_size = set.image_size()?;
        let model = set.model();
        if model.len() < 4 {
            return Err(CalibError::degenerate(format!(
                "target has {} points, need at least 4",
                model.len()
            )));
        }
        if !model.is_planar() {
            return Err(CalibError::degenerate("target points are not on the Z = 0 plane"));
        }

        info!(
            "calibrating from {n_views} views of {} points ({}x{} px)",
            model.len(),
            image_size.width,
            image_size.height
        );

        let homographies = self.estimate_homographies(set)?;

        let mut intrinsics = initial_intrinsics(&homographies, image_size)?;
        if self.config.zero_skew {
            intrinsics.skew = 0.0;
        }
        debug!(
            "initial intrinsics: fx={:.3} fy={:.3} cx={:.3} cy={:.3} skew={:.3}",
            intrinsics.fx, intrinsics.fy, intrinsics.cx, intrinsics.cy, intrinsics.skew
        );

        let kmtx = intrinsics.k_matrix();
        let initial_isos = homographies
            .iter()
            .zip(set.views())
            .map(|(h, view)| {
                estimate_planar_pose_from_h(&kmtx, h)
                    .map_err(|e| CalibError::degenerate(format!("pose of {}: {e}", view.tag)))
            })
            .collect::<CalibResult<Vec<_>>>()?;
        check_rotation_spread(&initial_isos)?;
        let initial_poses: Vec<RigidPose> =
            initial_isos.iter().map(RigidPose::from_isometry).collect();

        let initial_camera = CameraModel::new(image_size, intrinsics, BrownConrady5::zero());
        let estimate = self.refine(set, &initial_camera, &initial_poses)?;

        let mut warnings = Vec::new();
        if !estimate.report.converged {
            let warning = CalibWarning::ConvergenceWarning {
                iterations: estimate.report.iterations,
                final_cost: estimate.report.final_cost,
            };
            warn!("{warning}");
            warnings.push(warning);
        }
        info!(
            "refinement finished after {} iterations, rms {:.4} px",
            estimate.report.iterations, estimate.rms
        );

        let PlanarIntrinsicsEstimate {
            camera,
            poses,
            report,
            rms,
        } = estimate;
        let poses = set
            .views()
            .iter()
            .map(|v| v.tag.clone())
            .zip(poses)
            .collect();

        Ok(CalibrationSolution {
            camera,
            poses,
            report,
            warnings,
            rms,
        })
    }

    fn estimate_homographies(&self, set: &CorrespondenceSet) -> CalibResult<Vec<Mat3>> {
        let world = set.model().planar_points();
        let estimate = |view: &ImageDetections| -> CalibResult<Mat3> {
            let h = dlt_homography(&world, &view.points)
                .map_err(|e| CalibError::degenerate(format!("homography of {}: {e}", view.tag)))?;
            debug!(
                "{}: homography rms {:.4} px",
                view.tag,
                homography_rms(&h, &world, &view.points)
            );
            Ok(h)
        };
        if self.config.parallel_init {
            set.views().par_iter().map(estimate).collect()
        } else {
            set.views().iter().map(estimate).collect()
        }
    }

    fn refine(
        &self,
        set: &CorrespondenceSet,
        initial_camera: &CameraModel,
        initial_poses: &[RigidPose],
    ) -> CalibResult<PlanarIntrinsicsEstimate> {
        let views = set.views().iter().map(|v| v.points.clone()).collect();
        let problem = PlanarIntrinsicsProblem::new(
            set.model().clone(),
            views,
            initial_camera,
            self.config.zero_skew,
        )
        .map_err(|e| CalibError::degenerate(e.to_string()))?;
        let x0 = problem
            .pack_params(initial_camera, initial_poses)
            .map_err(|e| CalibError::degenerate(e.to_string()))?;

        let opts = self.config.solve_options();
        let estimate = match self.config.backend {
            BackendKind::DampedLm => {
                refine_planar_intrinsics(&DampedLmBackend::default(), &problem, x0, &opts)
            }
            BackendKind::Minpack => refine_planar_intrinsics(&LmBackend, &problem, x0, &opts),
        };

        let k = &estimate.camera.intrinsics;
        let finite = [k.fx, k.fy, k.cx, k.cy, estimate.rms]
            .iter()
            .all(|v| v.is_finite());
        if !finite || k.fx <= 0.0 || k.fy <= 0.0 {
            return Err(CalibError::degenerate(
                "refinement diverged to an invalid camera",
            ));
        }
        Ok(estimate)
    }
}

/// Largest pairwise rotation angle between the poses, in radians.
fn max_rotation_spread(poses: &[Iso3]) -> Real {
    let mut spread: Real = 0.0;
    for (i, a) in poses.iter().enumerate() {
        for b in &poses[i + 1..] {
            spread = spread.max(a.rotation.angle_to(&b.rotation));
        }
    }
    spread
}

fn check_rotation_spread(poses: &[Iso3]) -> CalibResult<()> {
    if poses.len() < 2 {
        return Ok(());
    }
    let spread = max_rotation_spread(poses);
    debug!("initial poses span {spread:.4} rad of rotation");
    if spread < MIN_ROTATION_SPREAD {
        return Err(CalibError::degenerate(format!(
            "all {} views share one target orientation (max rotation difference {spread:.2e} rad)",
            poses.len()
        )));
    }
    Ok(())
}

/// Zhang's closed form when there are at least three views, otherwise (or if
/// it is ill-posed) focal lengths with the principal point at the image center.
fn initial_intrinsics(
    homographies: &[Mat3],
    image_size: ImageSize,
) -> CalibResult<FxFyCxCySkew<Real>> {
    let (w, h) = (image_size.width as Real, image_size.height as Real);
    if homographies.len() >= 3 {
        match estimate_intrinsics_conditioned(homographies, w, h) {
            Ok(k) if plausible(&k, image_size) => return Ok(k),
            Ok(k) => debug!(
                "closed-form intrinsics rejected (fx={:.3}, fy={:.3}, cx={:.3}, cy={:.3})",
                k.fx, k.fy, k.cx, k.cy
            ),
            Err(e) => debug!("closed-form intrinsics failed: {e}"),
        }
    }

    let center: Pt2 = image_size.center();
    estimate_focal_with_principal_point(homographies, &center, 0.5 * (w + h))
        .map_err(|e| CalibError::degenerate(format!("cannot initialize intrinsics: {e}")))
}

fn plausible(k: &FxFyCxCySkew<Real>, image_size: ImageSize) -> bool {
    let (w, h) = (image_size.width as Real, image_size.height as Real);
    [k.fx, k.fy, k.cx, k.cy, k.skew].iter().all(|v| v.is_finite())
        && k.fx > 0.0
        && k.fy > 0.0
        && (-w..=2.0 * w).contains(&k.cx)
        && (-h..=2.0 * h).contains(&k.cy)
}
