//! Error taxonomy shared by loaders, solver and record assembly.
//!
//! Every variant of [`CalibError`] is fatal for the run: it propagates to the
//! top level unchanged. The only non-fatal condition is
//! [`CalibWarning::ConvergenceWarning`], which travels next to a result
//! instead of replacing it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Real;

/// Fatal conditions of a dataset-preparation run.
#[derive(Debug, Error)]
pub enum CalibError {
    /// Malformed pose, metadata or detection file.
    #[error("malformed input in {source_name}: {message}")]
    InputFormat {
        source_name: String,
        message: String,
    },
    /// An image yielded no detectable pattern.
    #[error("no target detected in {}", file.display())]
    DetectionFailure { file: PathBuf },
    /// An image differs in size from the first image of the sequence.
    #[error(
        "image size of {} is {}x{}, expected {}x{}",
        file.display(), found.0, found.1, expected.0, expected.1
    )]
    DimensionMismatch {
        file: PathBuf,
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// A view carries a different number of detections than the target model.
    #[error("view {view} has {found} image points, target model has {expected}")]
    CorrespondenceLengthMismatch {
        view: usize,
        expected: usize,
        found: usize,
    },
    /// The parallel per-view sequences of a record differ in length.
    #[error(
        "view count mismatch: {image_points} image point sets, {wth} wTh poses, \
         {eto} eTo poses"
    )]
    ViewCountMismatch {
        image_points: usize,
        wth: usize,
        eto: usize,
    },
    /// Two sequences disagree on which capture sits at a position.
    #[error("view {position}: detections come from {left} but pose comes from {right}")]
    ViewTagMismatch {
        position: usize,
        left: String,
        right: String,
    },
    /// Solver received no views.
    #[error("need at least {required} view(s), got {found}")]
    InsufficientViews { required: usize, found: usize },
    /// Solver input cannot determine the camera.
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry { reason: String },
    /// Filesystem access failed.
    #[error("cannot read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CalibError {
    /// Shorthand for [`CalibError::InputFormat`].
    pub fn input_format(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InputFormat {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`CalibError::DegenerateGeometry`].
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateGeometry {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`CalibError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used across the workspace.
pub type CalibResult<T> = Result<T, CalibError>;

/// Non-fatal conditions reported alongside a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CalibWarning {
    /// The refinement hit its iteration cap; the best estimate is still returned.
    ConvergenceWarning { iterations: usize, final_cost: Real },
}

impl std::fmt::Display for CalibWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibWarning::ConvergenceWarning {
                iterations,
                final_cost,
            } => write!(
                f,
                "refinement stopped at the iteration cap ({iterations} iterations, cost {final_cost:.3e})"
            ),
        }
    }
}
