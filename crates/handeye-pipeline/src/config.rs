use std::path::Path;

use handeye_core::{CalibError, CalibResult, Real};
use handeye_optim::SolveOptions;
use serde::{Deserialize, Serialize};

/// Levenberg-Marquardt implementation used for refinement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-house dense damped LM; records the cost of every accepted step.
    #[default]
    DampedLm,
    /// MINPACK port from the `levenberg-marquardt` crate.
    Minpack,
}

/// Settings of the intrinsic calibration solver.
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub backend: BackendKind,
    /// Iteration cap of the refinement.
    pub max_iters: usize,
    pub ftol: Real,
    pub xtol: Real,
    pub gtol: Real,
    /// Keep the skew term at zero.
    pub zero_skew: bool,
    /// Estimate per-view homographies on the rayon thread pool.
    pub parallel_init: bool,
    /// Log every solver iteration at debug level.
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::DampedLm,
            max_iters: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            zero_skew: true,
            parallel_init: true,
            verbose: false,
        }
    }
}

impl SolverConfig {
    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            max_iters: self.max_iters,
            ftol: self.ftol,
            gtol: self.gtol,
            xtol: self.xtol,
            verbose: self.verbose,
        }
    }

    /// Read a JSON config file.
    pub fn from_json_file(path: &Path) -> CalibResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| CalibError::io(path, e))?;
        serde_json::from_str(&data)
            .map_err(|e| CalibError::input_format(path.display().to_string(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: SolverConfig =
            serde_json::from_str(r#"{ "backend": "minpack", "max_iters": 40 }"#).unwrap();
        assert_eq!(cfg.backend, BackendKind::Minpack);
        assert_eq!(cfg.max_iters, 40);
        assert!(cfg.zero_skew);
        assert_eq!(cfg.ftol, 1e-12);
    }

    #[test]
    fn config_json_roundtrip() {
        let config = SolverConfig {
            zero_skew: false,
            parallel_init: false,
            ..SolverConfig::default()
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("damped_lm"), "json missing backend: {json}");
        let de: SolverConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(de, config);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = serde_json::from_str::<SolverConfig>(r#"{ "backend": "ceres" }"#);
        assert!(err.is_err());
    }
}
