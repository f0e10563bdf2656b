//! Calibration and output configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default seed for the null-model synthesizer.
///
/// Fixed so that thresholds and verdicts are reproducible run to run; change it
/// only together with the published calibration document.
pub const DEFAULT_SEED: u64 = 20_260_101;

/// Tunable constants for null-model calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Seed for the ChaCha stream shared by both synthetic populations.
    pub seed: u64,
    /// Lower bound on the realistic population size.
    pub min_realistic_samples: usize,
    /// Realistic draws per observed partition (used when it exceeds the floor).
    pub samples_per_partition: usize,
    /// Jitter standard deviation as a fraction of each field's robust scale.
    pub noise_scale: f64,
    /// Quantile of the realistic population used for "hi" cutoffs.
    pub hi_quantile: f64,
    /// Quantile of the realistic population used for "lo" cutoffs.
    pub lo_quantile: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            min_realistic_samples: 4000,
            samples_per_partition: 120,
            noise_scale: 0.25,
            hi_quantile: 0.975,
            lo_quantile: 0.025,
        }
    }
}

impl CalibrationConfig {
    /// Realistic sample count for `observed` partitions; zero when nothing was observed.
    pub fn realistic_sample_count(&self, observed: usize) -> usize {
        if observed == 0 {
            return 0;
        }
        self.min_realistic_samples
            .max(self.samples_per_partition.saturating_mul(observed))
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_realistic_samples == 0 {
            return Err(Error::Config(
                "min_realistic_samples must be at least 1".to_string(),
            ));
        }
        if !self.noise_scale.is_finite() || self.noise_scale < 0.0 {
            return Err(Error::Config(format!(
                "noise_scale must be a finite non-negative number, got {}",
                self.noise_scale
            )));
        }
        for (name, q) in [("hi_quantile", self.hi_quantile), ("lo_quantile", self.lo_quantile)] {
            if !(q > 0.0 && q < 1.0) {
                return Err(Error::Config(format!("{name} must lie in (0, 1), got {q}")));
            }
        }
        if self.lo_quantile >= self.hi_quantile {
            return Err(Error::Config(format!(
                "lo_quantile ({}) must be below hi_quantile ({})",
                self.lo_quantile, self.hi_quantile
            )));
        }
        Ok(())
    }
}

/// Load a calibration config from JSON. Absent fields take their defaults.
pub fn load_config_from_path(path: &Path) -> Result<CalibrationConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let config: CalibrationConfig =
        serde_json::from_str(&raw).map_err(|e| Error::parse(path, e))?;
    config.validate()?;
    Ok(config)
}

/// Where the three output documents land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub calibration_file: String,
    pub score_file: String,
    pub score_by_state_file: String,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self::in_dir("outputs/json")
    }
}

impl OutputPaths {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            calibration_file: "signal_null_model.json".to_string(),
            score_file: "signal_score.json".to_string(),
            score_by_state_file: "signal_score_by_state.json".to_string(),
        }
    }

    pub fn calibration(&self) -> PathBuf {
        self.dir.join(&self.calibration_file)
    }

    pub fn score(&self) -> PathBuf {
        self.dir.join(&self.score_file)
    }

    pub fn score_by_state(&self) -> PathBuf {
        self.dir.join(&self.score_by_state_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CalibrationConfig::default().validate().is_ok());
    }

    #[test]
    fn sample_count_floor_and_scaling() {
        let cfg = CalibrationConfig::default();
        assert_eq!(cfg.realistic_sample_count(0), 0);
        assert_eq!(cfg.realistic_sample_count(1), 4000);
        assert_eq!(cfg.realistic_sample_count(33), 4000);
        assert_eq!(cfg.realistic_sample_count(34), 4080);
        assert_eq!(cfg.realistic_sample_count(52), 6240);
    }

    #[test]
    fn rejects_bad_quantiles() {
        let cfg = CalibrationConfig {
            hi_quantile: 1.0,
            ..CalibrationConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let cfg = CalibrationConfig {
            lo_quantile: 0.6,
            hi_quantile: 0.4,
            ..CalibrationConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_negative_noise() {
        let cfg = CalibrationConfig {
            noise_scale: -0.1,
            ..CalibrationConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: CalibrationConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.min_realistic_samples, 4000);
        assert_eq!(cfg.hi_quantile, 0.975);
    }

    #[test]
    fn output_paths_join() {
        let paths = OutputPaths::in_dir("/tmp/out");
        assert_eq!(paths.score(), PathBuf::from("/tmp/out/signal_score.json"));
        assert_eq!(
            paths.calibration(),
            PathBuf::from("/tmp/out/signal_null_model.json")
        );
    }
}
