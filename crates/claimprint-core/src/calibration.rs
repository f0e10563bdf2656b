//! Calibration Record: thresholds plus the evidence that they separate the
//! realistic null population from the artifacted one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::config::CalibrationConfig;
use crate::error::{Error, Result};
use crate::features::FeatureVector;
use crate::null_model::synthesize;
use crate::signals::evaluate;
use crate::thresholds::{ThresholdSet, derive_thresholds};
use crate::verdict::FAMILY_FAIL_RULE;

/// Identifies the synthesizer + quantile recipe behind a record.
pub const METHOD: &str = "bootstrap_mad_jitter_null_v1";

/// Mean / median / p90 of a fail-count distribution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistSummary {
    pub mean: f64,
    pub median: f64,
    pub p90: f64,
}

impl From<claimprint_stats::Summary> for DistSummary {
    fn from(s: claimprint_stats::Summary) -> Self {
        Self {
            mean: s.mean,
            median: s.median,
            p90: s.p90,
        }
    }
}

/// How one synthetic population fares against the derived thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PopulationBenchmark {
    pub family_fail_count: DistSummary,
    pub raw_fail_count: DistSummary,
    /// Share of samples that would be flagged by the family rule.
    pub flag_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Benchmark {
    pub realistic: PopulationBenchmark,
    pub synthetic: PopulationBenchmark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub method: String,
    pub seed: u64,
    pub observed_samples: usize,
    pub realistic_samples: usize,
    pub synthetic_samples: usize,
    pub noise_scale: f64,
    pub hi_quantile: f64,
    pub lo_quantile: f64,
    pub observed_partitions: Vec<String>,
    /// Hex SHA-256 over the observed partition ids and their feature vectors.
    pub observed_digest: String,
    /// True when thresholds are the fixed fallback set.
    pub fallback: bool,
    pub thresholds: ThresholdSet,
    pub benchmark: Benchmark,
}

/// Evaluate every sample and summarize the fail counts.
pub fn benchmark_population(
    population: &[FeatureVector],
    thresholds: &ThresholdSet,
) -> PopulationBenchmark {
    if population.is_empty() {
        return PopulationBenchmark::default();
    }
    let mut family = Vec::with_capacity(population.len());
    let mut raw = Vec::with_capacity(population.len());
    let mut flagged = 0usize;
    for sample in population {
        let e = evaluate(sample, thresholds);
        let fails = e.family_fail_count();
        if fails >= FAMILY_FAIL_RULE {
            flagged += 1;
        }
        family.push(fails as f64);
        raw.push(e.raw_fail_count() as f64);
    }
    PopulationBenchmark {
        family_fail_count: claimprint_stats::Summary::of(&family).into(),
        raw_fail_count: claimprint_stats::Summary::of(&raw).into(),
        flag_rate: flagged as f64 / population.len() as f64,
    }
}

pub fn observed_digest(observed: &[(String, FeatureVector)]) -> String {
    let mut h = Sha256::new();
    for (id, vector) in observed {
        h.update((id.len() as u64).to_le_bytes());
        h.update(id.as_bytes());
        for value in vector.to_array() {
            h.update(value.to_le_bytes());
        }
    }
    h.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Run the synthesizer, derive thresholds and benchmark both populations.
///
/// `observed` must already exclude the `ALL` partition. An empty slice yields
/// the fallback thresholds and zero sample counts.
pub fn calibrate(observed: &[(String, FeatureVector)], config: &CalibrationConfig) -> CalibrationRecord {
    let vectors: Vec<FeatureVector> = observed.iter().map(|(_, v)| *v).collect();
    let model = synthesize(&vectors, config);
    let thresholds = derive_thresholds(&model.realistic, config);

    let benchmark = Benchmark {
        realistic: benchmark_population(&model.realistic, &thresholds),
        synthetic: benchmark_population(&model.artifacted, &thresholds),
    };

    log::info!(
        "calibration: {} observed, {} realistic, {} synthetic samples",
        observed.len(),
        model.realistic.len(),
        model.artifacted.len()
    );
    log::debug!(
        "benchmark mean family fails: realistic {:.3}, synthetic {:.3}",
        benchmark.realistic.family_fail_count.mean,
        benchmark.synthetic.family_fail_count.mean
    );

    CalibrationRecord {
        method: METHOD.to_string(),
        seed: config.seed,
        observed_samples: observed.len(),
        realistic_samples: model.realistic.len(),
        synthetic_samples: model.artifacted.len(),
        noise_scale: config.noise_scale,
        hi_quantile: config.hi_quantile,
        lo_quantile: config.lo_quantile,
        observed_partitions: observed.iter().map(|(id, _)| id.clone()).collect(),
        observed_digest: observed_digest(observed),
        fallback: model.is_empty(),
        thresholds,
        benchmark,
    }
}

/// Load a previously written calibration document.
pub fn load_calibration_from_path(path: &Path) -> Result<CalibrationRecord> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let record: CalibrationRecord = serde_json::from_str(&raw).map_err(|e| Error::parse(path, e))?;
    if record.method != METHOD {
        log::warn!(
            "{} was written by method {:?}; reusing its thresholds anyway",
            path.display(),
            record.method
        );
    }
    Ok(record)
}
