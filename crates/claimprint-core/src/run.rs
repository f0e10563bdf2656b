//! End-to-end scoring run: input document → calibration → per-partition scores.
//!
//! Scores are collected in a [`ScoreBook`] that is threaded through the
//! partitions by value and turned into documents once, fully populated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::calibration::{CalibrationRecord, calibrate};
use crate::config::{CalibrationConfig, OutputPaths};
use crate::error::{Error, Result};
use crate::features::{FeatureVector, extract};
use crate::report::{ALL_PARTITION, InputDocument, PartitionReport, ReportBundle};
use crate::thresholds::ThresholdSet;
use crate::verdict::{ScoreResult, score};

/// Where a run's thresholds come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdSource {
    /// Synthesize a null model from the bundle's observed partitions.
    Calibrate(CalibrationConfig),
    /// Reuse a previously written calibration document.
    Reuse(CalibrationRecord),
}

/// The all-partitions score document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllPartitionsDocument {
    pub default_state: String,
    pub available_states: Vec<String>,
    pub scores: BTreeMap<String, ScoreResult>,
    /// File name of the calibration document these scores were derived from.
    pub calibration_ref: String,
    pub calibration_method: String,
}

/// Everything one run publishes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Absent in degraded single-report mode.
    pub calibration: Option<CalibrationRecord>,
    /// Score for the `ALL` partition (or the lone report).
    pub score: ScoreResult,
    pub by_state: Option<AllPartitionsDocument>,
}

/// Accumulator of per-partition scores under one threshold set.
#[derive(Debug, Clone)]
pub struct ScoreBook {
    thresholds: ThresholdSet,
    scores: BTreeMap<String, ScoreResult>,
}

impl ScoreBook {
    pub fn new(thresholds: ThresholdSet) -> Self {
        Self {
            thresholds,
            scores: BTreeMap::new(),
        }
    }

    /// Score `report` under `id`, returning the grown book.
    pub fn with(mut self, id: &str, report: &PartitionReport) -> Self {
        let result = score(&extract(report), &self.thresholds);
        log::debug!("{id}: {} ({} families failed)", result.verdict, result.fail_count);
        self.scores.insert(id.to_string(), result);
        self
    }

    pub fn into_scores(self) -> BTreeMap<String, ScoreResult> {
        self.scores
    }
}

/// Feature vectors of every partition except `ALL`, keyed by id.
pub fn observed_vectors(bundle: &ReportBundle) -> Vec<(String, FeatureVector)> {
    bundle
        .observed_reports()
        .map(|(id, report)| (id.to_string(), extract(report).vector))
        .collect()
}

/// Score every partition of a bundle.
///
/// Only partitions with a report are scored, plus `ALL`, which is scored from
/// an empty report when the bundle lacks one. `available_states` orders the
/// display and never adds a score of its own.
pub fn run_bundle(
    bundle: &ReportBundle,
    source: ThresholdSource,
    paths: &OutputPaths,
) -> Result<RunOutput> {
    if bundle.reports.is_empty() {
        return Err(Error::InvalidInput(
            "bundle contains no partition reports".to_string(),
        ));
    }
    log::info!("loaded {} partition reports", bundle.reports.len());

    let calibration = match source {
        ThresholdSource::Calibrate(config) => calibrate(&observed_vectors(bundle), &config),
        ThresholdSource::Reuse(record) => {
            log::info!(
                "reusing thresholds from calibration seed {} ({} observed)",
                record.seed,
                record.observed_samples
            );
            record
        }
    };

    let available_states = bundle.ordered_partitions();
    if !bundle.reports.contains_key(ALL_PARTITION) {
        log::warn!("bundle has no {ALL_PARTITION} report; scoring it from defaults");
    }

    for id in available_states
        .iter()
        .filter(|id| id.as_str() != ALL_PARTITION && !bundle.reports.contains_key(id.as_str()))
    {
        log::warn!("{id} is listed in available_states but has no report; not scored");
    }

    let book = bundle
        .reports
        .iter()
        .fold(ScoreBook::new(calibration.thresholds), |book, (id, report)| {
            book.with(id, report)
        });
    let book = if bundle.reports.contains_key(ALL_PARTITION) {
        book
    } else {
        book.with(ALL_PARTITION, &PartitionReport::default())
    };

    let scores = book.into_scores();
    let all_score = scores
        .get(ALL_PARTITION)
        .cloned()
        .ok_or_else(|| Error::InvalidInput(format!("no {ALL_PARTITION} score produced")))?;
    log::info!("{ALL_PARTITION}: {}", all_score.verdict);

    let by_state = AllPartitionsDocument {
        default_state: bundle.default_partition(),
        available_states,
        scores,
        calibration_ref: paths.calibration_file.clone(),
        calibration_method: calibration.method.clone(),
    };

    Ok(RunOutput {
        calibration: Some(calibration),
        score: all_score,
        by_state: Some(by_state),
    })
}

/// Degraded mode: one report, fixed fallback thresholds, no calibration.
pub fn run_single(report: &PartitionReport) -> RunOutput {
    log::warn!("single partition report; skipping calibration and using fallback thresholds");
    let result = score(&extract(report), &ThresholdSet::fallback());
    log::info!("single report: {}", result.verdict);
    RunOutput {
        calibration: None,
        score: result,
        by_state: None,
    }
}

/// Dispatch on the input shape.
pub fn run(input: &InputDocument, source: ThresholdSource, paths: &OutputPaths) -> Result<RunOutput> {
    match input {
        InputDocument::Bundle(bundle) => run_bundle(bundle, source, paths),
        InputDocument::Single(report) => {
            if let ThresholdSource::Reuse(_) = source {
                log::warn!("calibration document ignored for a single report");
            }
            Ok(run_single(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CvSummary, Metadata, NoiseFeatures, Temporal, UnitPrice};
    use crate::verdict::Verdict;

    fn report(state: &str, median_cv: f64, acf1: f64) -> PartitionReport {
        PartitionReport {
            metadata: Metadata {
                state: Some(state.to_string()),
            },
            unit_price: UnitPrice {
                top_volume_cv_summary: Some(CvSummary {
                    median_cv: Some(median_cv),
                    p90_cv: Some(median_cv * 2.0),
                }),
            },
            temporal: Temporal {
                noise_features: Some(NoiseFeatures {
                    acf1_total_paid: Some(acf1),
                    smooth_ratio: Some(0.08),
                }),
                ..Temporal::default()
            },
            ..PartitionReport::default()
        }
    }

    fn bundle(ids: &[&str]) -> ReportBundle {
        let reports = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), report(id, 1.2 + 0.1 * i as f64, 0.8)))
            .collect();
        ReportBundle {
            default_state: None,
            available_states: None,
            reports,
        }
    }

    fn calibrate_source() -> ThresholdSource {
        ThresholdSource::Calibrate(CalibrationConfig {
            min_realistic_samples: 500,
            ..CalibrationConfig::default()
        })
    }

    #[test]
    fn bundle_scores_every_partition() {
        let out = run_bundle(
            &bundle(&["ALL", "CA", "NY", "UNK"]),
            calibrate_source(),
            &OutputPaths::default(),
        )
        .unwrap();
        let doc = out.by_state.unwrap();
        assert_eq!(doc.default_state, "ALL");
        assert_eq!(doc.available_states, ["ALL", "CA", "NY", "UNK"]);
        assert_eq!(doc.scores.len(), 4);
        assert_eq!(doc.calibration_ref, "signal_null_model.json");
        assert_eq!(doc.scores["ALL"], out.score);

        let cal = out.calibration.unwrap();
        assert_eq!(cal.observed_partitions, ["CA", "NY", "UNK"]);
        assert_eq!(cal.realistic_samples, 500);
    }

    #[test]
    fn missing_all_is_scored_from_defaults() {
        let out = run_bundle(&bundle(&["CA", "TX"]), calibrate_source(), &OutputPaths::default())
            .unwrap();
        let doc = out.by_state.unwrap();
        assert!(doc.scores.contains_key(ALL_PARTITION));
        assert_eq!(doc.available_states[0], ALL_PARTITION);
        let expected = score(&extract(&PartitionReport::default()), &out.calibration.unwrap().thresholds);
        assert_eq!(out.score, expected);
    }

    #[test]
    fn listed_partition_without_report_is_not_scored() {
        let mut b = bundle(&["ALL", "CA"]);
        b.available_states = Some(vec!["ALL".into(), "CA".into(), "XX".into()]);
        let out = run_bundle(&b, calibrate_source(), &OutputPaths::default()).unwrap();
        let doc = out.by_state.unwrap();
        assert_eq!(doc.available_states, ["ALL", "CA", "XX"]);
        assert_eq!(doc.scores.keys().collect::<Vec<_>>(), ["ALL", "CA"]);
    }

    #[test]
    fn empty_bundle_is_rejected() {
        let err = run_bundle(&bundle(&[]), calibrate_source(), &OutputPaths::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn only_all_partition_falls_back() {
        let out = run_bundle(&bundle(&["ALL"]), calibrate_source(), &OutputPaths::default())
            .unwrap();
        let cal = out.calibration.unwrap();
        assert!(cal.fallback);
        assert_eq!(cal.thresholds, ThresholdSet::fallback());
    }

    #[test]
    fn reused_thresholds_are_applied() {
        let mut record = calibrate(&[], &CalibrationConfig::default());
        record.thresholds.ratio_median_cv_hi = 0.5;
        record.thresholds.ratio_p90_cv_hi = 0.5;
        let out = run_bundle(
            &bundle(&["ALL", "CA"]),
            ThresholdSource::Reuse(record.clone()),
            &OutputPaths::default(),
        )
        .unwrap();
        assert_eq!(out.calibration, Some(record));
        assert!(out.score.family_failures.reimbursement_ratio_clustering);
    }

    #[test]
    fn single_report_uses_fallback() {
        let mut r = report("ALL", 4.0, 0.99);
        r.temporal.noise_features = Some(NoiseFeatures {
            acf1_total_paid: Some(0.99),
            smooth_ratio: Some(0.01),
        });
        let out = run(
            &InputDocument::Single(r),
            calibrate_source(),
            &OutputPaths::default(),
        )
        .unwrap();
        assert!(out.calibration.is_none());
        assert!(out.by_state.is_none());
        assert!(out.score.family_failures.reimbursement_ratio_clustering);
        assert!(out.score.family_failures.temporal_noise);
        // Zeroed correlations breach every "lo" cutoff.
        assert!(out.score.family_failures.correlation_structure);
        assert_eq!(out.score.verdict, Verdict::LikelySyntheticOrAltered);
    }
}
