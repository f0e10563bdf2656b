//! Verdict Engine: family-failure count → published Score Result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::features::{Extraction, Feature};
use crate::signals::{FAMILY_COUNT, FamilyFailures, Signal, evaluate};
use crate::thresholds::{Side, ThresholdSet, spec_for};

/// Families that must fail together before a partition is flagged.
pub const FAMILY_FAIL_RULE: usize = 3;

pub const RULE: &str =
    "If 3+ independent signal families fail -> dataset likely synthetic or altered";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "LIKELY_SYNTHETIC_OR_ALTERED")]
    LikelySyntheticOrAltered,
    #[serde(rename = "NOT_FLAGGED_BY_3PLUS_RULE")]
    NotFlagged,
}

impl Verdict {
    pub fn from_fail_count(family_fail_count: usize) -> Self {
        if family_fail_count >= FAMILY_FAIL_RULE {
            Self::LikelySyntheticOrAltered
        } else {
            Self::NotFlagged
        }
    }

    pub fn is_flagged(self) -> bool {
        matches!(self, Self::LikelySyntheticOrAltered)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LikelySyntheticOrAltered => "LIKELY_SYNTHETIC_OR_ALTERED",
            Self::NotFlagged => "NOT_FLAGGED_BY_3PLUS_RULE",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Signal payloads
// ---------------------------------------------------------------------------

/// A metric in a signal payload: a measured value, a cutoff, or a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// One raw signal's outcome and the numbers that decided it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub name: String,
    pub failed: bool,
    pub metrics: BTreeMap<String, MetricValue>,
}

/// Name the upstream report uses for a feature's value.
pub fn metric_name(feature: Feature) -> &'static str {
    match feature {
        Feature::RatioMedianCv => "median_cv",
        Feature::RatioP90Cv => "p90_cv",
        Feature::DigitMaxDev => "max_abs_dev",
        Feature::DigitChi => "chi_like",
        Feature::CorrBenClaims => "ben_claims",
        Feature::CorrBenPaid => "ben_paid",
        Feature::CorrClaimsPaid => "claims_paid",
        Feature::TemporalAcf1 => "acf1_total_paid",
        Feature::TemporalSmoothRatio => "smooth_ratio",
        Feature::Entropy => "normalized_entropy_last2",
        Feature::HeapingShare5c => "share_on_5c_grid",
        Feature::HeapingShare25c => "share_on_25c_grid",
        Feature::HeapingMaxBucket => "max_cent_bucket_share",
    }
}

/// `threshold_<metric>_{hi,lo}`. Temporal cutoffs drop the series suffix.
pub fn threshold_key(feature: Feature) -> String {
    let metric = match feature {
        Feature::TemporalAcf1 => "acf1",
        other => metric_name(other),
    };
    let side = match spec_for(feature).side {
        Side::Hi => "hi",
        Side::Lo => "lo",
    };
    format!("threshold_{metric}_{side}")
}

/// Label describing which data a signal was computed over, if it has one.
fn basis(signal: Signal, extraction: &Extraction) -> Option<(&'static str, &'static str)> {
    match signal {
        Signal::RatioClustering => Some(("basis", "top_volume_hcpcs")),
        Signal::LastDigit | Signal::Entropy => Some(("basis", "unit_paid")),
        Signal::Correlation => Some(("scope", extraction.correlation_scope())),
        Signal::Temporal => None,
        Signal::Heaping => Some(("basis", "unit_paid_cents_last2")),
    }
}

pub fn signal_report(
    signal: Signal,
    extraction: &Extraction,
    thresholds: &ThresholdSet,
    failed: bool,
) -> SignalReport {
    let mut metrics = BTreeMap::new();
    if let Some((key, label)) = basis(signal, extraction) {
        metrics.insert(key.to_string(), MetricValue::from(label));
    }
    for &feature in signal.features() {
        metrics.insert(
            metric_name(feature).to_string(),
            extraction.vector.get(feature).into(),
        );
        metrics.insert(threshold_key(feature), thresholds.get(feature).into());
    }
    SignalReport {
        name: signal.display_name().to_string(),
        failed,
        metrics,
    }
}

// ---------------------------------------------------------------------------
// Score Result
// ---------------------------------------------------------------------------

/// Published outcome for one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub rule: String,
    pub fail_count: usize,
    pub family_total: usize,
    pub raw_fail_count: usize,
    pub family_failures: FamilyFailures,
    pub signals: Vec<SignalReport>,
    pub verdict: Verdict,
}

impl ScoreResult {
    pub fn is_flagged(&self) -> bool {
        self.verdict.is_flagged()
    }
}

/// Evaluate an extracted report and package the result.
pub fn score(extraction: &Extraction, thresholds: &ThresholdSet) -> ScoreResult {
    let evaluation = evaluate(&extraction.vector, thresholds);
    let fail_count = evaluation.family_fail_count();
    let signals = Signal::ALL
        .iter()
        .map(|&s| signal_report(s, extraction, thresholds, evaluation.signals.get(s)))
        .collect();
    ScoreResult {
        rule: RULE.to_string(),
        fail_count,
        family_total: FAMILY_COUNT,
        raw_fail_count: evaluation.raw_fail_count(),
        family_failures: evaluation.families,
        signals,
        verdict: Verdict::from_fail_count(fail_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FEATURE_COUNT, FeatureVector};

    fn extraction(vector: FeatureVector) -> Extraction {
        Extraction {
            vector,
            resolved_from: [None; FEATURE_COUNT],
        }
    }

    fn clean() -> FeatureVector {
        FeatureVector {
            ratio_median_cv: 2.0,
            ratio_p90_cv: 5.0,
            digit_max_dev: 0.01,
            digit_chi: 0.02,
            corr_ben_claims: 0.8,
            corr_ben_paid: 0.6,
            corr_claims_paid: 0.75,
            temporal_acf1: 0.9,
            temporal_smooth_ratio: 0.07,
            entropy: 0.98,
            heaping_share_5c: 0.21,
            heaping_share_25c: 0.05,
            heaping_max_bucket: 0.02,
        }
    }

    #[test]
    fn verdict_rule_boundary() {
        assert_eq!(Verdict::from_fail_count(2), Verdict::NotFlagged);
        assert_eq!(Verdict::from_fail_count(3), Verdict::LikelySyntheticOrAltered);
        assert_eq!(Verdict::from_fail_count(5), Verdict::LikelySyntheticOrAltered);
    }

    #[test]
    fn three_families_flag() {
        let mut v = clean();
        v.ratio_median_cv = 4.0;
        v.corr_claims_paid = 0.1;
        v.heaping_share_5c = 0.5;
        let s = score(&extraction(v), &ThresholdSet::fallback());
        assert_eq!(s.fail_count, 3);
        assert_eq!(s.verdict, Verdict::LikelySyntheticOrAltered);
    }

    #[test]
    fn two_families_do_not_flag() {
        // digit + entropy + ratio: three raw signals, two families.
        let mut v = clean();
        v.ratio_p90_cv = 12.0;
        v.digit_max_dev = 0.2;
        v.entropy = 0.5;
        let s = score(&extraction(v), &ThresholdSet::fallback());
        assert_eq!(s.raw_fail_count, 3);
        assert_eq!(s.fail_count, 2);
        assert_eq!(s.verdict, Verdict::NotFlagged);
        assert_eq!(s.family_total, 5);
    }

    #[test]
    fn payloads_in_fixed_order_with_threshold_keys() {
        let s = score(&extraction(clean()), &ThresholdSet::fallback());
        let names: Vec<&str> = s.signals.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Reimbursement ratio clustering",
                "Last digit analysis",
                "Correlation structure",
                "Temporal noise",
                "Entropy",
                "Heaping detection (grid spacing)",
            ]
        );

        let temporal = &s.signals[3].metrics;
        assert_eq!(temporal["acf1_total_paid"], MetricValue::Number(0.9));
        assert_eq!(temporal["threshold_acf1_hi"], MetricValue::Number(0.97));
        assert_eq!(temporal["threshold_smooth_ratio_lo"], MetricValue::Number(0.03));

        let corr = &s.signals[2].metrics;
        assert_eq!(corr["scope"], MetricValue::from("global"));
        assert!(corr.contains_key("threshold_ben_paid_lo"));

        let heaping = &s.signals[5].metrics;
        assert!(heaping.contains_key("threshold_max_cent_bucket_share_hi"));
        assert_eq!(heaping["basis"], MetricValue::from("unit_paid_cents_last2"));
    }

    #[test]
    fn verdict_serializes_as_published_string() {
        let json = serde_json::to_string(&Verdict::NotFlagged).unwrap();
        assert_eq!(json, "\"NOT_FLAGGED_BY_3PLUS_RULE\"");
        assert_eq!(Verdict::LikelySyntheticOrAltered.to_string(), "LIKELY_SYNTHETIC_OR_ALTERED");
    }

    #[test]
    fn score_result_roundtrip_preserves_metrics() {
        let mut v = clean();
        v.digit_chi = 0.1 + 0.2;
        v.entropy = 1.0 / 3.0;
        v.corr_ben_paid = -0.123_456_789_012_345_67;
        let s = score(&extraction(v), &ThresholdSet::fallback());
        let json = serde_json::to_string(&s).unwrap();
        let back: ScoreResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.signals[1].metrics["chi_like"], MetricValue::Number(0.1 + 0.2));
    }
}
