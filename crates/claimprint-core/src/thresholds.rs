//! Threshold Deriver.
//!
//! One cutoff per feature. "hi" cutoffs take the upper quantile of the
//! realistic population (large values indicate tampering), "lo" cutoffs the
//! lower quantile. An empty population yields [`ThresholdSet::fallback`].

use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::features::{FEATURE_COUNT, Feature, FeatureVector};

/// Which tail of the null distribution a cutoff guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Hi,
    Lo,
}

/// Declarative row: the feature a threshold applies to, its tail, and the
/// fixed value used when no null population exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSpec {
    pub name: &'static str,
    pub feature: Feature,
    pub side: Side,
    pub fallback: f64,
}

/// In [`Feature::ALL`] order.
pub const THRESHOLD_SPECS: [ThresholdSpec; FEATURE_COUNT] = [
    ThresholdSpec {
        name: "ratio_median_cv_hi",
        feature: Feature::RatioMedianCv,
        side: Side::Hi,
        fallback: 3.0,
    },
    ThresholdSpec {
        name: "ratio_p90_cv_hi",
        feature: Feature::RatioP90Cv,
        side: Side::Hi,
        fallback: 8.0,
    },
    ThresholdSpec {
        name: "digit_max_dev_hi",
        feature: Feature::DigitMaxDev,
        side: Side::Hi,
        fallback: 0.05,
    },
    ThresholdSpec {
        name: "digit_chi_hi",
        feature: Feature::DigitChi,
        side: Side::Hi,
        fallback: 0.25,
    },
    ThresholdSpec {
        name: "corr_ben_claims_lo",
        feature: Feature::CorrBenClaims,
        side: Side::Lo,
        fallback: 0.4,
    },
    ThresholdSpec {
        name: "corr_ben_paid_lo",
        feature: Feature::CorrBenPaid,
        side: Side::Lo,
        fallback: 0.2,
    },
    ThresholdSpec {
        name: "corr_claims_paid_lo",
        feature: Feature::CorrClaimsPaid,
        side: Side::Lo,
        fallback: 0.6,
    },
    ThresholdSpec {
        name: "temporal_acf1_hi",
        feature: Feature::TemporalAcf1,
        side: Side::Hi,
        fallback: 0.97,
    },
    ThresholdSpec {
        name: "temporal_smooth_ratio_lo",
        feature: Feature::TemporalSmoothRatio,
        side: Side::Lo,
        fallback: 0.03,
    },
    ThresholdSpec {
        name: "entropy_lo",
        feature: Feature::Entropy,
        side: Side::Lo,
        fallback: 0.92,
    },
    ThresholdSpec {
        name: "heaping_share_5c_hi",
        feature: Feature::HeapingShare5c,
        side: Side::Hi,
        fallback: 0.35,
    },
    ThresholdSpec {
        name: "heaping_share_25c_hi",
        feature: Feature::HeapingShare25c,
        side: Side::Hi,
        fallback: 0.35,
    },
    ThresholdSpec {
        name: "heaping_max_bucket_hi",
        feature: Feature::HeapingMaxBucket,
        side: Side::Hi,
        fallback: 0.35,
    },
];

pub fn spec_for(feature: Feature) -> &'static ThresholdSpec {
    &THRESHOLD_SPECS[feature.index()]
}

/// Cutoffs shared read-only by every evaluation in a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub ratio_median_cv_hi: f64,
    pub ratio_p90_cv_hi: f64,
    pub digit_max_dev_hi: f64,
    pub digit_chi_hi: f64,
    pub corr_ben_claims_lo: f64,
    pub corr_ben_paid_lo: f64,
    pub corr_claims_paid_lo: f64,
    pub temporal_acf1_hi: f64,
    pub temporal_smooth_ratio_lo: f64,
    pub entropy_lo: f64,
    pub heaping_share_5c_hi: f64,
    pub heaping_share_25c_hi: f64,
    pub heaping_max_bucket_hi: f64,
}

impl ThresholdSet {
    /// Historical fixed cutoffs, used when calibration has nothing to sample.
    pub fn fallback() -> Self {
        Self::from_fn(|spec| spec.fallback)
    }

    fn from_fn(mut f: impl FnMut(&ThresholdSpec) -> f64) -> Self {
        let v: [f64; FEATURE_COUNT] = std::array::from_fn(|i| f(&THRESHOLD_SPECS[i]));
        Self {
            ratio_median_cv_hi: v[0],
            ratio_p90_cv_hi: v[1],
            digit_max_dev_hi: v[2],
            digit_chi_hi: v[3],
            corr_ben_claims_lo: v[4],
            corr_ben_paid_lo: v[5],
            corr_claims_paid_lo: v[6],
            temporal_acf1_hi: v[7],
            temporal_smooth_ratio_lo: v[8],
            entropy_lo: v[9],
            heaping_share_5c_hi: v[10],
            heaping_share_25c_hi: v[11],
            heaping_max_bucket_hi: v[12],
        }
    }

    /// Cutoff applied to `feature`.
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::RatioMedianCv => self.ratio_median_cv_hi,
            Feature::RatioP90Cv => self.ratio_p90_cv_hi,
            Feature::DigitMaxDev => self.digit_max_dev_hi,
            Feature::DigitChi => self.digit_chi_hi,
            Feature::CorrBenClaims => self.corr_ben_claims_lo,
            Feature::CorrBenPaid => self.corr_ben_paid_lo,
            Feature::CorrClaimsPaid => self.corr_claims_paid_lo,
            Feature::TemporalAcf1 => self.temporal_acf1_hi,
            Feature::TemporalSmoothRatio => self.temporal_smooth_ratio_lo,
            Feature::Entropy => self.entropy_lo,
            Feature::HeapingShare5c => self.heaping_share_5c_hi,
            Feature::HeapingShare25c => self.heaping_share_25c_hi,
            Feature::HeapingMaxBucket => self.heaping_max_bucket_hi,
        }
    }

    /// Whether `value` is beyond the cutoff for `feature` (strict comparison).
    pub fn breaches(&self, feature: Feature, value: f64) -> bool {
        let cutoff = self.get(feature);
        match spec_for(feature).side {
            Side::Hi => value > cutoff,
            Side::Lo => value < cutoff,
        }
    }
}

/// Derive thresholds from the realistic population's empirical quantiles.
pub fn derive_thresholds(realistic: &[FeatureVector], config: &CalibrationConfig) -> ThresholdSet {
    if realistic.is_empty() {
        log::warn!("empty null population; using fallback thresholds");
        return ThresholdSet::fallback();
    }
    ThresholdSet::from_fn(|spec| {
        let column: Vec<f64> = realistic.iter().map(|v| v.get(spec.feature)).collect();
        let q = match spec.side {
            Side::Hi => config.hi_quantile,
            Side::Lo => config.lo_quantile,
        };
        claimprint_stats::quantile(&column, q)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specs_follow_feature_order() {
        for (spec, feature) in THRESHOLD_SPECS.iter().zip(Feature::ALL) {
            assert_eq!(spec.feature, feature);
            assert!(spec.name.starts_with(feature.name()));
            let suffix = match spec.side {
                Side::Hi => "_hi",
                Side::Lo => "_lo",
            };
            assert!(spec.name.ends_with(suffix));
        }
    }

    #[test]
    fn fallback_values() {
        let t = ThresholdSet::fallback();
        assert_eq!(t.ratio_median_cv_hi, 3.0);
        assert_eq!(t.ratio_p90_cv_hi, 8.0);
        assert_eq!(t.digit_max_dev_hi, 0.05);
        assert_eq!(t.digit_chi_hi, 0.25);
        assert_eq!(t.corr_claims_paid_lo, 0.6);
        assert_eq!(t.corr_ben_claims_lo, 0.4);
        assert_eq!(t.corr_ben_paid_lo, 0.2);
        assert_eq!(t.temporal_acf1_hi, 0.97);
        assert_eq!(t.temporal_smooth_ratio_lo, 0.03);
        assert_eq!(t.entropy_lo, 0.92);
        assert_eq!(t.heaping_share_5c_hi, 0.35);
        assert_eq!(t.heaping_share_25c_hi, 0.35);
        assert_eq!(t.heaping_max_bucket_hi, 0.35);
    }

    #[test]
    fn get_matches_field_names() {
        let t = ThresholdSet::fallback();
        let json = serde_json::to_value(t).unwrap();
        for spec in THRESHOLD_SPECS {
            assert_eq!(json[spec.name].as_f64(), Some(t.get(spec.feature)));
        }
    }

    #[test]
    fn empty_population_falls_back() {
        let t = derive_thresholds(&[], &CalibrationConfig::default());
        assert_eq!(t, ThresholdSet::fallback());
    }

    #[test]
    fn quantiles_per_side() {
        // entropy = 0.00, 0.01, ..., 1.00 ; digit_chi likewise
        let pop: Vec<FeatureVector> = (0..=100)
            .map(|i| {
                let x = i as f64 / 100.0;
                FeatureVector {
                    digit_chi: x,
                    entropy: x,
                    ..FeatureVector::default()
                }
            })
            .collect();
        let t = derive_thresholds(&pop, &CalibrationConfig::default());
        assert!((t.digit_chi_hi - 0.975).abs() < 1e-12);
        assert!((t.entropy_lo - 0.025).abs() < 1e-12);
        assert_eq!(t.ratio_median_cv_hi, 0.0);
    }

    #[test]
    fn breaches_are_strict() {
        let t = ThresholdSet::fallback();
        assert!(!t.breaches(Feature::DigitChi, 0.25));
        assert!(t.breaches(Feature::DigitChi, 0.2500001));
        assert!(!t.breaches(Feature::Entropy, 0.92));
        assert!(t.breaches(Feature::Entropy, 0.91));
    }
}
