//! Null-Model Synthesizer.
//!
//! Builds two synthetic populations from the observed regional feature vectors:
//!
//! - **realistic**: bootstrap resampling of observed vectors plus independent
//!   Gaussian jitter per field, sized by a robust (MAD-based) spread estimate
//!   across the observed partitions;
//! - **artifacted**: one counterpart per realistic sample with bounded,
//!   directional tamper signatures applied per [`FIELD_RULES`].
//!
//! Both stages draw from one ChaCha stream seeded from the config, so the same
//! observed vectors and seed always give bit-identical populations.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;

use crate::config::CalibrationConfig;
use crate::features::{FEATURE_COUNT, Feature, FeatureVector};

/// Relative spread assumed when a field has no usable cross-partition spread.
const SINGLE_VALUE_REL_SCALE: f64 = 0.05;
/// Absolute floor on any field's spread estimate.
const MIN_SCALE: f64 = 1e-4;

// ---------------------------------------------------------------------------
// Tamper signatures
// ---------------------------------------------------------------------------

/// Directional perturbation applied to one field of an artifacted sample.
/// Every draw is uniform over `[lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tamper {
    /// Multiply the value by the draw.
    Scale { lo: f64, hi: f64 },
    /// Add the draw (negative ranges push the value down).
    Shift { lo: f64, hi: f64 },
    /// Replace the value with the draw.
    Pin { lo: f64, hi: f64 },
}

impl Tamper {
    fn range(self) -> (f64, f64) {
        match self {
            Self::Scale { lo, hi } | Self::Shift { lo, hi } | Self::Pin { lo, hi } => (lo, hi),
        }
    }

    fn apply(self, value: f64, draw: f64) -> f64 {
        match self {
            Self::Scale { .. } => value * draw,
            Self::Shift { .. } => value + draw,
            Self::Pin { .. } => draw,
        }
    }
}

/// Tamper rule for one feature; the value is clamped to the feature's domain afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub feature: Feature,
    pub tamper: Tamper,
}

/// Tamper signature per feature, in [`Feature::ALL`] order.
pub const FIELD_RULES: [FieldRule; FEATURE_COUNT] = [
    FieldRule {
        feature: Feature::RatioMedianCv,
        tamper: Tamper::Scale { lo: 1.8, hi: 3.5 },
    },
    FieldRule {
        feature: Feature::RatioP90Cv,
        tamper: Tamper::Scale { lo: 1.8, hi: 3.5 },
    },
    FieldRule {
        feature: Feature::DigitMaxDev,
        tamper: Tamper::Shift { lo: 0.04, hi: 0.12 },
    },
    FieldRule {
        feature: Feature::DigitChi,
        tamper: Tamper::Shift { lo: 0.15, hi: 0.60 },
    },
    FieldRule {
        feature: Feature::CorrBenClaims,
        tamper: Tamper::Shift { lo: -0.55, hi: -0.25 },
    },
    FieldRule {
        feature: Feature::CorrBenPaid,
        tamper: Tamper::Shift { lo: -0.55, hi: -0.25 },
    },
    FieldRule {
        feature: Feature::CorrClaimsPaid,
        tamper: Tamper::Shift { lo: -0.55, hi: -0.25 },
    },
    FieldRule {
        feature: Feature::TemporalAcf1,
        tamper: Tamper::Pin { lo: 0.975, hi: 0.995 },
    },
    FieldRule {
        feature: Feature::TemporalSmoothRatio,
        tamper: Tamper::Scale { lo: 0.05, hi: 0.35 },
    },
    FieldRule {
        feature: Feature::Entropy,
        tamper: Tamper::Shift { lo: -0.20, hi: -0.06 },
    },
    FieldRule {
        feature: Feature::HeapingShare5c,
        tamper: Tamper::Shift { lo: 0.10, hi: 0.30 },
    },
    FieldRule {
        feature: Feature::HeapingShare25c,
        tamper: Tamper::Shift { lo: 0.08, hi: 0.25 },
    },
    FieldRule {
        feature: Feature::HeapingMaxBucket,
        tamper: Tamper::Shift { lo: 0.05, hi: 0.20 },
    },
];

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

fn sample_standard_normal(rng: &mut impl Rng) -> f64 {
    let u1 = rng.random::<f64>().clamp(f64::MIN_POSITIVE, 1.0);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn fallback_scale(center: f64) -> f64 {
    (SINGLE_VALUE_REL_SCALE * center.abs()).max(MIN_SCALE)
}

/// Robust spread of every field across the observed partitions.
///
/// `1.4826 × MAD` when at least two partitions exist and the spread is
/// non-zero; otherwise 5% of the (median) value's magnitude, floored at 1e-4.
pub fn field_dispersion(observed: &[FeatureVector]) -> [f64; FEATURE_COUNT] {
    Feature::ALL.map(|feature| {
        let column: Vec<f64> = observed.iter().map(|v| v.get(feature)).collect();
        match claimprint_stats::robust_scale(&column) {
            Some(scale) if scale > 0.0 => scale,
            _ => fallback_scale(claimprint_stats::median(&column)),
        }
    })
}

/// The two synthetic populations used for calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct NullModel {
    pub realistic: Vec<FeatureVector>,
    pub artifacted: Vec<FeatureVector>,
    /// Per-field jitter standard deviation used for the realistic population.
    pub jitter: [f64; FEATURE_COUNT],
}

impl NullModel {
    pub fn empty() -> Self {
        Self {
            realistic: Vec::new(),
            artifacted: Vec::new(),
            jitter: [0.0; FEATURE_COUNT],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.realistic.is_empty()
    }
}

fn jitter_sample(
    rng: &mut impl Rng,
    base: &FeatureVector,
    jitter: &[f64; FEATURE_COUNT],
) -> FeatureVector {
    let mut out = *base;
    for feature in Feature::ALL {
        let sd = jitter[feature.index()];
        let value = base.get(feature) + sd * sample_standard_normal(rng);
        out.set(feature, feature.domain().clamp(value));
    }
    out
}

/// Apply every tamper rule to one realistic sample.
pub fn artifact_sample(rng: &mut impl Rng, realistic: &FeatureVector) -> FeatureVector {
    let mut out = *realistic;
    for rule in FIELD_RULES {
        let (lo, hi) = rule.tamper.range();
        let draw = rng.random_range(lo..hi);
        let value = rule.tamper.apply(out.get(rule.feature), draw);
        out.set(rule.feature, rule.feature.domain().clamp(value));
    }
    out
}

/// Generate the realistic and artifacted populations.
///
/// An empty observed population yields an empty model; callers fall back to
/// fixed thresholds in that case.
pub fn synthesize(observed: &[FeatureVector], config: &CalibrationConfig) -> NullModel {
    let n = config.realistic_sample_count(observed.len());
    if n == 0 {
        return NullModel::empty();
    }

    let dispersion = field_dispersion(observed);
    let jitter = dispersion.map(|d| d * config.noise_scale);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let realistic: Vec<FeatureVector> = (0..n)
        .map(|_| {
            let base = &observed[rng.random_range(0..observed.len())];
            jitter_sample(&mut rng, base, &jitter)
        })
        .collect();

    let artifacted: Vec<FeatureVector> = realistic
        .iter()
        .map(|sample| artifact_sample(&mut rng, sample))
        .collect();

    log::debug!(
        "null model: {} observed -> {} realistic, {} artifacted (seed {})",
        observed.len(),
        realistic.len(),
        artifacted.len(),
        config.seed
    );

    NullModel {
        realistic,
        artifacted,
        jitter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Domain;
    use statrs::statistics::Statistics;

    fn observed(n: usize) -> Vec<FeatureVector> {
        (0..n)
            .map(|i| {
                let t = i as f64 / n.max(1) as f64;
                FeatureVector {
                    ratio_median_cv: 1.2 + 0.8 * t,
                    ratio_p90_cv: 3.0 + 2.0 * t,
                    digit_max_dev: 0.01 + 0.02 * t,
                    digit_chi: 0.02 + 0.05 * t,
                    corr_ben_claims: 0.80 + 0.1 * t,
                    corr_ben_paid: 0.60 + 0.1 * t,
                    corr_claims_paid: 0.70 + 0.1 * t,
                    temporal_acf1: 0.80 + 0.1 * t,
                    temporal_smooth_ratio: 0.06 + 0.04 * t,
                    entropy: 0.95 + 0.04 * t,
                    heaping_share_5c: 0.20 + 0.05 * t,
                    heaping_share_25c: 0.04 + 0.02 * t,
                    heaping_max_bucket: 0.02 + 0.02 * t,
                }
            })
            .collect()
    }

    #[test]
    fn rules_cover_every_feature_in_order() {
        for (rule, feature) in FIELD_RULES.iter().zip(Feature::ALL) {
            assert_eq!(rule.feature, feature);
            let (lo, hi) = rule.tamper.range();
            assert!(lo < hi, "{feature}: empty range");
        }
    }

    #[test]
    fn tamper_directions() {
        for rule in FIELD_RULES {
            let (lo, hi) = rule.tamper.range();
            match (rule.feature, rule.tamper) {
                (Feature::RatioMedianCv | Feature::RatioP90Cv, Tamper::Scale { .. }) => {
                    assert!(lo > 1.0)
                }
                (Feature::TemporalSmoothRatio, Tamper::Scale { .. }) => assert!(hi < 1.0),
                (Feature::TemporalAcf1, Tamper::Pin { .. }) => assert!(lo > 0.97 && hi < 1.0),
                (
                    Feature::CorrBenClaims
                    | Feature::CorrBenPaid
                    | Feature::CorrClaimsPaid
                    | Feature::Entropy,
                    Tamper::Shift { .. },
                ) => assert!(hi < 0.0),
                (_, Tamper::Shift { .. }) => assert!(lo > 0.0),
                (f, t) => panic!("unexpected rule {f}: {t:?}"),
            }
        }
    }

    #[test]
    fn standard_normal_moments() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let draws: Vec<f64> = (0..20_000).map(|_| sample_standard_normal(&mut rng)).collect();
        let mean = draws.iter().mean();
        let sd = draws.iter().std_dev();
        assert!(mean.abs() < 0.03, "mean {mean}");
        assert!((sd - 1.0).abs() < 0.03, "sd {sd}");
    }

    #[test]
    fn dispersion_single_partition_fallback() {
        let mut v = FeatureVector::default();
        v.ratio_median_cv = 2.0;
        let d = field_dispersion(&[v]);
        assert!((d[Feature::RatioMedianCv.index()] - 0.1).abs() < 1e-12);
        assert_eq!(d[Feature::Entropy.index()], MIN_SCALE);
    }

    #[test]
    fn dispersion_uses_mad() {
        let obs: Vec<FeatureVector> = [1.0, 2.0, 3.0, 4.0, 9.0]
            .iter()
            .map(|&x| FeatureVector {
                digit_chi: x,
                ..FeatureVector::default()
            })
            .collect();
        let d = field_dispersion(&obs);
        assert!((d[Feature::DigitChi.index()] - 1.4826).abs() < 1e-12);
        // Zero-spread fields fall back to the floor.
        assert_eq!(d[Feature::Entropy.index()], MIN_SCALE);
    }

    #[test]
    fn empty_observed_gives_empty_model() {
        let model = synthesize(&[], &CalibrationConfig::default());
        assert!(model.is_empty());
        assert!(model.artifacted.is_empty());
    }

    #[test]
    fn population_sizes() {
        let cfg = CalibrationConfig::default();
        let model = synthesize(&observed(3), &cfg);
        assert_eq!(model.realistic.len(), 4000);
        assert_eq!(model.artifacted.len(), 4000);

        let model = synthesize(&observed(40), &cfg);
        assert_eq!(model.realistic.len(), 4800);
    }

    #[test]
    fn deterministic_for_seed() {
        let cfg = CalibrationConfig::default();
        let a = synthesize(&observed(10), &cfg);
        let b = synthesize(&observed(10), &cfg);
        assert_eq!(a, b);

        let other = CalibrationConfig {
            seed: cfg.seed + 1,
            ..cfg
        };
        let c = synthesize(&observed(10), &other);
        assert_ne!(a.realistic, c.realistic);
    }

    #[test]
    fn samples_respect_domains() {
        let model = synthesize(&observed(8), &CalibrationConfig::default());
        for v in model.realistic.iter().chain(&model.artifacted) {
            for f in Feature::ALL {
                let x = v.get(f);
                assert!(x.is_finite());
                match f.domain() {
                    Domain::Unit => assert!((0.0..=1.0).contains(&x)),
                    Domain::Correlation => assert!((-1.0..=1.0).contains(&x)),
                    Domain::NonNegative => assert!(x >= 0.0),
                }
            }
        }
    }

    #[test]
    fn artifacts_move_in_tamper_direction() {
        let model = synthesize(&observed(8), &CalibrationConfig::default());
        for (real, art) in model.realistic.iter().zip(&model.artifacted) {
            assert!(art.digit_chi > real.digit_chi);
            assert!(art.corr_claims_paid < real.corr_claims_paid);
            assert!(art.entropy < real.entropy || real.entropy == 0.0);
            assert!(art.temporal_acf1 >= 0.975);
            assert!(art.temporal_smooth_ratio <= real.temporal_smooth_ratio);
        }
    }
}
