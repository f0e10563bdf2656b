//! Feature Extractor: one Partition Report → one fixed 13-field vector.
//!
//! Upstream reports come in two naming conventions (legacy flat metrics and
//! namespaced stratified metrics). Each feature therefore has an ordered list
//! of [`Candidate`] lookups; the first one that yields a finite value wins and
//! a feature with no resolvable candidate takes its [`Feature::absent_value`].
//! Resolved values are clamped to the feature's [`Domain`].

use serde::{Deserialize, Serialize};

use crate::report::{DigitDistribution, PartitionReport};

/// Number of features in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 13;

/// Buckets in the trailing-two-digit cents distribution.
pub const CENTS_BUCKETS: usize = 100;

const UNIFORM_DIGIT_SHARE: f64 = 0.1;

pub const SCOPE_STRATIFIED: &str = "within_hcpcs_top200_median";
pub const SCOPE_GLOBAL: &str = "global";

// ---------------------------------------------------------------------------
// Feature identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    RatioMedianCv,
    RatioP90Cv,
    DigitMaxDev,
    DigitChi,
    CorrBenClaims,
    CorrBenPaid,
    CorrClaimsPaid,
    TemporalAcf1,
    TemporalSmoothRatio,
    Entropy,
    HeapingShare5c,
    HeapingShare25c,
    HeapingMaxBucket,
}

/// Valid range of a feature value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Domain {
    /// `[0, +inf)`: dispersion and chi-like statistics.
    NonNegative,
    /// `[0, 1]`: shares and normalized entropy.
    Unit,
    /// `[-1, 1]`: correlation coefficients.
    Correlation,
}

impl Domain {
    pub fn clamp(self, value: f64) -> f64 {
        let value = if value.is_finite() { value } else { 0.0 };
        match self {
            Self::NonNegative => value.max(0.0),
            Self::Unit => value.clamp(0.0, 1.0),
            Self::Correlation => value.clamp(-1.0, 1.0),
        }
    }
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::RatioMedianCv,
        Feature::RatioP90Cv,
        Feature::DigitMaxDev,
        Feature::DigitChi,
        Feature::CorrBenClaims,
        Feature::CorrBenPaid,
        Feature::CorrClaimsPaid,
        Feature::TemporalAcf1,
        Feature::TemporalSmoothRatio,
        Feature::Entropy,
        Feature::HeapingShare5c,
        Feature::HeapingShare25c,
        Feature::HeapingMaxBucket,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::RatioMedianCv => "ratio_median_cv",
            Self::RatioP90Cv => "ratio_p90_cv",
            Self::DigitMaxDev => "digit_max_dev",
            Self::DigitChi => "digit_chi",
            Self::CorrBenClaims => "corr_ben_claims",
            Self::CorrBenPaid => "corr_ben_paid",
            Self::CorrClaimsPaid => "corr_claims_paid",
            Self::TemporalAcf1 => "temporal_acf1",
            Self::TemporalSmoothRatio => "temporal_smooth_ratio",
            Self::Entropy => "entropy",
            Self::HeapingShare5c => "heaping_share_5c",
            Self::HeapingShare25c => "heaping_share_25c",
            Self::HeapingMaxBucket => "heaping_max_bucket",
        }
    }

    pub fn domain(self) -> Domain {
        match self {
            Self::RatioMedianCv
            | Self::RatioP90Cv
            | Self::DigitMaxDev
            | Self::DigitChi
            | Self::TemporalSmoothRatio => Domain::NonNegative,
            Self::CorrBenClaims | Self::CorrBenPaid | Self::CorrClaimsPaid | Self::TemporalAcf1 => {
                Domain::Correlation
            }
            Self::Entropy
            | Self::HeapingShare5c
            | Self::HeapingShare25c
            | Self::HeapingMaxBucket => Domain::Unit,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Value used when no candidate resolves. A missing trailing-digit
    /// distribution means all ten frequencies are `0.0`, so the digit
    /// statistics are those of `[0.0; 10]`; every other feature is `0.0`.
    pub fn absent_value(self) -> f64 {
        match self {
            Self::DigitMaxDev => digit_max_dev(&[0.0; 10]),
            Self::DigitChi => digit_chi(&[0.0; 10]),
            _ => 0.0,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Feature vector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub ratio_median_cv: f64,
    pub ratio_p90_cv: f64,
    pub digit_max_dev: f64,
    pub digit_chi: f64,
    pub corr_ben_claims: f64,
    pub corr_ben_paid: f64,
    pub corr_claims_paid: f64,
    pub temporal_acf1: f64,
    pub temporal_smooth_ratio: f64,
    pub entropy: f64,
    pub heaping_share_5c: f64,
    pub heaping_share_25c: f64,
    pub heaping_max_bucket: f64,
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::RatioMedianCv => self.ratio_median_cv,
            Feature::RatioP90Cv => self.ratio_p90_cv,
            Feature::DigitMaxDev => self.digit_max_dev,
            Feature::DigitChi => self.digit_chi,
            Feature::CorrBenClaims => self.corr_ben_claims,
            Feature::CorrBenPaid => self.corr_ben_paid,
            Feature::CorrClaimsPaid => self.corr_claims_paid,
            Feature::TemporalAcf1 => self.temporal_acf1,
            Feature::TemporalSmoothRatio => self.temporal_smooth_ratio,
            Feature::Entropy => self.entropy,
            Feature::HeapingShare5c => self.heaping_share_5c,
            Feature::HeapingShare25c => self.heaping_share_25c,
            Feature::HeapingMaxBucket => self.heaping_max_bucket,
        }
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        let slot = match feature {
            Feature::RatioMedianCv => &mut self.ratio_median_cv,
            Feature::RatioP90Cv => &mut self.ratio_p90_cv,
            Feature::DigitMaxDev => &mut self.digit_max_dev,
            Feature::DigitChi => &mut self.digit_chi,
            Feature::CorrBenClaims => &mut self.corr_ben_claims,
            Feature::CorrBenPaid => &mut self.corr_ben_paid,
            Feature::CorrClaimsPaid => &mut self.corr_claims_paid,
            Feature::TemporalAcf1 => &mut self.temporal_acf1,
            Feature::TemporalSmoothRatio => &mut self.temporal_smooth_ratio,
            Feature::Entropy => &mut self.entropy,
            Feature::HeapingShare5c => &mut self.heaping_share_5c,
            Feature::HeapingShare25c => &mut self.heaping_share_25c,
            Feature::HeapingMaxBucket => &mut self.heaping_max_bucket,
        };
        *slot = value;
    }

    /// Clamp every field to its [`Domain`]; non-finite values become `0.0`.
    pub fn clamped(mut self) -> Self {
        for feature in Feature::ALL {
            self.set(feature, feature.domain().clamp(self.get(feature)));
        }
        self
    }

    /// Values in [`Feature::ALL`] order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        Feature::ALL.map(|f| self.get(f))
    }
}

// ---------------------------------------------------------------------------
// Candidate lookups
// ---------------------------------------------------------------------------

/// One way of reading a feature out of a report.
#[derive(Clone, Copy)]
pub struct Candidate {
    /// Label recorded when this candidate resolves the feature.
    pub source: &'static str,
    pub lookup: fn(&PartitionReport) -> Option<f64>,
}

const RATIO_MEDIAN_CV: &[Candidate] = &[Candidate {
    source: "top_volume_hcpcs",
    lookup: median_cv,
}];
const RATIO_P90_CV: &[Candidate] = &[Candidate {
    source: "top_volume_hcpcs",
    lookup: p90_cv,
}];
const DIGIT_MAX_DEV: &[Candidate] = &[Candidate {
    source: "unit_paid",
    lookup: last1_max_dev,
}];
const DIGIT_CHI: &[Candidate] = &[Candidate {
    source: "unit_paid",
    lookup: last1_chi,
}];
const CORR_BEN_CLAIMS: &[Candidate] = &[
    Candidate {
        source: SCOPE_STRATIFIED,
        lookup: stratified_ben_claims,
    },
    Candidate {
        source: SCOPE_GLOBAL,
        lookup: global_ben_claims,
    },
];
const CORR_BEN_PAID: &[Candidate] = &[
    Candidate {
        source: SCOPE_STRATIFIED,
        lookup: stratified_ben_paid,
    },
    Candidate {
        source: SCOPE_GLOBAL,
        lookup: global_ben_paid,
    },
];
const CORR_CLAIMS_PAID: &[Candidate] = &[
    Candidate {
        source: SCOPE_STRATIFIED,
        lookup: stratified_claims_paid,
    },
    Candidate {
        source: SCOPE_GLOBAL,
        lookup: global_claims_paid,
    },
];
const TEMPORAL_ACF1: &[Candidate] = &[Candidate {
    source: "noise_features",
    lookup: acf1_total_paid,
}];
const TEMPORAL_SMOOTH_RATIO: &[Candidate] = &[Candidate {
    source: "noise_features",
    lookup: smooth_ratio,
}];
const ENTROPY: &[Candidate] = &[
    Candidate {
        source: "report",
        lookup: reported_entropy,
    },
    Candidate {
        source: "cents_last2_dist",
        lookup: derived_entropy,
    },
];
const HEAPING_SHARE_5C: &[Candidate] = &[
    Candidate {
        source: "report",
        lookup: reported_share_5c,
    },
    Candidate {
        source: "cents_last2_dist",
        lookup: derived_share_5c,
    },
];
const HEAPING_SHARE_25C: &[Candidate] = &[
    Candidate {
        source: "report",
        lookup: reported_share_25c,
    },
    Candidate {
        source: "cents_last2_dist",
        lookup: derived_share_25c,
    },
];
const HEAPING_MAX_BUCKET: &[Candidate] = &[
    Candidate {
        source: "report",
        lookup: reported_max_bucket,
    },
    Candidate {
        source: "cents_last2_dist",
        lookup: derived_max_bucket,
    },
];

/// Ordered lookups for `feature`, most preferred first.
pub fn candidates(feature: Feature) -> &'static [Candidate] {
    match feature {
        Feature::RatioMedianCv => RATIO_MEDIAN_CV,
        Feature::RatioP90Cv => RATIO_P90_CV,
        Feature::DigitMaxDev => DIGIT_MAX_DEV,
        Feature::DigitChi => DIGIT_CHI,
        Feature::CorrBenClaims => CORR_BEN_CLAIMS,
        Feature::CorrBenPaid => CORR_BEN_PAID,
        Feature::CorrClaimsPaid => CORR_CLAIMS_PAID,
        Feature::TemporalAcf1 => TEMPORAL_ACF1,
        Feature::TemporalSmoothRatio => TEMPORAL_SMOOTH_RATIO,
        Feature::Entropy => ENTROPY,
        Feature::HeapingShare5c => HEAPING_SHARE_5C,
        Feature::HeapingShare25c => HEAPING_SHARE_25C,
        Feature::HeapingMaxBucket => HEAPING_MAX_BUCKET,
    }
}

fn median_cv(r: &PartitionReport) -> Option<f64> {
    r.unit_price.top_volume_cv_summary.as_ref()?.median_cv
}

fn p90_cv(r: &PartitionReport) -> Option<f64> {
    r.unit_price.top_volume_cv_summary.as_ref()?.p90_cv
}

fn stratified_ben_claims(r: &PartitionReport) -> Option<f64> {
    r.correlations.within_hcpcs_top200.as_ref()?.median_ben_claims
}

fn stratified_ben_paid(r: &PartitionReport) -> Option<f64> {
    r.correlations.within_hcpcs_top200.as_ref()?.median_ben_paid
}

fn stratified_claims_paid(r: &PartitionReport) -> Option<f64> {
    r.correlations.within_hcpcs_top200.as_ref()?.median_claims_paid
}

fn global_ben_claims(r: &PartitionReport) -> Option<f64> {
    r.correlations.beneficiaries.as_ref()?.total_claims
}

fn global_ben_paid(r: &PartitionReport) -> Option<f64> {
    r.correlations.beneficiaries.as_ref()?.total_paid
}

fn global_claims_paid(r: &PartitionReport) -> Option<f64> {
    r.correlations.claims.as_ref()?.total_paid
}

fn acf1_total_paid(r: &PartitionReport) -> Option<f64> {
    r.temporal.noise_features.as_ref()?.acf1_total_paid
}

fn smooth_ratio(r: &PartitionReport) -> Option<f64> {
    r.temporal.noise_features.as_ref()?.smooth_ratio
}

fn reported_entropy(r: &PartitionReport) -> Option<f64> {
    r.digits.normalized_entropy_last2
}

fn reported_share_5c(r: &PartitionReport) -> Option<f64> {
    r.heaping.as_ref()?.share_on_5c_grid
}

fn reported_share_25c(r: &PartitionReport) -> Option<f64> {
    r.heaping.as_ref()?.share_on_25c_grid
}

fn reported_max_bucket(r: &PartitionReport) -> Option<f64> {
    r.heaping.as_ref()?.max_cent_bucket_share
}

fn last1_max_dev(r: &PartitionReport) -> Option<f64> {
    last1_distribution(r).map(|d| digit_max_dev(&digit_shares(d)))
}

fn last1_chi(r: &PartitionReport) -> Option<f64> {
    last1_distribution(r).map(|d| digit_chi(&digit_shares(d)))
}

fn derived_entropy(r: &PartitionReport) -> Option<f64> {
    last2_distribution(r).map(cents_entropy)
}

fn derived_share_5c(r: &PartitionReport) -> Option<f64> {
    last2_distribution(r).and_then(|d| grid_share(d, 5))
}

fn derived_share_25c(r: &PartitionReport) -> Option<f64> {
    last2_distribution(r).and_then(|d| grid_share(d, 25))
}

fn derived_max_bucket(r: &PartitionReport) -> Option<f64> {
    last2_distribution(r).and_then(max_bucket_share)
}

// ---------------------------------------------------------------------------
// Distribution helpers
// ---------------------------------------------------------------------------

fn first_non_empty<'a>(dists: [&'a DigitDistribution; 2]) -> Option<&'a DigitDistribution> {
    dists.into_iter().find(|d| d.values().any(|p| p.is_some()))
}

/// Trailing-digit distribution, unit-paid basis preferred.
fn last1_distribution(r: &PartitionReport) -> Option<&DigitDistribution> {
    first_non_empty([
        &r.digits.unit_paid_cents_last1_dist,
        &r.digits.cents_last1_dist,
    ])
}

/// Trailing-two-digit cents distribution, unit-paid basis preferred.
fn last2_distribution(r: &PartitionReport) -> Option<&DigitDistribution> {
    first_non_empty([
        &r.digits.unit_paid_cents_last2_dist,
        &r.digits.cents_last2_dist,
    ])
}

/// Shares of digits 0..=9; absent digits count as `0.0`.
fn digit_shares(dist: &DigitDistribution) -> [f64; 10] {
    std::array::from_fn(|d| {
        dist.get(&(d as u32))
            .copied()
            .flatten()
            .filter(|p| p.is_finite())
            .unwrap_or(0.0)
    })
}

/// Largest absolute deviation of any digit share from the uniform 1/10.
pub fn digit_max_dev(shares: &[f64; 10]) -> f64 {
    shares
        .iter()
        .map(|x| (x - UNIFORM_DIGIT_SHARE).abs())
        .fold(0.0, f64::max)
}

/// Chi-like distance of digit shares from uniform: `Σ (x − 0.1)² / 0.1`.
pub fn digit_chi(shares: &[f64; 10]) -> f64 {
    shares
        .iter()
        .map(|x| (x - UNIFORM_DIGIT_SHARE).powi(2) / UNIFORM_DIGIT_SHARE)
        .sum()
}

fn positive_masses(dist: &DigitDistribution) -> impl Iterator<Item = (u32, f64)> + '_ {
    dist.iter()
        .filter_map(|(k, p)| p.filter(|p| p.is_finite() && *p > 0.0).map(|p| (*k, p)))
}

/// Normalized Shannon entropy of the cents distribution (1.0 = uniform over 100).
pub fn cents_entropy(dist: &DigitDistribution) -> f64 {
    claimprint_stats::normalized_entropy(positive_masses(dist).map(|(_, p)| p), CENTS_BUCKETS)
}

/// Share of mass on cents values that are multiples of `step`.
pub fn grid_share(dist: &DigitDistribution, step: u32) -> Option<f64> {
    let total: f64 = positive_masses(dist).map(|(_, p)| p).sum();
    if total <= 0.0 {
        return None;
    }
    let on_grid: f64 = positive_masses(dist)
        .filter(|(k, _)| k % step == 0)
        .map(|(_, p)| p)
        .sum();
    Some(on_grid / total)
}

/// Share of mass in the single largest cents bucket.
pub fn max_bucket_share(dist: &DigitDistribution) -> Option<f64> {
    let total: f64 = positive_masses(dist).map(|(_, p)| p).sum();
    if total <= 0.0 {
        return None;
    }
    let max = positive_masses(dist).map(|(_, p)| p).fold(0.0, f64::max);
    Some(max / total)
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// A feature vector plus the candidate label each feature was resolved from.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub vector: FeatureVector,
    pub resolved_from: [Option<&'static str>; FEATURE_COUNT],
}

impl Extraction {
    pub fn source_of(&self, feature: Feature) -> Option<&'static str> {
        self.resolved_from[feature.index()]
    }

    /// `within_hcpcs_top200_median` when any correlation came from the
    /// stratified block, otherwise `global`.
    ///
    /// The label follows the values actually used: a stratified block that
    /// carries only `n_codes` (no resolvable medians) leaves every correlation
    /// on its global coefficient and is labelled `global`.
    pub fn correlation_scope(&self) -> &'static str {
        let stratified = [
            Feature::CorrBenClaims,
            Feature::CorrBenPaid,
            Feature::CorrClaimsPaid,
        ]
        .into_iter()
        .any(|f| self.source_of(f) == Some(SCOPE_STRATIFIED));
        if stratified {
            SCOPE_STRATIFIED
        } else {
            SCOPE_GLOBAL
        }
    }
}

/// Resolve one feature: first finite candidate wins.
pub fn resolve(feature: Feature, report: &PartitionReport) -> Option<(f64, &'static str)> {
    candidates(feature).iter().find_map(|c| {
        (c.lookup)(report)
            .filter(|v| v.is_finite())
            .map(|v| (v, c.source))
    })
}

/// Reduce a report to its feature vector.
pub fn extract(report: &PartitionReport) -> Extraction {
    let mut vector = FeatureVector::default();
    let mut resolved_from = [None; FEATURE_COUNT];
    for feature in Feature::ALL {
        let (value, source) = match resolve(feature, report) {
            Some((value, source)) => (value, Some(source)),
            None => (feature.absent_value(), None),
        };
        vector.set(feature, feature.domain().clamp(value));
        resolved_from[feature.index()] = source;
    }
    Extraction {
        vector,
        resolved_from,
    }
}
