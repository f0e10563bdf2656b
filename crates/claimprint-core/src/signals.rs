//! Signal Evaluator: feature vector + thresholds → raw signal and family flags.
//!
//! Six raw signals fold into five families; the last-digit and entropy checks
//! share `digit_structure_family` because they read the same cents data.
//! Every signal is a disjunction of threshold breaches except temporal noise,
//! which needs high autocorrelation *and* low month-to-month change together.

use serde::{Deserialize, Serialize};

use crate::features::{Feature, FeatureVector};
use crate::thresholds::ThresholdSet;

/// Number of signal families counted by the verdict rule.
pub const FAMILY_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalFamily {
    ReimbursementRatioClustering,
    DigitStructureFamily,
    CorrelationStructure,
    TemporalNoise,
    HeapingGridSpacing,
}

impl SignalFamily {
    pub const ALL: [SignalFamily; FAMILY_COUNT] = [
        SignalFamily::ReimbursementRatioClustering,
        SignalFamily::DigitStructureFamily,
        SignalFamily::CorrelationStructure,
        SignalFamily::TemporalNoise,
        SignalFamily::HeapingGridSpacing,
    ];
}

/// Raw (ungrouped) signals, in published order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    RatioClustering,
    LastDigit,
    Correlation,
    Temporal,
    Entropy,
    Heaping,
}

impl Signal {
    pub const ALL: [Signal; 6] = [
        Signal::RatioClustering,
        Signal::LastDigit,
        Signal::Correlation,
        Signal::Temporal,
        Signal::Entropy,
        Signal::Heaping,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::RatioClustering => "Reimbursement ratio clustering",
            Self::LastDigit => "Last digit analysis",
            Self::Correlation => "Correlation structure",
            Self::Temporal => "Temporal noise",
            Self::Entropy => "Entropy",
            Self::Heaping => "Heaping detection (grid spacing)",
        }
    }

    pub fn family(self) -> SignalFamily {
        match self {
            Self::RatioClustering => SignalFamily::ReimbursementRatioClustering,
            Self::LastDigit | Self::Entropy => SignalFamily::DigitStructureFamily,
            Self::Correlation => SignalFamily::CorrelationStructure,
            Self::Temporal => SignalFamily::TemporalNoise,
            Self::Heaping => SignalFamily::HeapingGridSpacing,
        }
    }

    /// Features the signal reads.
    pub fn features(self) -> &'static [Feature] {
        match self {
            Self::RatioClustering => &[Feature::RatioMedianCv, Feature::RatioP90Cv],
            Self::LastDigit => &[Feature::DigitMaxDev, Feature::DigitChi],
            Self::Correlation => &[
                Feature::CorrBenClaims,
                Feature::CorrBenPaid,
                Feature::CorrClaimsPaid,
            ],
            Self::Temporal => &[Feature::TemporalAcf1, Feature::TemporalSmoothRatio],
            Self::Entropy => &[Feature::Entropy],
            Self::Heaping => &[
                Feature::HeapingShare5c,
                Feature::HeapingShare25c,
                Feature::HeapingMaxBucket,
            ],
        }
    }

    /// Whether all of the signal's breaches must hold at once.
    pub fn is_conjunctive(self) -> bool {
        matches!(self, Self::Temporal)
    }

    pub fn failed(self, vector: &FeatureVector, thresholds: &ThresholdSet) -> bool {
        let mut breaches = self
            .features()
            .iter()
            .map(|&f| thresholds.breaches(f, vector.get(f)));
        if self.is_conjunctive() {
            breaches.all(|b| b)
        } else {
            breaches.any(|b| b)
        }
    }
}

/// Pass/fail per raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalFlags {
    pub ratio_fail: bool,
    pub digit_fail: bool,
    pub corr_fail: bool,
    pub temporal_fail: bool,
    pub entropy_fail: bool,
    pub heaping_fail: bool,
}

impl SignalFlags {
    pub fn get(&self, signal: Signal) -> bool {
        match signal {
            Signal::RatioClustering => self.ratio_fail,
            Signal::LastDigit => self.digit_fail,
            Signal::Correlation => self.corr_fail,
            Signal::Temporal => self.temporal_fail,
            Signal::Entropy => self.entropy_fail,
            Signal::Heaping => self.heaping_fail,
        }
    }

    pub fn fail_count(&self) -> usize {
        Signal::ALL.iter().filter(|&&s| self.get(s)).count()
    }
}

/// Pass/fail per family; serializes as a map keyed by family name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FamilyFailures {
    pub reimbursement_ratio_clustering: bool,
    pub digit_structure_family: bool,
    pub correlation_structure: bool,
    pub temporal_noise: bool,
    pub heaping_grid_spacing: bool,
}

impl FamilyFailures {
    pub fn from_signals(s: &SignalFlags) -> Self {
        Self {
            reimbursement_ratio_clustering: s.ratio_fail,
            digit_structure_family: s.digit_fail || s.entropy_fail,
            correlation_structure: s.corr_fail,
            temporal_noise: s.temporal_fail,
            heaping_grid_spacing: s.heaping_fail,
        }
    }

    pub fn get(&self, family: SignalFamily) -> bool {
        match family {
            SignalFamily::ReimbursementRatioClustering => self.reimbursement_ratio_clustering,
            SignalFamily::DigitStructureFamily => self.digit_structure_family,
            SignalFamily::CorrelationStructure => self.correlation_structure,
            SignalFamily::TemporalNoise => self.temporal_noise,
            SignalFamily::HeapingGridSpacing => self.heaping_grid_spacing,
        }
    }

    pub fn fail_count(&self) -> usize {
        SignalFamily::ALL.iter().filter(|&&f| self.get(f)).count()
    }
}

/// Result of evaluating one vector against one threshold set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub signals: SignalFlags,
    pub families: FamilyFailures,
}

impl Evaluation {
    pub fn family_fail_count(&self) -> usize {
        self.families.fail_count()
    }

    pub fn raw_fail_count(&self) -> usize {
        self.signals.fail_count()
    }
}

/// Apply thresholds to a vector. Total: never fails for finite or non-finite input.
pub fn evaluate(vector: &FeatureVector, thresholds: &ThresholdSet) -> Evaluation {
    let signals = SignalFlags {
        ratio_fail: Signal::RatioClustering.failed(vector, thresholds),
        digit_fail: Signal::LastDigit.failed(vector, thresholds),
        corr_fail: Signal::Correlation.failed(vector, thresholds),
        temporal_fail: Signal::Temporal.failed(vector, thresholds),
        entropy_fail: Signal::Entropy.failed(vector, thresholds),
        heaping_fail: Signal::Heaping.failed(vector, thresholds),
    };
    Evaluation {
        signals,
        families: FamilyFailures::from_signals(&signals),
    }
}
