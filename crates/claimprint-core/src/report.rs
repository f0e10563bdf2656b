//! Upstream Partition Report model.
//!
//! Reports are produced by the aggregation stage (one per region plus the
//! nation-wide `ALL` partition) and are read-only here. Every numeric leaf is
//! optional: absent and `null` values both resolve to "not present" and the
//! feature extractor substitutes `0.0`. Unknown fields are ignored so that
//! newer upstream reports keep loading.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Sentinel identifier of the nation-wide aggregate partition.
pub const ALL_PARTITION: &str = "ALL";
/// Partition for rows whose provider could not be mapped to a region.
pub const UNKNOWN_PARTITION: &str = "UNK";

/// Probability mass keyed by trailing digit (0..=9) or trailing cents (0..=99).
pub type DigitDistribution = BTreeMap<u32, Option<f64>>;

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Report sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionReport {
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: Metadata,
    #[serde(deserialize_with = "null_as_default")]
    pub unit_price: UnitPrice,
    #[serde(deserialize_with = "null_as_default")]
    pub digits: Digits,
    #[serde(deserialize_with = "null_as_default")]
    pub correlations: Correlations,
    #[serde(deserialize_with = "null_as_default")]
    pub ratios: Ratios,
    #[serde(deserialize_with = "null_as_default")]
    pub temporal: Temporal,
    #[serde(deserialize_with = "null_as_default")]
    pub benford: Benford,
    /// Precomputed grid-heaping summary; older reports omit it.
    pub heaping: Option<Heaping>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitPrice {
    /// Coefficient-of-variation summary over the highest-volume billing codes.
    pub top_volume_cv_summary: Option<CvSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvSummary {
    pub median_cv: Option<f64>,
    pub p90_cv: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Digits {
    pub basis: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub cents_last1_dist: DigitDistribution,
    #[serde(deserialize_with = "null_as_default")]
    pub cents_last2_dist: DigitDistribution,
    #[serde(deserialize_with = "null_as_default")]
    pub total_paid_cents_last1_dist: DigitDistribution,
    #[serde(deserialize_with = "null_as_default")]
    pub total_paid_cents_last2_dist: DigitDistribution,
    #[serde(deserialize_with = "null_as_default")]
    pub unit_paid_cents_last1_dist: DigitDistribution,
    #[serde(deserialize_with = "null_as_default")]
    pub unit_paid_cents_last2_dist: DigitDistribution,
    pub normalized_entropy_last2: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Correlations {
    #[serde(rename = "TOTAL_UNIQUE_BENEFICIARIES")]
    pub beneficiaries: Option<BeneficiaryCorrelations>,
    #[serde(rename = "TOTAL_CLAIMS")]
    pub claims: Option<ClaimsCorrelations>,
    /// Correlations computed inside each of the top-200 billing codes.
    pub within_hcpcs_top200: Option<StratifiedCorrelations>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeneficiaryCorrelations {
    #[serde(rename = "TOTAL_CLAIMS")]
    pub total_claims: Option<f64>,
    #[serde(rename = "TOTAL_PAID")]
    pub total_paid: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimsCorrelations {
    #[serde(rename = "TOTAL_PAID")]
    pub total_paid: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StratifiedCorrelations {
    pub median_ben_claims: Option<f64>,
    pub median_ben_paid: Option<f64>,
    pub median_claims_paid: Option<f64>,
    pub mean_ben_claims: Option<f64>,
    pub mean_ben_paid: Option<f64>,
    pub mean_claims_paid: Option<f64>,
    pub share_below_ben_claims_0_4: Option<f64>,
    pub share_below_ben_paid_0_2: Option<f64>,
    pub share_below_claims_paid_0_6: Option<f64>,
    pub n_codes: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ratios {
    pub paid_per_claim: Option<PercentileSpread>,
    pub claims_per_ben: Option<PercentileSpread>,
    pub paid_per_ben: Option<PercentileSpread>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PercentileSpread {
    pub p01: Option<f64>,
    pub p50: Option<f64>,
    pub p99: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Temporal {
    pub volatility: Option<Volatility>,
    pub noise_features: Option<NoiseFeatures>,
}

/// Standard deviation of month-over-month deltas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volatility {
    pub paid_delta_std: Option<f64>,
    pub claims_delta_std: Option<f64>,
    pub bens_delta_std: Option<f64>,
    pub rows_delta_std: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseFeatures {
    /// Lag-1 autocorrelation of the monthly paid series.
    pub acf1_total_paid: Option<f64>,
    /// Std of monthly paid deltas divided by mean monthly paid.
    pub smooth_ratio: Option<f64>,
}

/// Leading-digit statistic of provider-year totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Benford {
    pub chi_like: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heaping {
    pub basis: Option<String>,
    pub share_on_5c_grid: Option<f64>,
    pub share_on_25c_grid: Option<f64>,
    pub max_cent_bucket_share: Option<f64>,
}

// ---------------------------------------------------------------------------
// Multi-partition bundle
// ---------------------------------------------------------------------------

/// Reports for every partition, as written by the aggregation stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportBundle {
    pub default_state: Option<String>,
    pub available_states: Option<Vec<String>>,
    #[serde(deserialize_with = "null_as_default")]
    pub reports: BTreeMap<String, PartitionReport>,
}

impl ReportBundle {
    pub fn default_partition(&self) -> String {
        self.default_state
            .clone()
            .unwrap_or_else(|| ALL_PARTITION.to_string())
    }

    /// Partition identifiers in display order.
    ///
    /// Uses the bundle's own list when present, otherwise `ALL` first, then
    /// the remaining regions sorted, with `UNK` last.
    pub fn ordered_partitions(&self) -> Vec<String> {
        match &self.available_states {
            Some(states) if !states.is_empty() => states.clone(),
            _ => ordered_partition_ids(self.reports.keys().map(String::as_str)),
        }
    }

    /// Regional reports forming the observed population (everything but `ALL`).
    pub fn observed_reports(&self) -> impl Iterator<Item = (&str, &PartitionReport)> {
        self.reports
            .iter()
            .filter(|(id, _)| id.as_str() != ALL_PARTITION)
            .map(|(id, report)| (id.as_str(), report))
    }
}

/// `ALL` first, then regions in lexical order, then `UNK`.
pub fn ordered_partition_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut has_unknown = false;
    let mut regions: Vec<&str> = Vec::new();
    for id in ids {
        match id {
            ALL_PARTITION => {}
            UNKNOWN_PARTITION => has_unknown = true,
            other => regions.push(other),
        }
    }
    regions.sort_unstable();
    regions.dedup();

    let mut out = Vec::with_capacity(regions.len() + 2);
    out.push(ALL_PARTITION.to_string());
    out.extend(regions.into_iter().map(str::to_string));
    if has_unknown {
        out.push(UNKNOWN_PARTITION.to_string());
    }
    out
}

// ---------------------------------------------------------------------------
// Input documents
// ---------------------------------------------------------------------------

/// Either a multi-partition bundle or a lone report (degraded mode).
#[derive(Debug, Clone, PartialEq)]
pub enum InputDocument {
    Bundle(ReportBundle),
    Single(PartitionReport),
}

impl InputDocument {
    /// Parse a document, treating any object with a `reports` key as a bundle.
    pub fn from_json_str(raw: &str, origin: &Path) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| Error::parse(origin, e))?;
        let is_bundle = match &value {
            serde_json::Value::Object(map) => map.contains_key("reports"),
            other => {
                return Err(Error::InvalidInput(format!(
                    "{} must contain a JSON object, found {}",
                    origin.display(),
                    json_kind(other)
                )));
            }
        };
        if is_bundle {
            serde_json::from_value(value)
                .map(Self::Bundle)
                .map_err(|e| Error::parse(origin, e))
        } else {
            serde_json::from_value(value)
                .map(Self::Single)
                .map_err(|e| Error::parse(origin, e))
        }
    }
}

/// Read and parse an input document from disk.
pub fn load_input(path: &Path) -> Result<InputDocument> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    InputDocument::from_json_str(&raw, path)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
