//! Robust order statistics for claims-signal calibration.
//!
//! Every function here is total: empty input yields `0.0` (or `None` where the
//! caller needs to distinguish "no estimate") and non-finite samples are
//! dropped before ranking, so downstream thresholds are always defined.

use statrs::statistics::Statistics;
use std::cmp::Ordering;

/// Scale factor that makes the median absolute deviation a consistent
/// estimator of the standard deviation under normality.
pub const MAD_NORMAL_CONSISTENCY: f64 = 1.4826;

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn finite_sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Linear interpolation between order statistics of an already-sorted slice.
fn interpolate_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 1.0);
    let idx = q * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let t = idx - lo as f64;
        sorted[lo] * (1.0 - t) + sorted[hi] * t
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Location
// ═══════════════════════════════════════════════════════════════════════════════

/// Continuous quantile (`q` in `[0, 1]`) with linear interpolation between
/// order statistics, i.e. `x[floor(h)] + (h - floor(h)) * (x[ceil(h)] - x[floor(h)])`
/// where `h = q * (n - 1)`.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    interpolate_sorted(&finite_sorted(values), q)
}

/// Several quantiles from a single sort.
pub fn quantiles(values: &[f64], qs: &[f64]) -> Vec<f64> {
    let sorted = finite_sorted(values);
    qs.iter().map(|&q| interpolate_sorted(&sorted, q)).collect()
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Arithmetic mean of the finite samples; `0.0` when there are none.
pub fn mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    finite.iter().mean()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Dispersion
// ═══════════════════════════════════════════════════════════════════════════════

/// Median absolute deviation around the median (unscaled).
pub fn median_abs_deviation(values: &[f64]) -> f64 {
    let sorted = finite_sorted(values);
    if sorted.is_empty() {
        return 0.0;
    }
    let center = interpolate_sorted(&sorted, 0.5);
    let deviations: Vec<f64> = sorted.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// MAD scaled by [`MAD_NORMAL_CONSISTENCY`].
///
/// Returns `None` with fewer than two finite samples: a single observation has
/// no spread to estimate and callers must pick their own floor.
pub fn robust_scale(values: &[f64]) -> Option<f64> {
    let n = values.iter().filter(|v| v.is_finite()).count();
    if n < 2 {
        return None;
    }
    Some(median_abs_deviation(values) * MAD_NORMAL_CONSISTENCY)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Distribution shape
// ═══════════════════════════════════════════════════════════════════════════════

/// Shannon entropy (bits) of a probability mass, normalized so that a uniform
/// distribution over `buckets` outcomes scores exactly 1.0.
///
/// Non-positive and non-finite masses are ignored; the remaining masses are
/// divided by their sum before the entropy is taken.
pub fn normalized_entropy<I>(masses: I, buckets: usize) -> f64
where
    I: IntoIterator<Item = f64>,
{
    if buckets < 2 {
        return 0.0;
    }
    let ps: Vec<f64> = masses
        .into_iter()
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();
    let total: f64 = ps.iter().sum();
    if ps.is_empty() || total <= 0.0 {
        return 0.0;
    }
    let h: f64 = ps
        .iter()
        .map(|p| {
            let p = p / total;
            -p * p.log2()
        })
        .sum();
    h / (buckets as f64).log2()
}

/// Mean / median / 90th percentile of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    pub mean: f64,
    pub median: f64,
    pub p90: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Self {
        let qs = quantiles(values, &[0.5, 0.9]);
        Self {
            mean: mean(values),
            median: qs[0],
            p90: qs[1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&v, 0.0), 1.0);
        assert_eq!(quantile(&v, 1.0), 4.0);
        assert!((quantile(&v, 0.5) - 2.5).abs() < 1e-12);
        // h = 0.9 * 3 = 2.7 -> 3 + 0.7 * (4 - 3)
        assert!((quantile(&v, 0.9) - 3.7).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_unsorted_and_nan() {
        let v = [4.0, f64::NAN, 1.0, 3.0, 2.0];
        assert!((quantile(&v, 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_empty() {
        assert_eq!(quantile(&[], 0.975), 0.0);
        assert_eq!(median(&[]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_quantiles_match_single() {
        let v: Vec<f64> = (0..97).map(|i| ((i * 37) % 97) as f64 / 7.0).collect();
        let qs = quantiles(&v, &[0.025, 0.5, 0.975]);
        assert_eq!(qs[0], quantile(&v, 0.025));
        assert_eq!(qs[1], quantile(&v, 0.5));
        assert_eq!(qs[2], quantile(&v, 0.975));
    }

    #[test]
    fn test_mad_known_value() {
        // median = 3, |dev| = [2, 1, 0, 1, 6] -> median 1
        let v = [1.0, 2.0, 3.0, 4.0, 9.0];
        assert!((median_abs_deviation(&v) - 1.0).abs() < 1e-12);
        let s = robust_scale(&v).unwrap();
        assert!((s - MAD_NORMAL_CONSISTENCY).abs() < 1e-12);
    }

    #[test]
    fn test_robust_scale_needs_two() {
        assert_eq!(robust_scale(&[]), None);
        assert_eq!(robust_scale(&[0.7]), None);
        assert_eq!(robust_scale(&[0.7, f64::NAN]), None);
        assert_eq!(robust_scale(&[0.7, 0.7]), Some(0.0));
    }

    #[test]
    fn test_entropy_uniform_is_one() {
        let h = normalized_entropy(std::iter::repeat_n(0.01, 100), 100);
        assert!((h - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_entropy_point_mass_is_zero() {
        let h = normalized_entropy([1.0, 0.0, 0.0], 100);
        assert_eq!(h, 0.0);
    }

    #[test]
    fn test_entropy_renormalizes() {
        // Half-weight uniform mass over 100 buckets still scores 1.0.
        let h = normalized_entropy(std::iter::repeat_n(0.005, 100), 100);
        assert!((h - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary() {
        let v: Vec<f64> = (0..=10).map(f64::from).collect();
        let s = Summary::of(&v);
        assert!((s.mean - 5.0).abs() < 1e-12);
        assert!((s.median - 5.0).abs() < 1e-12);
        assert!((s.p90 - 9.0).abs() < 1e-12);
    }
}
