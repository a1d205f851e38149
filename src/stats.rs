use serde::Serialize;
use tracing::trace;

pub use crate::constants::stats::DEFAULT_MODE_TRIM;
use crate::constants::stats::{LOWER_QUARTILE, UPPER_QUARTILE};

/// Descriptive summary of a numeric sample.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    /// Number of observations.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median.
    pub median: f64,
    /// Robust mode estimate (see [`calc_mode`]).
    pub mode: f64,
    /// Sample standard deviation.
    pub stddev: f64,
    /// Skewness.
    pub skewness: f64,
    /// 25th percentile.
    pub lower_quartile: f64,
    /// 75th percentile.
    pub upper_quartile: f64,
}

/// Compute every statistic in this module for `values`.
pub fn describe(values: &[f64]) -> Summary {
    Summary {
        count: values.len(),
        mean: calc_mean(values),
        median: calc_median(values),
        mode: calc_mode(values, DEFAULT_MODE_TRIM),
        stddev: calc_stddev(values),
        skewness: calc_skewness(values),
        lower_quartile: quantile(values, LOWER_QUARTILE),
        upper_quartile: quantile(values, UPPER_QUARTILE),
    }
}

/// Middle value after sorting; mean of the two middle values for even lengths.
/// Returns `NaN` for an empty sample.
pub fn calc_median(values: &[f64]) -> f64 {
    median_of_sorted(&sorted_copy(values))
}

/// Arithmetic mean. Returns `NaN` for an empty sample.
pub fn calc_mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (divides by `n - 1`). Returns 0 for an empty sample.
pub fn calc_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = calc_mean(values);
    let squares: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    (squares / (n - 1.0)).sqrt()
}

/// Population third central moment divided by the sample stddev cubed.
/// Returns 0 for an empty sample.
pub fn calc_skewness(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = calc_mean(values);
    let m3 = values.iter().map(|x| (x - mean).powi(3)).sum::<f64>() / n;
    m3 / calc_stddev(values).powi(3)
}

/// Linear-interpolation quantile at fractional rank `q * (n - 1)`.
///
/// Returns `NaN` for an empty sample or a `q` outside `[0, 1]`; an
/// out-of-range `q` is rejected rather than clamped to the last order
/// statistic.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    quantile_of_sorted(&sorted_copy(values), q)
}

/// Robust central value built from the median and symmetric quantile trimming.
///
/// The half-spread is the smaller of `median - quantile(diff)` and
/// `quantile(1 - diff) - median`; the result is the median of the
/// observations strictly inside `median ± half_spread`. When nothing lies
/// strictly inside (for example a constant sample) the median is returned
/// instead of `NaN`.
pub fn calc_mode(values: &[f64], diff: f64) -> f64 {
    let sorted = sorted_copy(values);
    let median = median_of_sorted(&sorted);
    let lo = quantile_of_sorted(&sorted, diff);
    let hi = quantile_of_sorted(&sorted, 1.0 - diff);
    let half_spread = if median - lo > hi - median {
        hi - median
    } else {
        median - lo
    };
    trace!(lo, hi, median, half_spread, "mode trim bounds");

    let inner: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|x| *x > median - half_spread && *x < median + half_spread)
        .collect();
    trace!(kept = inner.len(), total = sorted.len(), "mode trimmed sample");
    if inner.is_empty() {
        return median;
    }
    median_of_sorted(&inner)
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let middle = n / 2;
    if n % 2 == 0 {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    } else {
        sorted[middle]
    }
}

fn quantile_of_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return f64::NAN;
    }
    let pos = (sorted.len() - 1) as f64 * q;
    let base = pos.floor() as usize;
    let rest = pos - base as f64;
    match sorted.get(base + 1) {
        Some(next) => sorted[base] + rest * (next - sorted[base]),
        None => sorted[base],
    }
}
