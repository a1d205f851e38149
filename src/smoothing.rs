//! Windowed weighted moving average over series with gaps.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::smoothing::{DEFAULT_MIN_START_THRESHOLD, DEFAULT_START_AFTER_LAST_NULL};
use crate::errors::PageError;

/// Controls where the moving average starts emitting values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovingAverageOptions {
    /// Restart the warm-up scan at the last gap before the final observation.
    pub start_after_last_null: bool,
    /// Cumulative weight required before averages are emitted.
    pub min_start_threshold: f64,
}

impl Default for MovingAverageOptions {
    fn default() -> Self {
        Self {
            start_after_last_null: DEFAULT_START_AFTER_LAST_NULL,
            min_start_threshold: DEFAULT_MIN_START_THRESHOLD,
        }
    }
}

/// One `(x, y, weight)` observation. `y == None` marks a gap.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Position along the series (for example a year).
    pub x: f64,
    /// Observed value, `None` for a gap.
    pub y: Option<f64>,
    /// Contribution factor; `<= 0` excludes the point.
    pub weight: f64,
}

/// Weighted moving average of `ys` over trailing windows of `window_size`.
///
/// Gaps are forward-filled with the last observed value once smoothing has
/// started; points with weight `<= 0` never contribute. Output positions
/// before the start index, before the first observation, and after the last
/// observation are `None`. A window whose contributing weight sums to zero
/// yields `Some(NaN)`.
///
/// The warm-up scan runs from the last gap before the final observation and
/// stops at the first position where the running weight total reaches
/// `min_start_threshold`. The start index is that position, raised to the
/// last gap when `start_after_last_null` is set. A threshold that is never
/// reached places no bound, leaving only the gap bound (or index 0).
pub fn moving_average(
    xs: &[f64],
    ys: &[Option<f64>],
    window_size: usize,
    weights: &[f64],
    options: &MovingAverageOptions,
) -> Result<Vec<Option<f64>>, PageError> {
    if xs.len() != ys.len() || ys.len() != weights.len() {
        return Err(PageError::Configuration(format!(
            "moving average inputs differ in length: xs={}, ys={}, weights={}",
            xs.len(),
            ys.len(),
            weights.len()
        )));
    }
    if window_size == 0 {
        return Err(PageError::Configuration(
            "moving average window_size must be greater than zero".into(),
        ));
    }
    let n = ys.len();
    let mut smoothed = vec![None; n];
    if n == 0 {
        return Ok(smoothed);
    }

    let last_value = ys.iter().rposition(Option::is_some).unwrap_or(0);
    let last_gap = ys[..last_value]
        .iter()
        .rposition(Option::is_none)
        .unwrap_or(0);
    let threshold_start = warm_up_index(weights, last_gap, options.min_start_threshold);
    if threshold_start.is_none() {
        debug!(
            threshold = options.min_start_threshold,
            last_gap, "moving average never reached warm-up threshold"
        );
    }
    let gap_start = if options.start_after_last_null {
        last_gap
    } else {
        0
    };
    let start = threshold_start.unwrap_or(0).max(gap_start);

    let mut filled = Vec::with_capacity(n);
    let mut last_seen = None;
    for y in ys {
        if y.is_some() {
            last_seen = *y;
        }
        filled.push(last_seen);
    }

    for idx in start..=last_value {
        if filled[idx].is_none() {
            continue;
        }
        let window_start = (idx + 1).saturating_sub(window_size);
        let mut total = 0.0;
        let mut weighted = 0.0;
        for pos in window_start..=idx {
            let weight = weights[pos];
            if weight > 0.0
                && let Some(value) = filled[pos]
            {
                weighted += value * weight;
                total += weight;
            }
        }
        smoothed[idx] = Some(weighted / total);
    }
    Ok(smoothed)
}

/// Apply [`moving_average`] to a slice of points, replacing each `y`.
pub fn smooth_points(
    points: &[SeriesPoint],
    window_size: usize,
    options: &MovingAverageOptions,
) -> Result<Vec<SeriesPoint>, PageError> {
    let xs: Vec<f64> = points.iter().map(|point| point.x).collect();
    let ys: Vec<Option<f64>> = points.iter().map(|point| point.y).collect();
    let weights: Vec<f64> = points.iter().map(|point| point.weight).collect();
    let smoothed = moving_average(&xs, &ys, window_size, &weights, options)?;
    Ok(points
        .iter()
        .zip(smoothed)
        .map(|(point, y)| SeriesPoint { y, ..*point })
        .collect())
}

fn warm_up_index(weights: &[f64], scan_from: usize, threshold: f64) -> Option<usize> {
    let mut cumulative = 0.0;
    for (offset, weight) in weights[scan_from..].iter().enumerate() {
        cumulative += weight;
        if cumulative >= threshold {
            return Some(scan_from + offset);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(start_after_last_null: bool, min_start_threshold: f64) -> MovingAverageOptions {
        MovingAverageOptions {
            start_after_last_null,
            min_start_threshold,
        }
    }

    fn xs(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    fn assert_series(actual: &[Option<f64>], expected: &[Option<f64>]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            match (a, e) {
                (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}"),
                (None, None) => {}
                _ => panic!("{actual:?} vs {expected:?}"),
            }
        }
    }

    #[test]
    fn forward_filled_gap_enters_window() {
        let ys = [Some(1.0), None, Some(3.0)];
        let out = moving_average(&xs(3), &ys, 2, &[1.0, 1.0, 1.0], &options(false, 0.0)).unwrap();
        assert_series(&out, &[None, Some(1.0), Some(2.0)]);
    }

    #[test]
    fn warm_up_scan_starts_at_last_gap_for_both_flags() {
        let ys = [Some(1.0), Some(1.0), None, Some(5.0), Some(5.0)];
        let weights = [10.0, 1.0, 1.0, 1.0, 1.0];
        for restart in [false, true] {
            let out = moving_average(&xs(5), &ys, 2, &weights, &options(restart, 3.0)).unwrap();
            assert_series(&out, &[None, None, None, None, Some(5.0)]);
        }
    }

    #[test]
    fn default_options_restart_after_last_gap() {
        let ys = [Some(1.0), None, Some(3.0)];
        let out = moving_average(&xs(3), &ys, 2, &[1.0, 1.0, 1.0], &options(true, 0.0)).unwrap();
        assert_series(&out, &[None, Some(1.0), Some(2.0)]);
    }

    #[test]
    fn warm_up_threshold_delays_output() {
        let ys: Vec<Option<f64>> = (1..=5).map(|v| Some(v as f64)).collect();
        let out = moving_average(&xs(5), &ys, 2, &[1.0; 5], &options(true, 3.0)).unwrap();
        assert_series(&out, &[None, None, Some(2.5), Some(3.5), Some(4.5)]);
    }

    #[test]
    fn unreached_threshold_places_no_bound() {
        let ys = [Some(1.0), Some(2.0), Some(3.0)];
        let out = moving_average(&xs(3), &ys, 2, &[1.0; 3], &MovingAverageOptions::default())
            .unwrap();
        assert_series(&out, &[Some(1.0), Some(1.5), Some(2.5)]);
    }

    #[test]
    fn unreached_threshold_keeps_gap_bound_only_when_restarting() {
        let ys = [Some(1.0), Some(1.0), None, Some(5.0), Some(5.0)];
        let weights = [1.0; 5];
        let from_start = moving_average(&xs(5), &ys, 2, &weights, &options(false, 100.0)).unwrap();
        assert_series(
            &from_start,
            &[Some(1.0), Some(1.0), Some(1.0), Some(3.0), Some(5.0)],
        );
        let after_gap = moving_average(&xs(5), &ys, 2, &weights, &options(true, 100.0)).unwrap();
        assert_series(&after_gap, &[None, None, Some(1.0), Some(3.0), Some(5.0)]);
    }

    #[test]
    fn weights_shape_the_average() {
        let ys = [Some(0.0), Some(10.0)];
        let out = moving_average(&xs(2), &ys, 2, &[1.0, 3.0], &options(true, 0.0)).unwrap();
        assert_series(&out, &[Some(0.0), Some(7.5)]);
    }

    #[test]
    fn non_positive_weights_are_skipped() {
        let ys = [Some(100.0), Some(2.0), Some(4.0)];
        let out = moving_average(&xs(3), &ys, 3, &[-1.0, 1.0, 1.0], &options(true, 0.0)).unwrap();
        assert_series(&out, &[None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn zero_weight_window_yields_nan() {
        let ys = [Some(1.0), Some(2.0)];
        let out = moving_average(&xs(2), &ys, 1, &[0.0, 0.0], &options(true, 0.0)).unwrap();
        assert!(out.iter().all(|value| value.is_some_and(f64::is_nan)));
    }

    #[test]
    fn trailing_gaps_are_cleared() {
        let ys = [Some(1.0), Some(2.0), None, None];
        let out = moving_average(&xs(4), &ys, 2, &[1.0; 4], &options(true, 0.0)).unwrap();
        assert_series(&out, &[Some(1.0), Some(1.5), None, None]);
    }

    #[test]
    fn leading_gaps_stay_empty() {
        let ys = [None, Some(2.0), Some(4.0)];
        let out = moving_average(&xs(3), &ys, 2, &[1.0; 3], &options(false, 0.0)).unwrap();
        assert_series(&out, &[None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn all_gaps_produce_all_none() {
        let ys = [None, None];
        let out = moving_average(&xs(2), &ys, 2, &[1.0; 2], &options(true, 0.0)).unwrap();
        assert_series(&out, &[None, None]);
    }

    #[test]
    fn empty_series_is_empty() {
        let out = moving_average(&[], &[], 3, &[], &MovingAverageOptions::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = moving_average(&xs(2), &[Some(1.0)], 2, &[1.0], &MovingAverageOptions::default())
            .unwrap_err();
        assert!(matches!(err, PageError::Configuration(_)));
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = moving_average(&xs(1), &[Some(1.0)], 0, &[1.0], &MovingAverageOptions::default())
            .unwrap_err();
        assert!(matches!(err, PageError::Configuration(_)));
    }

    #[test]
    fn smooth_points_keeps_x_and_weight() {
        let points = vec![
            SeriesPoint { x: 2020.0, y: Some(4.0), weight: 2.0 },
            SeriesPoint { x: 2021.0, y: Some(8.0), weight: 2.0 },
        ];
        let smoothed = smooth_points(&points, 2, &options(true, 0.0)).unwrap();
        assert_eq!(smoothed[1].x, 2021.0);
        assert_eq!(smoothed[1].weight, 2.0);
        assert_eq!(smoothed[1].y, Some(6.0));
    }
}
