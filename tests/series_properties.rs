use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pagekit::{
    MovingAverageOptions, calc_mean, calc_median, calc_mode, calc_stddev, moving_average, quantile,
};

fn random_sample(rng: &mut StdRng, len: usize) -> Vec<f64> {
    (0..len).map(|_| rng.random_range(-500.0..500.0)).collect()
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

#[test]
fn median_matches_sorted_middle() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let len = rng.random_range(1..40);
        let sample = random_sample(&mut rng, len);
        let ordered = sorted(&sample);
        let expected = if len % 2 == 1 {
            ordered[len / 2]
        } else {
            (ordered[len / 2 - 1] + ordered[len / 2]) / 2.0
        };
        assert_eq!(calc_median(&sample), expected);
    }
}

#[test]
fn quantiles_are_bounded_and_monotone() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..200 {
        let len = rng.random_range(1..40);
        let sample = random_sample(&mut rng, len);
        let ordered = sorted(&sample);
        assert_eq!(quantile(&sample, 0.0), ordered[0]);
        assert_eq!(quantile(&sample, 1.0), ordered[len - 1]);

        let mut previous = f64::NEG_INFINITY;
        for step in 0..=20 {
            let q = quantile(&sample, f64::from(step) / 20.0);
            assert!(q >= previous - 1e-9, "q={q} previous={previous}");
            previous = q;
        }
    }
}

#[test]
fn location_estimates_stay_within_range() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        let len = rng.random_range(1..40);
        let sample = random_sample(&mut rng, len);
        let ordered = sorted(&sample);
        let (min, max) = (ordered[0], ordered[len - 1]);
        for estimate in [calc_mean(&sample), calc_mode(&sample, 0.2)] {
            assert!(estimate >= min - 1e-9 && estimate <= max + 1e-9);
        }
    }
}

#[test]
fn stddev_ignores_shifts() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..100 {
        let len = rng.random_range(2..30);
        let sample = random_sample(&mut rng, len);
        let shift = rng.random_range(-1000.0..1000.0);
        let shifted: Vec<f64> = sample.iter().map(|x| x + shift).collect();
        let (a, b) = (calc_stddev(&sample), calc_stddev(&shifted));
        assert!(a >= 0.0);
        assert!((a - b).abs() < 1e-6, "{a} vs {b}");
    }
}

#[test]
fn unit_window_reproduces_observations() {
    let mut rng = StdRng::seed_from_u64(8);
    let options = MovingAverageOptions {
        start_after_last_null: true,
        min_start_threshold: 0.0,
    };
    for _ in 0..100 {
        let len = rng.random_range(1..30);
        let ys: Vec<Option<f64>> = random_sample(&mut rng, len).into_iter().map(Some).collect();
        let xs: Vec<f64> = (0..len).map(|idx| idx as f64).collect();
        let weights = vec![1.0; len];
        let smoothed = moving_average(&xs, &ys, 1, &weights, &options).unwrap();
        assert_eq!(smoothed, ys);
    }
}

#[test]
fn smoothed_values_are_bounded_by_observations() {
    let mut rng = StdRng::seed_from_u64(21);
    let options = MovingAverageOptions {
        start_after_last_null: false,
        min_start_threshold: 1.0,
    };
    for _ in 0..200 {
        let len = rng.random_range(1..40);
        let ys: Vec<Option<f64>> = (0..len)
            .map(|_| {
                if rng.random_bool(0.2) {
                    None
                } else {
                    Some(rng.random_range(-50.0..50.0))
                }
            })
            .collect();
        let xs: Vec<f64> = (0..len).map(|idx| idx as f64).collect();
        let weights: Vec<f64> = (0..len).map(|_| rng.random_range(0.5..3.0)).collect();
        let window = rng.random_range(1..6);

        let smoothed = moving_average(&xs, &ys, window, &weights, &options).unwrap();
        assert_eq!(smoothed.len(), len);

        let observed: Vec<f64> = ys.iter().flatten().copied().collect();
        let Some(last_value) = ys.iter().rposition(Option::is_some) else {
            assert!(smoothed.iter().all(Option::is_none));
            continue;
        };
        let min = observed.iter().copied().fold(f64::INFINITY, f64::min);
        let max = observed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for (idx, value) in smoothed.iter().enumerate() {
            if idx > last_value {
                assert_eq!(*value, None);
            } else if let Some(value) = value {
                assert!(*value >= min - 1e-9 && *value <= max + 1e-9);
            }
        }
    }
}
