use crate::error::{AKIError, AKIResult};

/// Baseline creatinine as the given percentile of the full history.
///
/// Uses linear interpolation between the two closest ranks, so the result is
/// independent of reading order.
pub fn baseline_percentile(values: &[f64], percentile: f64) -> AKIResult<f64> {
    if values.is_empty() {
        return Err(AKIError::InvalidInput(
            "Cannot estimate baseline from an empty series".to_string()
        ));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(AKIError::InvalidInput(
            format!("Series contains non-finite value {}", bad)
        ));
    }
    if !percentile.is_finite() || !(0.0..=100.0).contains(&percentile) {
        return Err(AKIError::InvalidConfig(
            format!("Percentile must be within [0, 100], got {}", percentile)
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = percentile / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Per-step rate of change along the ordered series.
///
/// Order indices are dense, so each step is a plain difference. The trailing
/// slope repeats the one before it (zero for a single reading).
pub fn compute_slopes(values: &[f64]) -> Vec<f64> {
    let mut slopes: Vec<f64> = values.windows(2)
        .map(|w| w[1] - w[0])
        .collect();

    match slopes.last().copied() {
        Some(last) => slopes.push(last),
        None if !values.is_empty() => slopes.push(0.0),
        None => {}
    }

    slopes
}

/// Marks local maxima: a strictly rising slope followed by a flat or falling
/// one. The first reading is a peak when the trend after it is not rising.
pub fn detect_peaks(slopes: &[f64]) -> Vec<bool> {
    let Some(&first) = slopes.first() else {
        return Vec::new();
    };

    let mut peaks = Vec::with_capacity(slopes.len());
    peaks.push(first <= 0.0);
    for w in slopes.windows(2) {
        peaks.push(w[0] > 0.0 && w[1] <= 0.0);
    }

    peaks
}

/// AKI is flagged only at a peak that exceeds `threshold_ratio * baseline`.
pub fn flag_aki(values: &[f64], peaks: &[bool], baseline: f64, threshold_ratio: f64) -> Vec<bool> {
    let limit = baseline * threshold_ratio;
    values.iter()
        .zip(peaks)
        .map(|(&value, &peak)| peak && value > limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_rising_then_falling_series() {
        let values = [1.0, 1.0, 1.0, 2.0, 1.5];

        let baseline = baseline_percentile(&values, 25.0).unwrap();
        assert_relative_eq!(baseline, 1.0);

        let slopes = compute_slopes(&values);
        assert_eq!(slopes, vec![0.0, 0.0, 1.0, -0.5, -0.5]);

        let peaks = detect_peaks(&slopes);
        assert_eq!(peaks, vec![true, false, false, true, false]);

        let aki = flag_aki(&values, &peaks, baseline, 1.5);
        assert_eq!(aki, vec![false, false, false, true, false]);
    }

    #[test]
    fn test_single_reading() {
        let values = [0.9];
        let baseline = baseline_percentile(&values, 25.0).unwrap();
        assert_relative_eq!(baseline, 0.9);

        let slopes = compute_slopes(&values);
        assert_eq!(slopes, vec![0.0]);

        let peaks = detect_peaks(&slopes);
        assert_eq!(peaks, vec![true]);

        assert_eq!(flag_aki(&values, &peaks, baseline, 1.5), vec![false]);
    }

    #[test]
    fn test_empty_series_is_invalid() {
        assert!(matches!(baseline_percentile(&[], 25.0), Err(AKIError::InvalidInput(_))));
        assert!(compute_slopes(&[]).is_empty());
        assert!(detect_peaks(&[]).is_empty());
    }

    #[test]
    fn test_non_finite_value_is_invalid() {
        assert!(matches!(
            baseline_percentile(&[1.0, f64::NAN], 25.0),
            Err(AKIError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(baseline_percentile(&values, 50.0).unwrap(), 2.5);
        assert_relative_eq!(baseline_percentile(&values, 25.0).unwrap(), 1.75);
        assert_relative_eq!(baseline_percentile(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(baseline_percentile(&values, 100.0).unwrap(), 4.0);
        assert!(baseline_percentile(&values, 101.0).is_err());
    }

    #[test]
    fn test_plateau_after_rise_peaks_once() {
        let slopes = compute_slopes(&[1.0, 2.0, 2.0, 2.0, 1.0]);
        assert_eq!(detect_peaks(&slopes), vec![false, true, false, false, false]);
    }

    #[test]
    fn test_rising_tail_is_not_a_peak() {
        // Last slope copies the rising trend, so the final reading never crests.
        let slopes = compute_slopes(&[1.0, 2.0, 3.0]);
        assert_eq!(slopes, vec![1.0, 1.0, 1.0]);
        assert_eq!(detect_peaks(&slopes), vec![false, false, false]);
    }

    #[test]
    fn test_elevated_non_peak_is_not_aki() {
        let values = [1.0, 3.0, 4.0, 5.0];
        let peaks = detect_peaks(&compute_slopes(&values));
        assert_eq!(flag_aki(&values, &peaks, 1.0, 1.5), vec![false; 4]);
    }

    fn series() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0.1f64..10.0, 1..40)
    }

    proptest! {
        #[test]
        fn prop_slopes_align_with_series(values in series()) {
            let slopes = compute_slopes(&values);
            let n = values.len();
            prop_assert_eq!(slopes.len(), n);
            if n == 1 {
                prop_assert_eq!(slopes[0], 0.0);
            } else {
                prop_assert_eq!(slopes[n - 1], slopes[n - 2]);
            }
        }

        #[test]
        fn prop_peaks_follow_slope_rule(values in series()) {
            let slopes = compute_slopes(&values);
            let peaks = detect_peaks(&slopes);
            prop_assert_eq!(peaks.len(), values.len());
            for i in 0..peaks.len() {
                if peaks[i] {
                    prop_assert!(slopes[i] <= 0.0);
                    if i > 0 {
                        prop_assert!(slopes[i - 1] > 0.0);
                    }
                }
            }
        }

        #[test]
        fn prop_aki_implies_elevated_peak(values in series(), ratio in 1.0f64..3.0) {
            let baseline = baseline_percentile(&values, 25.0).unwrap();
            let peaks = detect_peaks(&compute_slopes(&values));
            let aki = flag_aki(&values, &peaks, baseline, ratio);
            for i in 0..aki.len() {
                if aki[i] {
                    prop_assert!(peaks[i]);
                    prop_assert!(values[i] > ratio * baseline);
                }
            }
        }

        #[test]
        fn prop_baseline_ignores_order(values in series(), percentile in 0.0f64..=100.0) {
            let mut reversed = values.clone();
            reversed.reverse();
            let mut rotated = values.clone();
            rotated.rotate_left(values.len() / 2);

            let expected = baseline_percentile(&values, percentile).unwrap();
            prop_assert_eq!(baseline_percentile(&reversed, percentile).unwrap(), expected);
            prop_assert_eq!(baseline_percentile(&rotated, percentile).unwrap(), expected);
        }
    }
}
