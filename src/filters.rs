/// Measurement channel cleanup
///
/// Missing values are `f64::NAN` throughout. Every filter returns a new
/// column the same length as its input.

/// Values outside `[min, max]` become missing.
pub fn band_pass(values: &[f64], min: f64, max: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if v < min || v > max { f64::NAN } else { v })
        .collect()
}

/// Values below `threshold` become missing.
pub fn below_threshold(values: &[f64], threshold: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if v < threshold { f64::NAN } else { v })
        .collect()
}

/// Trailing rolling mean. A point is missing until a full window of present
/// values ends on it.
pub fn rolling_mean(data: &[f64], window: usize) -> Vec<f64> {
    let mut result = Vec::with_capacity(data.len());
    if window == 0 {
        result.resize(data.len(), f64::NAN);
        return result;
    }

    for i in 0..data.len() {
        if i + 1 < window {
            result.push(f64::NAN);
            continue;
        }

        let slice = &data[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            result.push(f64::NAN);
        } else {
            result.push(slice.iter().sum::<f64>() / window as f64);
        }
    }

    result
}

/// Fractional change from the previous present value.
///
/// Gaps are padded with the last present value first, so only a leading gap
/// stays missing.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(values.len());
    let mut last: Option<f64> = None;

    for &v in values {
        let current = if v.is_nan() { last } else { Some(v) };
        let change = match (last, current) {
            (Some(prev), Some(cur)) => cur / prev - 1.0,
            _ => f64::NAN,
        };
        result.push(change);
        if current.is_some() {
            last = current;
        }
    }

    result
}

/// Linear-interpolated percentile over the non-missing values.
/// Returns `None` when every value is missing.
pub fn nan_percentile(values: &[f64], percentile: f64) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));

    let rank = (percentile / 100.0).clamp(0.0, 1.0) * (present.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;

    if lower == upper || frac == 0.0 {
        return Some(present[lower]);
    }
    Some(present[lower] + (present[upper] - present[lower]) * frac)
}

/// Mark values missing wherever `reference` falls outside its own
/// `[low, high]` percentile band.
pub fn percentile_band(values: &[f64], reference: &[f64], low: f64, high: f64) -> Vec<f64> {
    let (Some(floor), Some(ceiling)) = (nan_percentile(reference, low), nan_percentile(reference, high)) else {
        return values.to_vec();
    };

    values
        .iter()
        .zip(reference)
        .map(|(&v, &r)| if r < floor || r > ceiling { f64::NAN } else { v })
        .collect()
}

/// Forward linear interpolation by position.
///
/// Interior gaps are filled along the line between their neighbours, trailing
/// gaps repeat the last present value, leading gaps stay missing. With a
/// `limit`, only the first `limit` points of each gap are filled.
pub fn interpolate_linear(values: &[f64], limit: Option<usize>) -> Vec<f64> {
    let mut result = values.to_vec();
    let mut last_present: Option<usize> = None;
    let mut i = 0;

    while i < values.len() {
        if !values[i].is_nan() {
            last_present = Some(i);
            i += 1;
            continue;
        }

        let gap_start = i;
        while i < values.len() && values[i].is_nan() {
            i += 1;
        }
        let gap_end = i;

        let Some(left) = last_present else { continue };
        let fill_to = match limit {
            Some(limit) => gap_end.min(gap_start + limit),
            None => gap_end,
        };

        for (k, slot) in result.iter_mut().enumerate().take(fill_to).skip(gap_start) {
            *slot = if gap_end < values.len() {
                let t = (k - left) as f64 / (gap_end - left) as f64;
                values[left] + (values[gap_end] - values[left]) * t
            } else {
                values[left]
            };
        }
    }

    result
}

/// Round to `places` decimals, leaving missing values alone.
pub fn round_to(values: &[f64], places: i32) -> Vec<f64> {
    let scale = 10f64.powi(places);
    values.iter().map(|v| (v * scale).round() / scale).collect()
}

/// Profile numbers starting at 1, advancing whenever the key changes.
pub fn number_profiles<K: PartialEq>(keys: impl IntoIterator<Item = K>) -> Vec<usize> {
    let mut profiles = Vec::new();
    let mut previous: Option<K> = None;
    let mut current = 0;

    for key in keys {
        if previous.as_ref() != Some(&key) {
            current += 1;
        }
        profiles.push(current);
        previous = Some(key);
    }

    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAN: f64 = f64::NAN;

    fn assert_series(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "length");
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            if e.is_nan() {
                assert!(a.is_nan(), "index {i}: expected NaN, got {a}");
            } else {
                assert!((a - e).abs() < 1e-9, "index {i}: expected {e}, got {a}");
            }
        }
    }

    #[test]
    fn test_band_pass_is_inclusive() {
        let out = band_pass(&[-1.0, 0.0, 120.0, 250.0, 250.5, NAN], 0.0, 250.0);
        assert_series(&out, &[NAN, 0.0, 120.0, 250.0, NAN, NAN]);
    }

    #[test]
    fn test_below_threshold() {
        let out = below_threshold(&[0.5, 0.51, 0.52, 3.0], 0.51);
        assert_series(&out, &[NAN, 0.51, 0.52, 3.0]);
    }

    #[test]
    fn test_rolling_mean_needs_full_window() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_series(&out, &[NAN, NAN, 2.0, 3.0, 4.0]);

        let out = rolling_mean(&[1.0, NAN, 3.0, 4.0, 5.0, 6.0], 3);
        assert_series(&out, &[NAN, NAN, NAN, NAN, 4.0, 5.0]);
    }

    #[test]
    fn test_pct_change_pads_gaps() {
        let out = pct_change(&[NAN, 100.0, 110.0, NAN, 121.0]);
        assert_series(&out, &[NAN, NAN, 0.1, 0.0, 0.1]);
    }

    #[test]
    fn test_nan_percentile_linear() {
        let values = [NAN, 4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(nan_percentile(&values, 0.0), Some(1.0));
        assert_eq!(nan_percentile(&values, 50.0), Some(3.0));
        assert_eq!(nan_percentile(&values, 100.0), Some(5.0));
        assert!((nan_percentile(&values, 5.0).unwrap() - 1.2).abs() < 1e-12);
        assert!((nan_percentile(&values, 95.0).unwrap() - 4.8).abs() < 1e-12);
        assert_eq!(nan_percentile(&[NAN, NAN], 50.0), None);
    }

    #[test]
    fn test_percentile_band_marks_outliers() {
        let reference: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let values: Vec<f64> = (0..11).map(|i| 100.0 + i as f64).collect();
        let out = percentile_band(&values, &reference, 5.0, 95.0);
        // Band is 0.5..9.5.
        assert!(out[0].is_nan());
        assert!(out[10].is_nan());
        assert_eq!(out[1], 101.0);
        assert_eq!(out[9], 109.0);
    }

    #[test]
    fn test_interpolate_interior_trailing_and_leading() {
        let out = interpolate_linear(&[NAN, 1.0, NAN, NAN, 4.0, NAN, NAN], None);
        assert_series(&out, &[NAN, 1.0, 2.0, 3.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_interpolate_respects_limit() {
        let out = interpolate_linear(&[0.0, NAN, NAN, NAN, 4.0, NAN, NAN, NAN], Some(2));
        assert_series(&out, &[0.0, 1.0, 2.0, NAN, 4.0, 4.0, 4.0, NAN]);
    }

    #[test]
    fn test_round_to() {
        let out = round_to(&[21.46, 21.44, NAN], 1);
        assert_series(&out, &[21.5, 21.4, NAN]);
    }

    #[test]
    fn test_number_profiles() {
        assert_eq!(number_profiles([3, 3, 5, 5, 5, 9]), vec![1, 1, 2, 2, 2, 3]);
        assert!(number_profiles(Vec::<usize>::new()).is_empty());
    }
}
