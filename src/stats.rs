//! Statistical utility functions shared across modules
//!
//! Quantiles, ranks and moments over slices that may contain missing
//! (`NaN`) values. Callers decide whether missing values are filtered first;
//! functions here document what they assume.

/// Values of `x` that are not missing
pub fn finite_values(x: &[f64]) -> Vec<f64> {
    x.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Arithmetic mean of the finite values, `NaN` if there are none
pub fn nan_mean(x: &[f64]) -> f64 {
    let (sum, n) = x
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Population standard deviation (ddof = 0) of the finite values
pub fn nan_std(x: &[f64]) -> f64 {
    let mean = nan_mean(x);
    if !mean.is_finite() {
        return f64::NAN;
    }
    let (ss, n) = x
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), &v| (s + (v - mean) * (v - mean), n + 1));
    (ss / n as f64).sqrt()
}

/// Quantile of already-sorted data by linear interpolation between order
/// statistics (position `(n - 1) * prob`).
///
/// `sorted` must be non-empty, ascending and free of `NaN`.
pub fn quantile_sorted(sorted: &[f64], prob: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = (n - 1) as f64 * prob.clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// First and third quartiles of the finite values
///
/// Returns `None` when fewer than two finite values exist, since the spread
/// is then undefined.
pub fn quartiles(x: &[f64]) -> Option<(f64, f64)> {
    let mut clean = finite_values(x);
    if clean.len() < 2 {
        return None;
    }
    clean.sort_by(f64::total_cmp);
    Some((quantile_sorted(&clean, 0.25), quantile_sorted(&clean, 0.75)))
}

/// Average ranks (1-based); ties share the mean of their positions
///
/// `data` must be free of `NaN`.
pub fn average_ranks(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| data[a].total_cmp(&data[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && data[order[j]] == data[order[i]] {
            j += 1;
        }
        // positions i..j (0-based) share rank ((i+1) + j) / 2
        let rank = (i + 1 + j) as f64 / 2.0;
        for &k in &order[i..j] {
            ranks[k] = rank;
        }
        i = j;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_mean_skips_missing() {
        assert_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean(&[f64::NAN]).is_nan());
    }

    #[test]
    fn test_nan_std_population() {
        let sd = nan_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile_sorted(&x, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile_sorted(&x, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile_sorted(&x, 0.75) - 3.25).abs() < 1e-12);
        assert_eq!(quantile_sorted(&x, 0.0), 1.0);
        assert_eq!(quantile_sorted(&x, 1.0), 4.0);
    }

    #[test]
    fn test_quartiles_ignore_missing() {
        let (q1, q3) = quartiles(&[f64::NAN, 4.0, 1.0, 3.0, 2.0, f64::NAN]).unwrap();
        assert!((q1 - 1.75).abs() < 1e-12);
        assert!((q3 - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_quartiles_undefined_for_single_value() {
        assert!(quartiles(&[f64::NAN, 5.0]).is_none());
        assert!(quartiles(&[]).is_none());
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
        assert_eq!(average_ranks(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
    }
}
