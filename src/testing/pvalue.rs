//! P-value calculation from test statistics

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Two-sided p-value of a t-statistic with `df` degrees of freedom
///
/// An infinite statistic gives 0; a `NaN` statistic or non-positive `df`
/// gives `NaN`.
pub fn calculate_pvalue_t(stat: f64, df: f64) -> f64 {
    if stat.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if stat.is_infinite() {
        return 0.0;
    }

    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => (2.0 * t_dist.cdf(-stat.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}

/// Upper-tail probability of a normal distribution
pub fn normal_upper_tail(x: f64, mean: f64, sd: f64) -> f64 {
    if !x.is_finite() || !(sd > 0.0) {
        return f64::NAN;
    }
    match Normal::new(mean, sd) {
        Ok(normal) => normal.sf(x),
        Err(_) => f64::NAN,
    }
}

/// Standard normal quantile
pub fn normal_quantile(p: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}
