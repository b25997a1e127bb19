//! Pairwise-complete Pearson and Spearman correlation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;
use crate::stats::average_ranks;
use crate::testing::calculate_pvalue_t;

/// Correlation coefficient to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationMethod::Pearson => write!(f, "pearson"),
            CorrelationMethod::Spearman => write!(f, "spearman"),
        }
    }
}

impl FromStr for CorrelationMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pearson" => Ok(CorrelationMethod::Pearson),
            "spearman" => Ok(CorrelationMethod::Spearman),
            other => Err(PipelineError::InvalidInput {
                reason: format!("unknown correlation method '{}' (expected pearson or spearman)", other),
            }),
        }
    }
}

/// Coefficient, two-sided p-value and number of pairs used
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairCorrelation {
    pub r: f64,
    pub pvalue: f64,
    pub n: usize,
}

impl PairCorrelation {
    fn undefined(n: usize) -> Self {
        Self {
            r: f64::NAN,
            pvalue: f64::NAN,
            n,
        }
    }
}

/// Pearson coefficient of two complete, equal-length slices
///
/// `NaN` for fewer than two values or a constant side.
pub fn pearson_r(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 || y.len() != n {
        return f64::NAN;
    }
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

/// Two-sided p-value of a correlation coefficient from `n` pairs
///
/// Student t with `n - 2` degrees of freedom on `r * sqrt((n - 2) / (1 - r^2))`.
pub fn correlation_pvalue(r: f64, n: usize) -> f64 {
    if r.is_nan() || n < 2 {
        return f64::NAN;
    }
    if n == 2 {
        return 1.0;
    }
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / ((1.0 - r) * (1.0 + r))).sqrt();
    calculate_pvalue_t(t, df)
}

fn finish(r: f64, n: usize) -> PairCorrelation {
    if r.is_nan() {
        return PairCorrelation::undefined(n);
    }
    PairCorrelation {
        r,
        pvalue: correlation_pvalue(r, n),
        n,
    }
}

/// Correlation of two complete columns that are already in the method's
/// scale (values for Pearson, ranks for Spearman)
pub(crate) fn correlate_prepared(x: &[f64], y: &[f64]) -> PairCorrelation {
    finish(pearson_r(x, y), x.len())
}

/// Correlate `x` and `y` over the samples where both are present
///
/// Spearman ranks are computed on the complete subset of this pair.
pub fn pairwise_complete(x: &[f64], y: &[f64], method: CorrelationMethod) -> PairCorrelation {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip();

    let n = xs.len();
    if n < 2 {
        return PairCorrelation::undefined(n);
    }

    let r = match method {
        CorrelationMethod::Pearson => pearson_r(&xs, &ys),
        CorrelationMethod::Spearman => pearson_r(&average_ranks(&xs), &average_ranks(&ys)),
    };
    finish(r, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_and_display() {
        assert_eq!("Spearman".parse::<CorrelationMethod>().unwrap(), CorrelationMethod::Spearman);
        assert_eq!(CorrelationMethod::Pearson.to_string(), "pearson");
        assert!("kendall".parse::<CorrelationMethod>().is_err());
    }

    #[test]
    fn test_identical_columns() {
        let x = [1.0, 3.0, 2.0, 5.0, 4.0];
        for method in [CorrelationMethod::Pearson, CorrelationMethod::Spearman] {
            let c = pairwise_complete(&x, &x, method);
            assert!((c.r - 1.0).abs() < 1e-12);
            assert!(c.pvalue < 1e-10);
        }
    }

    #[test]
    fn test_pearson_known_value() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        let c = pairwise_complete(&x, &y, CorrelationMethod::Pearson);
        assert!((c.r - 0.8).abs() < 1e-12);
        // t = 0.8 * sqrt(3 / 0.36) = 2.3094, df = 3
        assert!((c.pvalue - 0.1041).abs() < 1e-3, "p = {}", c.pvalue);
    }

    #[test]
    fn test_missing_values_dropped_pairwise() {
        let x = [1.0, f64::NAN, 3.0, 4.0, 5.0, 6.0];
        let y = [2.0, 9.0, 1.0, f64::NAN, 7.0, 8.0];
        let c = pairwise_complete(&x, &y, CorrelationMethod::Pearson);
        let expected = pearson_r(&[1.0, 3.0, 5.0, 6.0], &[2.0, 1.0, 7.0, 8.0]);
        assert_eq!(c.n, 4);
        assert!((c.r - expected).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_reranks_complete_subset() {
        let x = [10.0, 20.0, f64::NAN, 40.0, 30.0];
        let y = [1.0, 2.0, 100.0, 3.0, 4.0];
        let c = pairwise_complete(&x, &y, CorrelationMethod::Spearman);
        // ranks x: 1 2 4 3, ranks y: 1 2 3 4 -> 1 - 6*2 / (4*15)
        assert_eq!(c.n, 4);
        assert!((c.r - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_pairs_are_missing() {
        let c = pairwise_complete(&[1.0, f64::NAN], &[f64::NAN, 2.0], CorrelationMethod::Pearson);
        assert!(c.r.is_nan() && c.pvalue.is_nan());

        let c = pairwise_complete(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0], CorrelationMethod::Spearman);
        assert!(c.r.is_nan() && c.pvalue.is_nan());
    }

    #[test]
    fn test_two_pairs_have_unit_pvalue() {
        let c = pairwise_complete(&[1.0, 2.0], &[3.0, 5.0], CorrelationMethod::Pearson);
        assert!((c.r - 1.0).abs() < 1e-12);
        assert_eq!(c.pvalue, 1.0);
    }
}
