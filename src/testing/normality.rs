//! Shapiro-Wilk normality test
//!
//! Royston's approximation (Applied Statistics algorithm AS R94), valid for
//! 3 <= n <= 5000. Used only as a diagnostic on regression residuals.

use super::pvalue::{normal_quantile, normal_upper_tail};

const SMALL: f64 = 1e-19;

const G: [f64; 2] = [-2.273, 0.459];
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];

/// Result of a Shapiro-Wilk test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapiroWilk {
    /// W statistic in (0, 1]
    pub w: f64,
    /// p-value for the null hypothesis of normality
    pub pvalue: f64,
}

/// Horner-style polynomial used by the AS R94 coefficients
fn poly(cc: &[f64], x: f64) -> f64 {
    let nord = cc.len();
    let mut ret = cc[0];
    if nord > 1 {
        let mut p = x * cc[nord - 1];
        for j in (1..nord - 1).rev() {
            p = (p + cc[j]) * x;
        }
        ret += p;
    }
    ret
}

/// Run the Shapiro-Wilk test on the finite values of `data`
///
/// Returns `None` when fewer than 3 or more than 5000 finite values exist, or
/// when all values are identical.
pub fn shapiro_wilk(data: &[f64]) -> Option<ShapiroWilk> {
    let mut x: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    let n = x.len();
    if !(3..=5000).contains(&n) {
        return None;
    }
    x.sort_by(f64::total_cmp);

    let range = x[n - 1] - x[0];
    if range < SMALL {
        return None;
    }

    let an = n as f64;
    let nn2 = n / 2;

    // a[0..nn2] are the antisymmetric weights applied to x[n-1-i] - x[i]
    let mut a = vec![0.0; nn2];
    if n == 3 {
        a[0] = std::f64::consts::FRAC_1_SQRT_2;
    } else {
        let an25 = an + 0.25;
        let m: Vec<f64> = (1..=nn2)
            .map(|i| normal_quantile((i as f64 - 0.375) / an25))
            .collect();
        let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
        let ssumm2 = summ2.sqrt();
        let rsn = 1.0 / an.sqrt();
        let a1 = poly(&C1, rsn) - m[0] / ssumm2;

        let (first, fac) = if n > 5 {
            let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
            let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
                / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
                .sqrt();
            a[1] = a2;
            (2, fac)
        } else {
            let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
            (1, fac)
        };
        a[0] = a1;
        for i in first..nn2 {
            a[i] = -m[i] / fac;
        }
    }

    // Scale by the range for numerical stability; W is scale invariant
    let scaled: Vec<f64> = x.iter().map(|v| v / range).collect();
    let mean = scaled.iter().sum::<f64>() / an;
    let ssq: f64 = scaled.iter().map(|v| (v - mean) * (v - mean)).sum();
    let num: f64 = (0..nn2).map(|i| a[i] * (scaled[n - 1 - i] - scaled[i])).sum();
    let w = (num * num / ssq).min(1.0);
    let w1 = 1.0 - w;

    let pvalue = if n == 3 {
        const PI6: f64 = 6.0 / std::f64::consts::PI;
        const STQR: f64 = std::f64::consts::FRAC_PI_3;
        (PI6 * (w.sqrt().asin() - STQR)).clamp(0.0, 1.0)
    } else if w1 <= 0.0 {
        1.0
    } else {
        let mut y = w1.ln();
        let xx = an.ln();
        let (m, s) = if n <= 11 {
            let gamma = poly(&G, an);
            if y >= gamma {
                return Some(ShapiroWilk { w, pvalue: 1e-99 });
            }
            y = -(gamma - y).ln();
            (poly(&C3, an), poly(&C4, an).exp())
        } else {
            (poly(&C5, xx), poly(&C6, xx).exp())
        };
        normal_upper_tail(y, m, s)
    };

    Some(ShapiroWilk { w, pvalue })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly_matches_direct_evaluation() {
        // c0 + c1 x + c2 x^2
        let v = poly(&[1.0, 2.0, 3.0], 2.0);
        assert!((v - 17.0).abs() < 1e-12);
        assert_eq!(poly(&[4.0], 10.0), 4.0);
    }

    #[test]
    fn test_three_equally_spaced_points() {
        let r = shapiro_wilk(&[1.0, 2.0, 3.0]).unwrap();
        assert!((r.w - 1.0).abs() < 1e-9);
        assert!((r.pvalue - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_symmetric_sample_looks_normal() {
        // Approximate normal scores for n = 20
        let x: Vec<f64> = (1..=20)
            .map(|i| normal_quantile((i as f64 - 0.375) / 20.25))
            .collect();
        let r = shapiro_wilk(&x).unwrap();
        assert!(r.w > 0.97, "W = {}", r.w);
        assert!(r.pvalue > 0.5, "p = {}", r.pvalue);
    }

    #[test]
    fn test_heavy_outlier_rejects_normality() {
        let mut x: Vec<f64> = (0..30).map(|i| (i % 5) as f64).collect();
        x.push(1000.0);
        let r = shapiro_wilk(&x).unwrap();
        assert!(r.pvalue < 1e-4, "p = {}", r.pvalue);
    }

    #[test]
    fn test_small_sample_skewed() {
        let r = shapiro_wilk(&[1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 50.0]).unwrap();
        assert!(r.pvalue < 0.01, "p = {}", r.pvalue);
        assert!(r.w > 0.0 && r.w < 1.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(shapiro_wilk(&[1.0, 2.0]).is_none());
        assert!(shapiro_wilk(&[3.0, 3.0, 3.0, 3.0]).is_none());
        assert!(shapiro_wilk(&[1.0, f64::NAN, 2.0]).is_none());
    }
}
