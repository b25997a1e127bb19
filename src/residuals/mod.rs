//! Per-gene covariate regression
//!
//! Each gene is fitted independently against the shared design using only
//! the samples where that gene is present. Missing samples stay missing in
//! the output at the same positions.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::ExpressionMatrix;
use crate::error::{PipelineError, Result};
use crate::glm::{DesignMatrix, QrFactorization};
use crate::testing::shapiro_wilk;

/// Options for residualisation
#[derive(Debug, Clone, Default)]
pub struct ResidualParams {
    /// Score each gene's residuals with the Shapiro-Wilk test
    pub normality_test: bool,
}

/// A gene whose result was replaced by missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneIssue {
    pub gene_id: String,
    pub reason: String,
}

impl From<PipelineError> for GeneIssue {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::DegenerateGene { gene_id, reason } => GeneIssue { gene_id, reason },
            other => GeneIssue {
                gene_id: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

/// Output of [`residualize_matrix`]
#[derive(Debug, Clone)]
pub struct ResidualOutput {
    /// Residuals with the input's shape and labels
    pub residuals: ExpressionMatrix,
    /// Shapiro-Wilk p-value per gene (`NaN` when the test is undefined)
    pub normality: Option<Vec<f64>>,
    /// Genes that could not be fitted
    pub issues: Vec<GeneIssue>,
}

impl ResidualOutput {
    /// Fraction of tested genes with p <= `alpha`
    pub fn non_normal_fraction(&self, alpha: f64) -> Option<f64> {
        let pvals = self.normality.as_ref()?;
        let tested: Vec<f64> = pvals.iter().copied().filter(|p| p.is_finite()).collect();
        if tested.is_empty() {
            return None;
        }
        Some(tested.iter().filter(|&&p| p <= alpha).count() as f64 / tested.len() as f64)
    }
}

/// Residuals of one gene against a design that already includes an intercept
///
/// `full` may hold the factorization of the complete design; it is reused
/// when the gene has no missing values.
fn fit_residuals(
    gene_id: &str,
    y: ArrayView1<'_, f64>,
    x: &Array2<f64>,
    full: Option<&QrFactorization>,
) -> Result<Vec<f64>> {
    let n = y.len();
    let n_covariates = x.ncols().saturating_sub(1);
    let present: Vec<usize> = (0..n).filter(|&i| y[i].is_finite()).collect();

    if present.len() < n_covariates + 2 {
        return Err(PipelineError::DegenerateGene {
            gene_id: gene_id.to_string(),
            reason: format!(
                "{} present samples for {} covariates (need at least {})",
                present.len(),
                n_covariates,
                n_covariates + 2
            ),
        });
    }

    let mut out = vec![f64::NAN; n];
    if present.len() == n {
        let owned;
        let qr = match full {
            Some(qr) => qr,
            None => {
                owned = QrFactorization::new(x.view())?;
                &owned
            }
        };
        out = qr.residuals(x.view(), y)?.to_vec();
    } else {
        let x_sub = x.select(Axis(0), &present);
        let y_sub: Array1<f64> = present.iter().map(|&i| y[i]).collect();
        let resid = QrFactorization::new(x_sub.view())?.residuals(x_sub.view(), y_sub.view())?;
        for (&i, r) in present.iter().zip(resid.iter()) {
            out[i] = *r;
        }
    }
    Ok(out)
}

/// Residuals of a single gene column against the covariates
///
/// The output has the length of `y`; missing entries of `y` stay missing.
pub fn residualize_gene(gene_id: &str, y: ArrayView1<'_, f64>, design: &DesignMatrix) -> Result<Vec<f64>> {
    if y.len() != design.n_samples() {
        return Err(PipelineError::DimensionMismatch {
            expected: format!("{} samples", design.n_samples()),
            got: format!("{} samples", y.len()),
        });
    }
    fit_residuals(gene_id, y, &design.with_intercept(), None)
}

/// Residualise every gene of an aligned expression matrix
///
/// Genes are fitted in parallel. A gene with too few present samples gets
/// an all-missing column and a [`GeneIssue`]; it never aborts the matrix.
pub fn residualize_matrix(
    expression: &ExpressionMatrix,
    design: &DesignMatrix,
    params: &ResidualParams,
) -> Result<ResidualOutput> {
    if expression.sample_ids() != design.sample_ids() {
        return Err(PipelineError::Alignment {
            reason: "design rows are not aligned with expression samples".to_string(),
        });
    }

    let x = design.with_intercept();
    let full_qr = QrFactorization::new(x.view())?;
    if full_qr.rank() < x.ncols() {
        log::debug!(
            "Design has rank {} with {} columns; aliased columns {:?}",
            full_qr.rank(),
            x.ncols(),
            full_qr.aliased_columns()
        );
    }

    let n_samples = expression.n_samples();
    let gene_ids = expression.gene_ids();

    let results: Vec<(Vec<f64>, Option<GeneIssue>)> = (0..expression.n_genes())
        .into_par_iter()
        .map(|j| {
            let y = expression.gene_values(j);
            match fit_residuals(&gene_ids[j], y, &x, Some(&full_qr)) {
                Ok(col) => (col, None),
                Err(e) => {
                    let mut issue = GeneIssue::from(e);
                    if issue.gene_id.is_empty() {
                        issue.gene_id = gene_ids[j].clone();
                    }
                    log::debug!("Gene {} not fitted: {}", issue.gene_id, issue.reason);
                    (vec![f64::NAN; n_samples], Some(issue))
                }
            }
        })
        .collect();

    let (columns, issues): (Vec<Vec<f64>>, Vec<Option<GeneIssue>>) = results.into_iter().unzip();
    let issues: Vec<GeneIssue> = issues.into_iter().flatten().collect();

    let normality = if params.normality_test {
        let pvals: Vec<f64> = columns
            .par_iter()
            .map(|col| shapiro_wilk(col).map_or(f64::NAN, |r| r.pvalue))
            .collect();
        Some(pvals)
    } else {
        None
    };

    if !issues.is_empty() {
        log::warn!(
            "{} of {} genes had too few present samples and were left missing",
            issues.len(),
            expression.n_genes()
        );
    }

    let output = ResidualOutput {
        residuals: expression.with_columns(&columns)?,
        normality,
        issues,
    };

    log::info!(
        "Residualized {} genes against {} covariates",
        expression.n_genes(),
        design.n_covariates()
    );
    if let Some(frac) = output.non_normal_fraction(0.05) {
        log::info!(
            "{:.1}% of genes have non-normal residuals (Shapiro-Wilk p <= 0.05)",
            frac * 100.0
        );
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CovariateTable;
    use crate::glm::{encode_covariates, EncoderParams};
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    fn design(n: usize) -> DesignMatrix {
        let samples = ids("s", n);
        let mut t = CovariateTable::new(samples);
        t.add_column("age", (0..n).map(|i| format!("{}", 20 + 3 * i)).collect())
            .unwrap();
        t.add_column("rin", (0..n).map(|i| format!("{}", (i * 7 % 5) as f64 + 0.5)).collect())
            .unwrap();
        encode_covariates(&t, &EncoderParams::default()).unwrap()
    }

    fn expression(n: usize) -> ExpressionMatrix {
        let mut values = Array2::zeros((n, 3));
        for i in 0..n {
            let f = i as f64;
            values[[i, 0]] = 1.0 + 0.5 * f + (f * 1.3).sin();
            values[[i, 1]] = 10.0 - f + (f * 0.7).cos();
            values[[i, 2]] = (f * f) % 7.0;
        }
        values[[2, 1]] = f64::NAN;
        values[[7, 1]] = f64::NAN;
        ExpressionMatrix::new(values, ids("s", n), vec!["g1".into(), "g2".into(), "g3".into()]).unwrap()
    }

    #[test]
    fn test_missing_positions_preserved_and_residuals_sum_to_zero() {
        let out = residualize_matrix(&expression(10), &design(10), &ResidualParams::default()).unwrap();
        let g2 = out.residuals.gene_values(1);
        assert_eq!(g2.len(), 10);
        let missing: Vec<usize> = (0..10).filter(|&i| g2[i].is_nan()).collect();
        assert_eq!(missing, vec![2, 7]);
        let sum: f64 = g2.iter().filter(|v| v.is_finite()).sum();
        assert!(sum.abs() < 1e-9, "sum = {}", sum);
        assert!(out.issues.is_empty());
    }

    #[test]
    fn test_residuals_orthogonal_to_covariates() {
        let d = design(10);
        let out = residualize_matrix(&expression(10), &d, &ResidualParams::default()).unwrap();
        let r = out.residuals.gene_values(0);
        let age = d.values().column(0).to_owned();
        let dot: f64 = r.iter().zip(age.iter()).map(|(a, b)| a * b).sum();
        assert!(dot.abs() < 1e-8, "dot = {}", dot);
    }

    #[test]
    fn test_gene_matches_single_gene_function() {
        let d = design(10);
        let expr = expression(10);
        let out = residualize_matrix(&expr, &d, &ResidualParams::default()).unwrap();
        let single = residualize_gene("g2", expr.gene_values(1), &d).unwrap();
        for (a, b) in single.iter().zip(out.residuals.gene_values(1).iter()) {
            assert!((a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_degenerate_gene_reported_not_fatal() {
        let mut expr = expression(10);
        let mut values = expr.values().to_owned();
        for i in 0..7 {
            values[[i, 2]] = f64::NAN;
        }
        expr = ExpressionMatrix::new(values, ids("s", 10), vec!["g1".into(), "g2".into(), "g3".into()]).unwrap();

        let out = residualize_matrix(&expr, &design(10), &ResidualParams::default()).unwrap();
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].gene_id, "g3");
        assert!(out.residuals.gene_values(2).iter().all(|v| v.is_nan()));
        assert!(out.residuals.gene_values(0).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_exact_linear_gene_has_zero_residuals() {
        let d = design(6);
        let age = d.values().column(0).to_owned();
        let y: Array1<f64> = age.mapv(|a| 2.0 * a + 1.0);
        let r = residualize_gene("lin", y.view(), &d).unwrap();
        assert!(r.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_normality_scores_reported() {
        let params = ResidualParams { normality_test: true };
        let out = residualize_matrix(&expression(10), &design(10), &params).unwrap();
        let pvals = out.normality.as_ref().unwrap();
        assert_eq!(pvals.len(), 3);
        assert!(pvals.iter().all(|p| p.is_nan() || (0.0..=1.0).contains(p)));
        assert!(out.non_normal_fraction(0.05).is_some());
    }

    #[test]
    fn test_misaligned_design_rejected() {
        let expr = ExpressionMatrix::new(array![[1.0], [2.0], [3.0]], ids("x", 3), vec!["g".into()]).unwrap();
        let err = residualize_matrix(&expr, &design(3), &ResidualParams::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Alignment { .. }));
    }
}
