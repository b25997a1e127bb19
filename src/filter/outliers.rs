//! Interquartile-range outlier masking

use rayon::prelude::*;

use crate::data::ExpressionMatrix;
use crate::error::{PipelineError, Result};
use crate::stats::quartiles;

/// Parameters for outlier masking
#[derive(Debug, Clone)]
pub struct MaskParams {
    /// Width of the fences in IQR units
    pub iqr_multiplier: f64,
    /// Non-numeric annotation labels removed before masking
    pub drop_labels: Vec<String>,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            iqr_multiplier: 3.0,
            drop_labels: vec!["brain_region".to_string()],
        }
    }
}

/// Fences `[Q1 - k*IQR, Q3 + k*IQR]` over the present values
///
/// `None` when fewer than two values are present.
pub fn iqr_bounds(column: &[f64], multiplier: f64) -> Option<(f64, f64)> {
    let (q1, q3) = quartiles(column)?;
    let iqr = q3 - q1;
    Some((q1 - multiplier * iqr, q3 + multiplier * iqr))
}

/// Mask values strictly outside `[lower, upper]`; returns the number masked
pub fn mask_with_bounds(column: &mut [f64], lower: f64, upper: f64) -> usize {
    let mut n = 0;
    for v in column.iter_mut() {
        if *v > upper || *v < lower {
            *v = f64::NAN;
            n += 1;
        }
    }
    n
}

/// Masked copy of one gene column and the number of newly masked values
///
/// A column with fewer than two present values is returned unchanged.
pub fn mask_outliers(column: &[f64], multiplier: f64) -> (Vec<f64>, usize) {
    let mut out = column.to_vec();
    let n = match iqr_bounds(column, multiplier) {
        Some((lower, upper)) => mask_with_bounds(&mut out, lower, upper),
        None => 0,
    };
    (out, n)
}

/// Result of [`mask_matrix`]
#[derive(Debug, Clone)]
pub struct MaskOutput {
    pub masked: ExpressionMatrix,
    /// Cells newly set to missing
    pub n_masked: usize,
    /// Genes with too few present values to define quartiles
    pub skipped_genes: Vec<String>,
}

/// Mask outliers in every gene column independently
pub fn mask_matrix(expression: &ExpressionMatrix, params: &MaskParams) -> Result<MaskOutput> {
    if !(params.iqr_multiplier >= 0.0) {
        return Err(PipelineError::InvalidInput {
            reason: format!("IQR multiplier must be non-negative, got {}", params.iqr_multiplier),
        });
    }

    let results: Vec<(Vec<f64>, usize, bool)> = (0..expression.n_genes())
        .into_par_iter()
        .map(|j| {
            let column = expression.gene_values(j).to_vec();
            let defined = quartiles(&column).is_some();
            let (masked, n) = mask_outliers(&column, params.iqr_multiplier);
            (masked, n, defined)
        })
        .collect();

    let mut columns = Vec::with_capacity(results.len());
    let mut n_masked = 0;
    let mut skipped_genes = Vec::new();
    for (j, (col, n, defined)) in results.into_iter().enumerate() {
        if !defined {
            skipped_genes.push(expression.gene_ids()[j].clone());
        }
        n_masked += n;
        columns.push(col);
    }

    if !skipped_genes.is_empty() {
        log::debug!("{} genes have fewer than two values; left unmasked", skipped_genes.len());
    }
    log::info!(
        "Masked {} outlier values across {} genes (total missing: {})",
        n_masked,
        expression.n_genes(),
        expression.n_missing() + n_masked
    );

    Ok(MaskOutput {
        masked: expression.with_columns(&columns)?,
        n_masked,
        skipped_genes,
    })
}
