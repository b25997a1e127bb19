//! Correlation and p-value matrices for one expression matrix

use ndarray::Array2;
use rayon::prelude::*;

use super::pairwise::{correlate_prepared, pairwise_complete, CorrelationMethod, PairCorrelation};
use super::panel::{RowPanel, ShuffleMode};
use crate::data::{ExpressionMatrix, IdNormalizer};
use crate::error::{PipelineError, Result};
use crate::stats::average_ranks;

/// Parameters for correlation matrix generation
#[derive(Debug, Clone)]
pub struct CorrelationParams {
    pub method: CorrelationMethod,
    pub panel: RowPanel,
    pub shuffle: ShuffleMode,
    /// Rule applied to gene labels (and panel ids) before matching
    pub gene_ids: IdNormalizer,
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self {
            method: CorrelationMethod::Pearson,
            panel: RowPanel::mitochondrial(),
            shuffle: ShuffleMode::Off,
            gene_ids: IdNormalizer::gene_version(),
        }
    }
}

/// Correlation and p-value matrices with shared labels
#[derive(Debug, Clone)]
pub struct CorrelationMatrixPair {
    pub row_ids: Vec<String>,
    pub col_ids: Vec<String>,
    pub corrs: Array2<f64>,
    pub pvals: Array2<f64>,
}

impl CorrelationMatrixPair {
    pub fn dim(&self) -> (usize, usize) {
        self.corrs.dim()
    }

    /// Cells left undefined (fewer than two pairs or a constant side)
    pub fn n_undefined(&self) -> usize {
        self.corrs.iter().filter(|v| v.is_nan()).count()
    }
}

/// Result of [`correlation_matrix`]
#[derive(Debug, Clone)]
pub struct CorrelationOutput {
    pub pair: CorrelationMatrixPair,
    /// Reference genes absent from the matrix
    pub unmatched_panel: Vec<String>,
}

/// A gene column ready for correlation
struct PreparedColumn {
    values: Vec<f64>,
    /// Set when the column has no missing values: the values (Pearson) or
    /// their ranks (Spearman)
    complete: Option<Vec<f64>>,
}

fn prepare_columns(expression: &ExpressionMatrix, method: CorrelationMethod) -> Vec<PreparedColumn> {
    (0..expression.n_genes())
        .into_par_iter()
        .map(|j| {
            let values = expression.gene_values(j).to_vec();
            let complete = if values.iter().all(|v| v.is_finite()) {
                Some(match method {
                    CorrelationMethod::Pearson => values.clone(),
                    CorrelationMethod::Spearman => average_ranks(&values),
                })
            } else {
                None
            };
            PreparedColumn { values, complete }
        })
        .collect()
}

fn correlate_columns(x: &PreparedColumn, y: &PreparedColumn, method: CorrelationMethod) -> PairCorrelation {
    match (&x.complete, &y.complete) {
        (Some(a), Some(b)) => correlate_prepared(a, b),
        _ => pairwise_complete(&x.values, &y.values, method),
    }
}

fn into_matrix(n_rows: usize, n_cols: usize, cells: Vec<f64>) -> Result<Array2<f64>> {
    Array2::from_shape_vec((n_rows, n_cols), cells).map_err(|e| PipelineError::DimensionMismatch {
        expected: format!("{} x {} cells", n_rows, n_cols),
        got: e.to_string(),
    })
}

/// Correlate the row panel against every gene of `expression`
///
/// Gene labels are optionally shuffled, then normalised by
/// `params.gene_ids`. Reference genes missing from the matrix are reported
/// and skipped; a `Schema` error is returned when none match.
pub fn correlation_matrix(expression: &ExpressionMatrix, params: &CorrelationParams) -> Result<CorrelationOutput> {
    let mut labels = expression.gene_ids().to_vec();
    if params.shuffle.apply(&mut labels) {
        log::warn!("Gene labels were randomly shuffled; output is a negative control");
    }
    let labels = params.gene_ids.normalize_all(&labels);
    let expression = expression.clone().with_gene_ids(labels)?;

    let mut unmatched_panel = Vec::new();
    let row_indices: Vec<usize> = match &params.panel {
        RowPanel::AllGenes => (0..expression.n_genes()).collect(),
        RowPanel::Reference(genes) => {
            let mut rows = Vec::with_capacity(genes.len());
            for gene in genes {
                match expression.gene_index(&params.gene_ids.normalize(gene)) {
                    Some(j) => rows.push(j),
                    None => unmatched_panel.push(gene.clone()),
                }
            }
            rows
        }
    };

    if row_indices.is_empty() {
        return Err(PipelineError::Schema {
            reason: format!(
                "none of the {} reference genes were found among {} genes",
                unmatched_panel.len(),
                expression.n_genes()
            ),
        });
    }
    if !unmatched_panel.is_empty() {
        log::warn!(
            "{} reference genes not found in the matrix: {}",
            unmatched_panel.len(),
            unmatched_panel.join(", ")
        );
    }

    let n_rows = row_indices.len();
    let n_cols = expression.n_genes();
    log::info!(
        "Computing {} x {} {} correlations over {} samples",
        n_rows,
        n_cols,
        params.method,
        expression.n_samples()
    );

    // Both outputs are filled in place, cell by cell, in row-major order
    let columns = prepare_columns(&expression, params.method);
    let mut corrs = vec![f64::NAN; n_rows * n_cols];
    let mut pvals = vec![f64::NAN; n_rows * n_cols];
    corrs
        .par_iter_mut()
        .zip(pvals.par_iter_mut())
        .enumerate()
        .for_each(|(k, (r, p))| {
            let x = &columns[row_indices[k / n_cols]];
            let y = &columns[k % n_cols];
            let cell = correlate_columns(x, y, params.method);
            *r = cell.r;
            *p = cell.pvalue;
        });

    let corrs = into_matrix(n_rows, n_cols, corrs)?;
    let pvals = into_matrix(n_rows, n_cols, pvals)?;

    let gene_ids = expression.gene_ids();
    let pair = CorrelationMatrixPair {
        row_ids: row_indices.iter().map(|&j| gene_ids[j].clone()).collect(),
        col_ids: gene_ids.to_vec(),
        corrs,
        pvals,
    };

    let undefined = pair.n_undefined();
    if undefined > 0 {
        log::debug!("{} correlation cells are undefined", undefined);
    }

    Ok(CorrelationOutput { pair, unmatched_panel })
}
