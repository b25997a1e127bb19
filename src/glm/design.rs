//! Design matrix creation from covariate tables

use ndarray::{s, Array2, ArrayView2};
use std::collections::{BTreeSet, HashMap};

use super::ols::QrFactorization;
use crate::data::{parse_numeric_cell, ColumnKind, CovariateTable};
use crate::error::{PipelineError, Result};
use crate::stats::{nan_mean, nan_std};

/// Options for covariate encoding
#[derive(Debug, Clone, Default)]
pub struct EncoderParams {
    /// Numeric columns to z-score before imputation
    pub standardize: Vec<String>,
}

/// Fully numeric covariates, one row per sample (no intercept column)
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    values: Array2<f64>,
    sample_ids: Vec<String>,
    column_names: Vec<String>,
    /// Categorical column -> levels; code k means `levels[k]`
    levels: HashMap<String, Vec<String>>,
}

impl DesignMatrix {
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_covariates(&self) -> usize {
        self.values.ncols()
    }

    /// Levels of an encoded categorical column
    pub fn levels(&self, column: &str) -> Option<&[String]> {
        self.levels.get(column).map(|v| v.as_slice())
    }

    /// The design with a leading column of ones
    pub fn with_intercept(&self) -> Array2<f64> {
        let (n, p) = self.values.dim();
        let mut out = Array2::ones((n, p + 1));
        out.slice_mut(s![.., 1..]).assign(&self.values);
        out
    }
}

/// Encode a covariate table into a numeric design matrix
///
/// Categorical columns get integer codes in sorted level order. Columns in
/// `params.standardize` are z-scored with the population standard deviation
/// over present values; a zero-variance column is left unscaled. Remaining
/// missing cells are filled with the column mean. A column with no present
/// values is dropped.
pub fn encode_covariates(table: &CovariateTable, params: &EncoderParams) -> Result<DesignMatrix> {
    table.validate_schema()?;

    for name in &params.standardize {
        match table.schema().kind(name) {
            Some(ColumnKind::Numeric) => {}
            Some(ColumnKind::Categorical) => {
                return Err(PipelineError::Schema {
                    reason: format!("cannot standardize categorical covariate '{}'", name),
                })
            }
            None => {
                return Err(PipelineError::Schema {
                    reason: format!("standardized covariate '{}' not found in metadata", name),
                })
            }
        }
    }

    let n_samples = table.n_samples();
    let mut columns: Vec<Vec<f64>> = Vec::new();
    let mut column_names = Vec::new();
    let mut levels = HashMap::new();

    for name in table.column_names() {
        let cells = table.column(name).ok_or_else(|| PipelineError::Schema {
            reason: format!("covariate column '{}' disappeared during encoding", name),
        })?;
        let kind = table.schema().kind(name).unwrap_or(ColumnKind::Categorical);

        let mut values = match kind {
            ColumnKind::Numeric => cells
                .iter()
                .map(|c| parse_numeric_cell(c).unwrap_or(f64::NAN))
                .collect::<Vec<f64>>(),
            ColumnKind::Categorical => {
                let (codes, column_levels) = label_encode(cells);
                log::debug!("Encoded '{}' with {} levels", name, column_levels.len());
                levels.insert(name.clone(), column_levels);
                codes
            }
        };

        if params.standardize.iter().any(|s| s == name) {
            standardize_in_place(name, &mut values);
        }

        let mean = nan_mean(&values);
        if !mean.is_finite() {
            log::warn!("Covariate '{}' has no values and was dropped from the design", name);
            levels.remove(name);
            continue;
        }
        let n_filled = values.iter().filter(|v| !v.is_finite()).count();
        if n_filled > 0 {
            log::debug!("Filled {} missing values of '{}' with the mean {:.4}", n_filled, name, mean);
            for v in values.iter_mut().filter(|v| !v.is_finite()) {
                *v = mean;
            }
        }

        columns.push(values);
        column_names.push(name.clone());
    }

    if columns.is_empty() {
        log::warn!("No usable covariates; the model reduces to an intercept");
    }

    let mut design = Array2::zeros((n_samples, columns.len()));
    for (j, col) in columns.iter().enumerate() {
        for (i, &v) in col.iter().enumerate() {
            design[[i, j]] = v;
        }
    }

    let encoded = DesignMatrix {
        values: design,
        sample_ids: table.sample_ids().to_vec(),
        column_names,
        levels,
    };

    if let Err(e) = check_full_rank(&encoded.with_intercept()) {
        log::warn!("{}; aliased covariates receive zero coefficients", e);
    }

    Ok(encoded)
}

/// Integer codes over the sorted distinct present values
fn label_encode(cells: &[String]) -> (Vec<f64>, Vec<String>) {
    let levels: Vec<String> = cells
        .iter()
        .map(|c| c.trim())
        .filter(|c| !crate::data::is_missing_token(c))
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let index: HashMap<&str, usize> = levels.iter().enumerate().map(|(k, l)| (l.as_str(), k)).collect();
    let codes = cells
        .iter()
        .map(|c| index.get(c.trim()).map_or(f64::NAN, |&k| k as f64))
        .collect();
    (codes, levels)
}

fn standardize_in_place(name: &str, values: &mut [f64]) {
    let mean = nan_mean(values);
    let sd = nan_std(values);
    if !mean.is_finite() {
        return;
    }
    if !(sd > 0.0) {
        log::warn!("Covariate '{}' has zero variance; left unscaled", name);
        return;
    }
    for v in values.iter_mut().filter(|v| v.is_finite()) {
        *v = (*v - mean) / sd;
    }
}

/// Check whether a design matrix (with intercept) has full column rank
pub fn check_full_rank(matrix: &Array2<f64>) -> Result<()> {
    let ncol = matrix.ncols();
    let qr = QrFactorization::new(matrix.view()).map_err(|e| PipelineError::InvalidCovariates {
        reason: e.to_string(),
    })?;

    if qr.rank() < ncol {
        let has_constant_column = (1..ncol).any(|j| {
            let col = matrix.column(j);
            col.iter().all(|&v| v == col[0])
        });

        let reason = if has_constant_column {
            "the design matrix is not full rank: a covariate is constant across samples"
        } else {
            "the design matrix is not full rank: some covariates are linear combinations of others"
        };
        return Err(PipelineError::InvalidCovariates {
            reason: reason.to_string(),
        });
    }

    Ok(())
}
