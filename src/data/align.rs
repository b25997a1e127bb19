//! Row alignment of an expression matrix with its covariate table

use std::collections::HashMap;

use super::{CovariateTable, ExpressionMatrix, IdNormalizer};
use crate::error::{PipelineError, Result};

/// Matches expression samples to covariate rows by canonical identifier
#[derive(Debug, Clone, Default)]
pub struct TableAligner {
    /// Rule applied to expression sample ids to form the join key
    pub sample_ids: IdNormalizer,
    /// Rule applied to the covariate table's own id column
    pub covariate_ids: IdNormalizer,
}

/// Expression matrix and covariates with identical row order
#[derive(Debug, Clone)]
pub struct AlignedTables {
    pub expression: ExpressionMatrix,
    pub covariates: CovariateTable,
    /// Expression samples that had no covariate row
    pub dropped_samples: Vec<String>,
}

impl TableAligner {
    pub fn new(sample_ids: IdNormalizer, covariate_ids: IdNormalizer) -> Self {
        Self {
            sample_ids,
            covariate_ids,
        }
    }

    /// Align covariate rows to the expression matrix's sample order
    ///
    /// Covariate rows without an expression sample are dropped. Expression
    /// samples without covariates are dropped with a warning. Row i of both
    /// outputs refers to the same sample, labelled by its expression id.
    pub fn align(&self, expression: &ExpressionMatrix, covariates: &CovariateTable) -> Result<AlignedTables> {
        let mut cov_index: HashMap<String, usize> = HashMap::with_capacity(covariates.n_samples());
        for (i, id) in covariates.sample_ids().iter().enumerate() {
            let key = self.covariate_ids.normalize(id);
            if let Some(&first) = cov_index.get(&key) {
                log::warn!(
                    "Covariate ids '{}' and '{}' share key '{}'; keeping the first",
                    covariates.sample_ids()[first],
                    id,
                    key
                );
                continue;
            }
            cov_index.insert(key, i);
        }

        let mut expr_rows = Vec::new();
        let mut cov_rows = Vec::new();
        let mut dropped = Vec::new();
        for (i, id) in expression.sample_ids().iter().enumerate() {
            match cov_index.get(&self.sample_ids.normalize(id)) {
                Some(&j) => {
                    expr_rows.push(i);
                    cov_rows.push(j);
                }
                None => dropped.push(id.clone()),
            }
        }

        if expr_rows.is_empty() {
            let example = expression
                .sample_ids()
                .first()
                .map(|id| format!(" (e.g. '{}' -> '{}')", id, self.sample_ids.normalize(id)))
                .unwrap_or_default();
            return Err(PipelineError::Alignment {
                reason: format!(
                    "none of {} expression samples matched {} covariate rows{}",
                    expression.n_samples(),
                    covariates.n_samples(),
                    example
                ),
            });
        }

        if !dropped.is_empty() {
            log::warn!(
                "{} of {} expression samples have no covariates and were dropped",
                dropped.len(),
                expression.n_samples()
            );
        }

        let aligned_expr = if dropped.is_empty() {
            expression.clone()
        } else {
            expression.subset_samples(&expr_rows)?
        };
        let aligned_cov = covariates
            .subset(&cov_rows)?
            .with_sample_ids(aligned_expr.sample_ids().to_vec())?;

        log::info!(
            "Aligned {} samples ({} covariate rows available)",
            aligned_expr.n_samples(),
            covariates.n_samples()
        );

        Ok(AlignedTables {
            expression: aligned_expr,
            covariates: aligned_cov,
            dropped_samples: dropped,
        })
    }
}
