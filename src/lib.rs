//! rust_genecorr: covariate regression and co-expression for expression matrices
//!
//! The crate cleans sample-by-gene expression matrices and measures how
//! strongly every gene co-varies with a reference panel (by default the 13
//! mitochondrially-encoded genes):
//!
//! 1. `filter`: mask IQR outliers, drop unexpressed samples and genes
//! 2. `glm` + `residuals`: regress technical and demographic covariates
//!    out of each gene, using only the samples where that gene is present
//! 3. `correlation`: pairwise-complete Pearson or Spearman correlation of
//!    the panel against every gene, with Student t p-values
//!
//! `pipeline` runs each stage over a directory of files in parallel.
//!
//! # Example
//!
//! ```ignore
//! use rust_genecorr::prelude::*;
//!
//! let expression = read_expression_matrix("liver_tpm.csv", None, &[])?;
//! let covariates = read_covariate_table("metadata.csv", None, None)?;
//!
//! let aligned = TableAligner::default().align(&expression, &covariates)?;
//! let design = encode_covariates(&aligned.covariates, &EncoderParams::default())?;
//! let residuals = residualize_matrix(&aligned.expression, &design, &ResidualParams::default())?;
//!
//! let output = correlation_matrix(&residuals.residuals, &CorrelationParams::default())?;
//! write_correlation_pair("corrs.csv", "pvals.csv", &output.pair)?;
//! ```

pub mod cli;
pub mod correlation;
pub mod data;
pub mod error;
pub mod filter;
pub mod glm;
pub mod io;
pub mod pipeline;
pub mod residuals;
pub mod stats;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::correlation::{
        correlation_matrix, pairwise_complete, CorrelationMethod, CorrelationOutput, CorrelationParams, RowPanel,
        ShuffleMode, MITO_GENES,
    };
    pub use crate::data::{CovariateTable, ExpressionMatrix, IdNormalizer, TableAligner};
    pub use crate::error::{PipelineError, Result};
    pub use crate::filter::{filter_null_genes_and_samples, mask_matrix, MaskParams};
    pub use crate::glm::{encode_covariates, DesignMatrix, EncoderParams};
    pub use crate::io::{
        read_covariate_table, read_expression_matrix, read_gene_list, write_correlation_pair,
        write_expression_matrix, BatchReport, FileReport,
    };
    pub use crate::pipeline::{
        run_correlate, run_filter, run_mask, run_regress, run_summarize, BatchConfig, CohortPreset, CovariateConfig,
    };
    pub use crate::residuals::{residualize_matrix, ResidualOutput, ResidualParams};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use ndarray::Array2;

    #[test]
    fn test_residualize_then_correlate() {
        let n = 12;
        let samples: Vec<String> = (0..n).map(|i| format!("s{}", i)).collect();
        let genes: Vec<String> = ["ENSG00000198888.1", "ENSG00000198763.3", "ENSGA.1", "ENSGB.2"]
            .iter()
            .map(|g| g.to_string())
            .collect();

        let mut covariates = CovariateTable::new(samples.clone());
        covariates
            .add_column("rin", (0..n).map(|i| format!("{}", 5.0 + (i % 4) as f64)).collect())
            .unwrap();

        let mut values = Array2::zeros((n, genes.len()));
        for i in 0..n {
            let f = i as f64;
            let rin = 5.0 + (i % 4) as f64;
            values[[i, 0]] = 2.0 * rin + (f * 0.9).sin();
            values[[i, 1]] = -rin + (f * 0.9).sin() * 0.5;
            values[[i, 2]] = 3.0 * rin + (f * 2.3).cos();
            values[[i, 3]] = f;
        }
        values[[4, 3]] = f64::NAN;
        let expression = ExpressionMatrix::new(values, samples, genes).unwrap();

        let aligned = TableAligner::default().align(&expression, &covariates).unwrap();
        let design = encode_covariates(&aligned.covariates, &EncoderParams::default()).unwrap();
        let residuals = residualize_matrix(&aligned.expression, &design, &ResidualParams::default()).unwrap();
        assert!(residuals.residuals.gene_values(3)[4].is_nan());

        let output = correlation_matrix(&residuals.residuals, &CorrelationParams::default()).unwrap();
        assert_eq!(output.pair.row_ids, vec!["ENSG00000198888", "ENSG00000198763"]);
        assert_eq!(output.pair.dim(), (2, 4));
        assert_eq!(output.unmatched_panel.len(), 11);
        // The shared sine term survives regression on rin
        assert!(output.pair.corrs[[0, 1]] > 0.99);
        assert!((output.pair.corrs[[0, 0]] - 1.0).abs() < 1e-12);
    }
}
