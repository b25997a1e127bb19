//! Removal of unexpressed samples and genes

use crate::data::ExpressionMatrix;
use crate::error::{PipelineError, Result};

/// Drop all-zero samples, then keep only genes with no zero value
///
/// Missing values count as non-zero, so a gene is kept unless it was
/// measured as zero in at least one remaining sample.
pub fn filter_null_genes_and_samples(expression: &ExpressionMatrix) -> Result<ExpressionMatrix> {
    let values = expression.values();

    let keep_samples: Vec<usize> = (0..expression.n_samples())
        .filter(|&i| !values.row(i).iter().all(|&v| v == 0.0))
        .collect();
    if keep_samples.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: "every sample has only zero values".to_string(),
        });
    }

    let keep_genes: Vec<usize> = (0..expression.n_genes())
        .filter(|&j| keep_samples.iter().all(|&i| values[[i, j]] != 0.0))
        .collect();
    if keep_genes.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: "no gene is expressed in every sample".to_string(),
        });
    }

    log::info!(
        "Kept {} of {} samples and {} of {} genes",
        keep_samples.len(),
        expression.n_samples(),
        keep_genes.len(),
        expression.n_genes()
    );

    expression.subset_samples(&keep_samples)?.subset_genes(&keep_genes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_drops_zero_sample_then_zero_genes() {
        let expr = ExpressionMatrix::new(
            array![
                [1.0, 0.0, 3.0, f64::NAN],
                [0.0, 0.0, 0.0, 0.0],
                [2.0, 5.0, 4.0, 1.0]
            ],
            vec!["s1".into(), "s2".into(), "s3".into()],
            vec!["g1".into(), "g2".into(), "g3".into(), "g4".into()],
        )
        .unwrap();

        let filtered = filter_null_genes_and_samples(&expr).unwrap();
        assert_eq!(filtered.sample_ids(), &["s1", "s3"]);
        assert_eq!(filtered.gene_ids(), &["g1", "g3", "g4"]);
        assert!(filtered.values()[[0, 2]].is_nan());
    }

    #[test]
    fn test_all_zero_is_empty_data() {
        let expr = ExpressionMatrix::new(
            array![[0.0, 0.0], [0.0, 0.0]],
            vec!["s1".into(), "s2".into()],
            vec!["g1".into(), "g2".into()],
        )
        .unwrap();
        assert!(matches!(
            filter_null_genes_and_samples(&expr),
            Err(PipelineError::EmptyData { .. })
        ));
    }
}
