//! Expression matrix representation (samples x genes)

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{PipelineError, Result};

/// Deduplicate names by appending _1, _2, etc. to duplicates
pub(crate) fn deduplicate_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for name in &names {
        *seen.entry(name.clone()).or_insert(0) += 1;
    }
    // Only process if there are duplicates
    if !seen.values().any(|&c| c > 1) {
        return names;
    }
    seen.clear();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let count = seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            result.push(name);
        } else {
            let new_name = format!("{}_{}", name, *count - 1);
            log::warn!("Duplicate gene name '{}' renamed to '{}'", name, new_name);
            result.push(new_name);
        }
    }
    result
}

/// A gene-expression matrix
///
/// Rows are samples, columns are genes. Missing observations are stored as
/// `NaN`; every other cell is finite. Sample ids and gene ids are unique.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// Expression values (samples x genes)
    values: Array2<f64>,
    /// Sample identifiers (row labels)
    sample_ids: Vec<String>,
    /// Gene identifiers (column labels)
    gene_ids: Vec<String>,
}

impl ExpressionMatrix {
    /// Create a new expression matrix from samples x genes values
    pub fn new(values: Array2<f64>, sample_ids: Vec<String>, gene_ids: Vec<String>) -> Result<Self> {
        let (n_samples, n_genes) = values.dim();

        if sample_ids.len() != n_samples {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        if gene_ids.len() != n_genes {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }

        if values.iter().any(|x| x.is_infinite()) {
            return Err(PipelineError::InvalidMatrix {
                reason: "Expression values must be finite or missing".to_string(),
            });
        }

        let mut seen = HashSet::with_capacity(sample_ids.len());
        if let Some(dup) = sample_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(PipelineError::InvalidMatrix {
                reason: format!("Duplicate sample ID '{}'", dup),
            });
        }

        let gene_ids = deduplicate_names(gene_ids);

        Ok(Self {
            values,
            sample_ids,
            gene_ids,
        })
    }

    /// Build from a table in file orientation, transposing so genes are columns
    ///
    /// A table with more rows than columns is taken to have genes on the rows.
    pub fn from_oriented(
        values: Array2<f64>,
        row_labels: Vec<String>,
        col_labels: Vec<String>,
    ) -> Result<Self> {
        if values.nrows() > values.ncols() {
            log::debug!(
                "Transposing {}x{} table so genes become columns",
                values.nrows(),
                values.ncols()
            );
            Self::new(values.reversed_axes().as_standard_layout().to_owned(), col_labels, row_labels)
        } else {
            Self::new(values, row_labels, col_labels)
        }
    }

    /// Get the number of samples
    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    /// Get the number of genes
    pub fn n_genes(&self) -> usize {
        self.values.ncols()
    }

    /// Get the values as a view
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Get sample IDs
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get gene IDs
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Get values for a specific gene
    pub fn gene_values(&self, gene_idx: usize) -> ArrayView1<'_, f64> {
        self.values.column(gene_idx)
    }

    /// Get gene index by ID
    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        self.gene_ids.iter().position(|id| id == gene_id)
    }

    /// Number of missing cells
    pub fn n_missing(&self) -> usize {
        self.values.iter().filter(|x| x.is_nan()).count()
    }

    /// Replace gene identifiers (e.g. after version stripping or shuffling)
    pub fn with_gene_ids(self, gene_ids: Vec<String>) -> Result<Self> {
        Self::new(self.values, self.sample_ids, gene_ids)
    }

    /// Subset to specific samples, in the given order
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let new_values = self.values.select(Axis(0), sample_indices);
        let new_sample_ids: Vec<String> = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();

        Self::new(new_values, new_sample_ids, self.gene_ids.clone())
    }

    /// Subset to specific genes, in the given order
    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        let new_values = self.values.select(Axis(1), gene_indices);
        let new_gene_ids: Vec<String> = gene_indices
            .iter()
            .map(|&i| self.gene_ids[i].clone())
            .collect();

        Self::new(new_values, self.sample_ids.clone(), new_gene_ids)
    }

    /// Assemble a matrix of the same shape and labels from per-gene columns
    pub fn with_columns(&self, columns: &[Vec<f64>]) -> Result<Self> {
        if columns.len() != self.n_genes() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} gene columns", self.n_genes()),
                got: format!("{} gene columns", columns.len()),
            });
        }
        let n = self.n_samples();
        let mut values = Array2::zeros((n, columns.len()));
        for (j, col) in columns.iter().enumerate() {
            if col.len() != n {
                return Err(PipelineError::DimensionMismatch {
                    expected: format!("{} values for gene {}", n, self.gene_ids[j]),
                    got: format!("{} values", col.len()),
                });
            }
            values.column_mut(j).assign(&ArrayView1::from(col.as_slice()));
        }
        Self::new(values, self.sample_ids.clone(), self.gene_ids.clone())
    }
}
