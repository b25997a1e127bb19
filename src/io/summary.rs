//! Long-form summary of correlation and p-value matrices across files

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ::csv::WriterBuilder;

use super::csv::{read_labelled_matrix, LabelledMatrix};
use crate::data::IdNormalizer;
use crate::error::{PipelineError, Result};

/// Which matrix of a correlation pair a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKind {
    Corrs,
    Pvals,
}

impl MatrixKind {
    /// Classify by file name (`..._corrs` / `..._pvals`)
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.contains("_corrs") {
            Some(MatrixKind::Corrs)
        } else if name.contains("_pvals") {
            Some(MatrixKind::Pvals)
        } else {
            None
        }
    }

    fn column_suffix(&self) -> &'static str {
        match self {
            MatrixKind::Corrs => "corr",
            MatrixKind::Pvals => "pval",
        }
    }
}

/// Wide table: one row per (reference gene, gene), one column per file
#[derive(Debug, Clone, Default)]
pub struct SummaryTable {
    pub keys: Vec<(String, String)>,
    pub columns: Vec<String>,
    /// Column-major values, `values[c][k]` for column c and key k
    pub values: Vec<Vec<f64>>,
}

impl SummaryTable {
    fn add_column(&mut self, name: String, matrix: &LabelledMatrix) {
        if self.keys.is_empty() {
            for r in &matrix.row_labels {
                for c in &matrix.col_labels {
                    self.keys.push((r.clone(), c.clone()));
                }
            }
        }
        let mut lookup: HashMap<(&str, &str), f64> = HashMap::with_capacity(matrix.values.len());
        for (i, r) in matrix.row_labels.iter().enumerate() {
            for (j, c) in matrix.col_labels.iter().enumerate() {
                lookup.insert((r.as_str(), c.as_str()), matrix.values[[i, j]]);
            }
        }
        let column = self
            .keys
            .iter()
            .map(|(r, c)| lookup.get(&(r.as_str(), c.as_str())).copied().unwrap_or(f64::NAN))
            .collect();
        self.columns.push(name);
        self.values.push(column);
    }

    /// Write with leading `ref_gene,gene` columns
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        let mut writer = WriterBuilder::new().from_writer(BufWriter::new(file));

        let mut header = vec!["ref_gene".to_string(), "gene".to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for (k, (r, c)) in self.keys.iter().enumerate() {
            let mut record = vec![r.clone(), c.clone()];
            record.extend(self.values.iter().map(|col| {
                let v = col[k];
                if v.is_nan() {
                    String::new()
                } else {
                    format!("{:?}", v)
                }
            }));
            writer.write_record(&record)?;
        }
        writer.flush().map_err(|e| PipelineError::io(path, e))?;
        Ok(())
    }
}

/// Put panel genes on the rows, transposing when they label the columns
fn orient_panel_rows(matrix: LabelledMatrix, panel: &[String], gene_ids: &IdNormalizer, path: &Path) -> LabelledMatrix {
    let is_panel = |label: &String| panel.contains(&gene_ids.normalize(label));
    if matrix.row_labels.iter().any(is_panel) {
        matrix
    } else if matrix.col_labels.iter().any(is_panel) {
        log::info!("{}: reference genes are on the columns; transposing", path.display());
        matrix.transpose()
    } else {
        log::warn!("{}: no reference gene found on either axis", path.display());
        matrix
    }
}

/// Build the summary over correlation files
///
/// All `_corrs` columns come before all `_pvals` columns, each in file
/// order. Gene labels are normalised with `gene_ids` so versioned and
/// unversioned outputs line up; pairs absent from a file are missing.
pub fn summarize_correlations(files: &[PathBuf], panel: &[String], gene_ids: &IdNormalizer) -> Result<SummaryTable> {
    let panel: Vec<String> = gene_ids.normalize_all(panel);

    let mut corr_files = Vec::new();
    let mut pval_files = Vec::new();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match MatrixKind::from_file_name(&name) {
            Some(MatrixKind::Corrs) => corr_files.push((path, name)),
            Some(MatrixKind::Pvals) => pval_files.push((path, name)),
            None => log::debug!("{}: not a correlation output; skipped", path.display()),
        }
    }

    if corr_files.is_empty() && pval_files.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: "no _corrs or _pvals files to summarize".to_string(),
        });
    }

    let mut table = SummaryTable::default();
    for (kind, group) in [(MatrixKind::Corrs, &corr_files), (MatrixKind::Pvals, &pval_files)] {
        for (path, name) in group {
            let matrix = read_labelled_matrix(path, None, &[])?;
            let mut matrix = orient_panel_rows(matrix, &panel, gene_ids, path);
            matrix.row_labels = gene_ids.normalize_all(&matrix.row_labels);
            matrix.col_labels = gene_ids.normalize_all(&matrix.col_labels);
            let stem = name.strip_suffix(".csv").unwrap_or(name.as_str());
            table.add_column(format!("{}{}", stem, kind.column_suffix()), &matrix);
        }
    }

    log::info!(
        "Summary table: {} gene pairs x {} columns",
        table.keys.len(),
        table.columns.len()
    );
    Ok(table)
}
