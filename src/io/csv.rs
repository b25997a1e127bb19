//! Delimited-text reading and writing for expression matrices and covariates

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;

use ::csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use ndarray::{Array2, ArrayView2};

use crate::correlation::CorrelationMatrixPair;
use crate::data::{is_missing_token, parse_numeric_cell, CovariateTable, ExpressionMatrix};
use crate::error::{PipelineError, Result};

/// A table in file orientation: row labels, column labels, numeric cells
#[derive(Debug, Clone)]
pub struct LabelledMatrix {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub values: Array2<f64>,
}

impl LabelledMatrix {
    /// Swap rows and columns
    pub fn transpose(self) -> Self {
        Self {
            row_labels: self.col_labels,
            col_labels: self.row_labels,
            values: self.values.reversed_axes().as_standard_layout().to_owned(),
        }
    }
}

/// Tab when the header line contains one, comma otherwise
pub fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| PipelineError::io(path, e))
}

fn resolve_delimiter(path: &Path, delimiter: Option<u8>) -> Result<u8> {
    if let Some(d) = delimiter {
        return Ok(d);
    }
    let mut first_line = String::new();
    BufReader::new(open(path)?)
        .read_line(&mut first_line)
        .map_err(|e| PipelineError::io(path, e))?;
    Ok(detect_delimiter(&first_line))
}

fn read_records(path: &Path, delimiter: Option<u8>) -> Result<(StringRecord, Vec<StringRecord>)> {
    let delimiter = resolve_delimiter(path, delimiter)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(BufReader::new(open(path)?));

    let header = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PipelineError::InvalidMatrix {
            reason: format!("{}: {}", path.display(), e),
        })?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        rows.push(record);
    }
    Ok((header, rows))
}

/// Read a labelled numeric table without changing its orientation
///
/// Rows or columns whose label is in `drop_labels` are skipped before
/// parsing. Missing tokens and infinities become `NaN`.
pub fn read_labelled_matrix<P: AsRef<Path>>(
    path: P,
    delimiter: Option<u8>,
    drop_labels: &[String],
) -> Result<LabelledMatrix> {
    let path = path.as_ref();
    let (header, rows) = read_records(path, delimiter)?;

    if header.len() < 2 {
        return Err(PipelineError::InvalidMatrix {
            reason: format!("{}: header has fewer than two columns", path.display()),
        });
    }

    let dropped = |label: &str| drop_labels.iter().any(|d| d == label);
    let kept_cols: Vec<usize> = (1..header.len()).filter(|&j| !dropped(&header[j])).collect();
    let col_labels: Vec<String> = kept_cols.iter().map(|&j| header[j].to_string()).collect();

    let mut row_labels = Vec::with_capacity(rows.len());
    let mut data: Vec<f64> = Vec::with_capacity(rows.len() * kept_cols.len());
    let mut n_infinite = 0usize;

    for (r, record) in rows.iter().enumerate() {
        let label = record.get(0).unwrap_or_default();
        if dropped(label) {
            continue;
        }
        for &j in &kept_cols {
            let cell = record.get(j).unwrap_or_default();
            let value = parse_numeric_cell(cell).ok_or_else(|| PipelineError::InvalidMatrix {
                reason: format!(
                    "{}: non-numeric value '{}' at row {} ('{}'), column '{}'",
                    path.display(),
                    cell,
                    r + 2,
                    label,
                    &header[j]
                ),
            })?;
            if value.is_infinite() {
                n_infinite += 1;
                data.push(f64::NAN);
            } else {
                data.push(value);
            }
        }
        row_labels.push(label.to_string());
    }

    if row_labels.is_empty() || col_labels.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: format!("{}: no data rows or columns", path.display()),
        });
    }
    if n_infinite > 0 {
        log::warn!("{}: {} infinite values treated as missing", path.display(), n_infinite);
    }

    let values = Array2::from_shape_vec((row_labels.len(), col_labels.len()), data).map_err(|e| {
        PipelineError::InvalidMatrix {
            reason: format!("{}: {}", path.display(), e),
        }
    })?;

    Ok(LabelledMatrix {
        row_labels,
        col_labels,
        values,
    })
}

/// Read an expression matrix; genes end up on the columns
///
/// Expected format: first row holds labels, first column holds labels.
pub fn read_expression_matrix<P: AsRef<Path>>(
    path: P,
    delimiter: Option<u8>,
    drop_labels: &[String],
) -> Result<ExpressionMatrix> {
    let path = path.as_ref();
    let table = read_labelled_matrix(path, delimiter, drop_labels)?;
    let matrix = ExpressionMatrix::from_oriented(table.values, table.row_labels, table.col_labels)?;
    log::info!(
        "Loaded {}: {} samples x {} genes ({} missing)",
        path.display(),
        matrix.n_samples(),
        matrix.n_genes(),
        matrix.n_missing()
    );
    Ok(matrix)
}

/// Read a covariate table keyed by `id_column` (the first column if `None`)
///
/// Cells are kept as text; column kinds are inferred once here.
pub fn read_covariate_table<P: AsRef<Path>>(
    path: P,
    delimiter: Option<u8>,
    id_column: Option<&str>,
) -> Result<CovariateTable> {
    let path = path.as_ref();
    let (header, rows) = read_records(path, delimiter)?;

    let id_idx = match id_column {
        Some(name) => header.iter().position(|h| h == name).ok_or_else(|| PipelineError::Schema {
            reason: format!("{}: id column '{}' not found", path.display(), name),
        })?,
        None => 0,
    };

    if rows.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: format!("{}: no samples found in metadata", path.display()),
        });
    }

    let mut sample_ids = Vec::with_capacity(rows.len());
    for (r, record) in rows.iter().enumerate() {
        let id = record.get(id_idx).unwrap_or_default();
        if is_missing_token(id) {
            return Err(PipelineError::InvalidCovariates {
                reason: format!("{}: row {} has no sample id", path.display(), r + 2),
            });
        }
        sample_ids.push(id.to_string());
    }

    let mut table = CovariateTable::new(sample_ids);
    for (j, name) in header.iter().enumerate() {
        if j == id_idx {
            continue;
        }
        let values: Vec<String> = rows
            .iter()
            .map(|record| record.get(j).unwrap_or_default().to_string())
            .collect();
        table.add_column(name, values)?;
    }

    log::info!(
        "Loaded {}: {} samples x {} covariates",
        path.display(),
        table.n_samples(),
        table.column_names().len()
    );
    Ok(table)
}

/// Read one identifier per line; blank lines and `#` comments are skipped
pub fn read_gene_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let reader = BufReader::new(open(path)?);
    let mut genes = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| PipelineError::io(path, e))?;
        let id = line.split([',', '\t']).next().unwrap_or_default().trim();
        if id.is_empty() || id.starts_with('#') {
            continue;
        }
        genes.push(id.to_string());
    }
    if genes.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: format!("{}: gene list is empty", path.display()),
        });
    }
    Ok(genes)
}

fn format_cell(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        // Debug keeps tiny p-values in exponent form
        format!("{:?}", v)
    }
}

/// Write a labelled matrix as comma-separated text
///
/// The corner cell is empty; missing values are written as empty cells.
pub fn write_matrix<P: AsRef<Path>>(
    path: P,
    row_labels: &[String],
    col_labels: &[String],
    values: ArrayView2<'_, f64>,
) -> Result<()> {
    let path = path.as_ref();
    if values.dim() != (row_labels.len(), col_labels.len()) {
        return Err(PipelineError::DimensionMismatch {
            expected: format!("{}x{}", row_labels.len(), col_labels.len()),
            got: format!("{}x{}", values.nrows(), values.ncols()),
        });
    }

    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = WriterBuilder::new().from_writer(BufWriter::new(file));

    let mut header = Vec::with_capacity(col_labels.len() + 1);
    header.push(String::new());
    header.extend(col_labels.iter().cloned());
    writer.write_record(&header)?;

    for (i, label) in row_labels.iter().enumerate() {
        let mut record = Vec::with_capacity(col_labels.len() + 1);
        record.push(label.clone());
        record.extend(values.row(i).iter().map(|&v| format_cell(v)));
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

/// Write an expression matrix (samples on rows, genes on columns)
pub fn write_expression_matrix<P: AsRef<Path>>(path: P, matrix: &ExpressionMatrix) -> Result<()> {
    write_matrix(path, matrix.sample_ids(), matrix.gene_ids(), matrix.values())
}

/// Write the correlation and p-value matrices of a pair
pub fn write_correlation_pair<P: AsRef<Path>, Q: AsRef<Path>>(
    corr_path: P,
    pval_path: Q,
    pair: &CorrelationMatrixPair,
) -> Result<()> {
    write_matrix(corr_path, &pair.row_ids, &pair.col_ids, pair.corrs.view())?;
    write_matrix(pval_path, &pair.row_ids, &pair.col_ids, pair.pvals.view())
}

/// Write one score per gene as a two-column table
pub fn write_gene_scores<P: AsRef<Path>>(path: P, gene_ids: &[String], column: &str, scores: &[f64]) -> Result<()> {
    let path = path.as_ref();
    if gene_ids.len() != scores.len() {
        return Err(PipelineError::DimensionMismatch {
            expected: format!("{} scores", gene_ids.len()),
            got: format!("{} scores", scores.len()),
        });
    }
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = WriterBuilder::new().from_writer(BufWriter::new(file));
    writer.write_record(["gene", column])?;
    for (gene, &score) in gene_ids.iter().zip(scores) {
        writer.write_record([gene.as_str(), format_cell(score).as_str()])?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}
