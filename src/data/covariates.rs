//! Covariate (sample metadata) tables and their column schema

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::IdNormalizer;
use crate::error::{PipelineError, Result};

/// Kind of a covariate column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Finite set of string levels, label-encoded before regression
    Categorical,
    /// Real-valued, possibly with missing cells
    Numeric,
}

/// Explicit column-name -> kind mapping, fixed once at load time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CovariateSchema {
    columns: Vec<(String, ColumnKind)>,
}

impl CovariateSchema {
    /// Kind of a column, if known
    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, k)| *k)
    }

    /// Override a column's kind
    pub fn set_kind(&mut self, name: &str, kind: ColumnKind) -> Result<()> {
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => {
                entry.1 = kind;
                Ok(())
            }
            None => Err(PipelineError::Schema {
                reason: format!("cannot set kind of unknown covariate '{}'", name),
            }),
        }
    }
}

/// Missing-value tokens recognised in delimited input
pub const MISSING_TOKENS: [&str; 8] = ["", "NA", "NaN", "nan", "N/A", "NULL", "null", "None"];

/// True when a cell is a missing-value marker
pub fn is_missing_token(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell.trim())
}

/// Parse a numeric cell; missing markers parse to `NaN`
pub(crate) fn parse_numeric_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if is_missing_token(cell) {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

/// Per-sample covariates keyed by sample id
///
/// Cells are kept as text until encoding; [`CovariateSchema`] records how
/// each column is to be interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovariateTable {
    /// Sample identifiers (the table's own id column)
    sample_ids: Vec<String>,
    /// Column names in order
    column_names: Vec<String>,
    /// Cell text per column (column name -> values for each sample)
    cells: HashMap<String, Vec<String>>,
    schema: CovariateSchema,
}

impl CovariateTable {
    /// Create an empty table over the given samples
    pub fn new(sample_ids: Vec<String>) -> Self {
        {
            let mut seen = HashSet::new();
            for id in &sample_ids {
                if !seen.insert(id) {
                    log::warn!("Duplicate covariate sample ID detected: '{}'", id);
                }
            }
        }
        Self {
            sample_ids,
            column_names: Vec::new(),
            cells: HashMap::new(),
            schema: CovariateSchema::default(),
        }
    }

    /// Add a column; its kind is inferred from the values
    pub fn add_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        let kind = infer_kind(&values);
        self.add_column_with_kind(name, values, kind)
    }

    /// Add a column with an explicit kind
    pub fn add_column_with_kind(&mut self, name: &str, values: Vec<String>, kind: ColumnKind) -> Result<()> {
        if values.len() != self.sample_ids.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} values", self.sample_ids.len()),
                got: format!("{} values", values.len()),
            });
        }
        if self.cells.contains_key(name) {
            return Err(PipelineError::InvalidCovariates {
                reason: format!("duplicate covariate column '{}'", name),
            });
        }
        self.column_names.push(name.to_string());
        self.cells.insert(name.to_string(), values);
        self.schema.columns.push((name.to_string(), kind));
        Ok(())
    }

    /// Get sample IDs
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get number of samples
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Column names in order
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Raw cell text of a column
    pub fn column(&self, name: &str) -> Option<&Vec<String>> {
        self.cells.get(name)
    }

    /// Check if a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.cells.contains_key(name)
    }

    /// The column schema
    pub fn schema(&self) -> &CovariateSchema {
        &self.schema
    }

    /// Force a column to be treated as categorical or numeric
    pub fn set_kind(&mut self, name: &str, kind: ColumnKind) -> Result<()> {
        self.schema.set_kind(name, kind)
    }

    /// Check the schema against the cell contents
    ///
    /// Every numeric column must parse (missing markers allowed).
    pub fn validate_schema(&self) -> Result<()> {
        for (name, kind) in &self.schema.columns {
            let values = self.cells.get(name).ok_or_else(|| PipelineError::Schema {
                reason: format!("schema lists '{}' but the table has no such column", name),
            })?;
            if *kind == ColumnKind::Numeric {
                if let Some(bad) = values.iter().find(|v| parse_numeric_cell(v).is_none()) {
                    return Err(PipelineError::Schema {
                        reason: format!("numeric covariate '{}' has non-numeric value '{}'", name, bad),
                    });
                }
            }
        }
        Ok(())
    }

    /// Keep only the named columns, in the given order
    pub fn select(&self, columns: &[String]) -> Result<Self> {
        let missing: Vec<&str> = columns
            .iter()
            .filter(|c| !self.cells.contains_key(c.as_str()))
            .map(|s| s.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Schema {
                reason: format!("covariate columns not found in metadata: {:?}", missing),
            });
        }

        let mut out = CovariateTable::new(self.sample_ids.clone());
        for name in columns {
            let kind = self.schema.kind(name).unwrap_or(ColumnKind::Categorical);
            out.add_column_with_kind(name, self.cells[name.as_str()].clone(), kind)?;
        }
        Ok(out)
    }

    /// Subset to specific samples, in the given order
    pub fn subset(&self, sample_indices: &[usize]) -> Result<Self> {
        let new_ids: Vec<String> = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();

        let mut out = CovariateTable::new(new_ids);
        for (name, kind) in &self.schema.columns {
            let values = &self.cells[name.as_str()];
            let new_values: Vec<String> = sample_indices.iter().map(|&i| values[i].clone()).collect();
            out.add_column_with_kind(name, new_values, *kind)?;
        }
        Ok(out)
    }

    /// Replace the sample ids (same length, same order)
    pub fn with_sample_ids(mut self, sample_ids: Vec<String>) -> Result<Self> {
        if sample_ids.len() != self.sample_ids.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} sample IDs", self.sample_ids.len()),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }
        self.sample_ids = sample_ids;
        Ok(self)
    }

    /// Inner-join another table whose ids are `key_rule(self id)`
    ///
    /// Used to attach subject-level phenotypes to sample-level attributes.
    /// Rows of `self` without a partner are dropped; columns of `other` that
    /// clash with existing names are skipped with a warning.
    pub fn merge(&self, other: &CovariateTable, key_rule: &IdNormalizer) -> Result<Self> {
        let mut other_index: HashMap<&str, usize> = HashMap::new();
        for (i, id) in other.sample_ids.iter().enumerate() {
            other_index.entry(id.as_str()).or_insert(i);
        }

        let mut left_rows = Vec::new();
        let mut right_rows = Vec::new();
        for (i, id) in self.sample_ids.iter().enumerate() {
            if let Some(&j) = other_index.get(key_rule.normalize(id).as_str()) {
                left_rows.push(i);
                right_rows.push(j);
            }
        }

        if left_rows.is_empty() {
            return Err(PipelineError::Alignment {
                reason: "no metadata rows matched the phenotype table".to_string(),
            });
        }
        if left_rows.len() < self.n_samples() {
            log::warn!(
                "{} of {} metadata rows have no phenotype record and were dropped",
                self.n_samples() - left_rows.len(),
                self.n_samples()
            );
        }

        let mut merged = self.subset(&left_rows)?;
        for (name, kind) in &other.schema.columns {
            if merged.has_column(name) {
                log::warn!("Phenotype column '{}' already present in metadata; skipped", name);
                continue;
            }
            let values = &other.cells[name.as_str()];
            let new_values: Vec<String> = right_rows.iter().map(|&j| values[j].clone()).collect();
            merged.add_column_with_kind(name, new_values, *kind)?;
        }
        Ok(merged)
    }
}

/// Infer a column's kind from its values
///
/// A column is numeric when every non-missing cell parses as a number and at
/// least one cell is present; otherwise it is categorical.
pub fn infer_kind(values: &[String]) -> ColumnKind {
    let mut any_present = false;
    for v in values {
        if is_missing_token(v) {
            continue;
        }
        any_present = true;
        if v.trim().parse::<f64>().is_err() {
            return ColumnKind::Categorical;
        }
    }
    if any_present {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn example() -> CovariateTable {
        let mut table = CovariateTable::new(strings(&["s1", "s2", "s3", "s4"]));
        table.add_column("batch", strings(&["A", "B", "A", "C"])).unwrap();
        table.add_column("rin", strings(&["7.1", "NA", "6.5", "8.0"])).unwrap();
        table
    }

    #[test]
    fn test_schema_inference() {
        let table = example();
        assert_eq!(table.schema().kind("batch"), Some(ColumnKind::Categorical));
        assert_eq!(table.schema().kind("rin"), Some(ColumnKind::Numeric));
        assert!(table.validate_schema().is_ok());
    }

    #[test]
    fn test_override_numeric_to_categorical() {
        let mut table = CovariateTable::new(strings(&["s1", "s2"]));
        table.add_column("library_batch", strings(&["1", "2"])).unwrap();
        table.set_kind("library_batch", ColumnKind::Categorical).unwrap();
        assert_eq!(table.schema().kind("library_batch"), Some(ColumnKind::Categorical));
    }

    #[test]
    fn test_forced_numeric_on_text_fails_validation() {
        let mut table = example();
        table.set_kind("batch", ColumnKind::Numeric).unwrap();
        assert!(matches!(table.validate_schema(), Err(PipelineError::Schema { .. })));
    }

    #[test]
    fn test_select_missing_column_is_schema_error() {
        let table = example();
        let err = table.select(&strings(&["rin", "age"])).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_select_preserves_order() {
        let table = example().select(&strings(&["rin", "batch"])).unwrap();
        assert_eq!(table.column_names(), &["rin", "batch"]);
    }

    #[test]
    fn test_merge_on_subject_key() {
        let mut attrs = CovariateTable::new(strings(&["GTEX-A-0001-SM-1", "GTEX-B-0002-SM-2", "GTEX-C-0003-SM-3"]));
        attrs.add_column("SMRIN", strings(&["7", "8", "9"])).unwrap();

        let mut pheno = CovariateTable::new(strings(&["GTEX-B", "GTEX-A"]));
        pheno.add_column("SEX", strings(&["1", "2"])).unwrap();

        let rule = IdNormalizer::new().extract(r"^(GTEX-[^-]+)").unwrap();
        let merged = attrs.merge(&pheno, &rule).unwrap();

        assert_eq!(merged.sample_ids(), &["GTEX-A-0001-SM-1", "GTEX-B-0002-SM-2"]);
        assert_eq!(merged.column("SEX").unwrap(), &strings(&["2", "1"]));
        assert_eq!(merged.column_names(), &["SMRIN", "SEX"]);
    }
}
