//! Batch and covariate configuration, including cohort presets

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::data::{ColumnKind, CovariateTable, IdNormalizer};
use crate::error::{PipelineError, Result};
use crate::io::{base_name, discover_inputs, output_path, read_covariate_table};

/// Where a stage reads its inputs and writes its outputs
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    /// Substring selecting input files; removed from names to form the base
    pub pattern: String,
    /// `None` detects tab or comma from the header line
    pub delimiter: Option<u8>,
    /// `None` writes next to the inputs
    pub output_dir: Option<PathBuf>,
    pub outlabel: String,
    /// Worker threads; 0 uses all cores
    pub threads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            pattern: ".csv".to_string(),
            delimiter: None,
            output_dir: None,
            outlabel: String::new(),
            threads: 0,
        }
    }
}

impl BatchConfig {
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.input_dir)
    }

    /// Input files for this stage, sorted by name
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        discover_inputs(&self.input_dir, &self.pattern)
    }

    /// `{output_dir}/{base}_{outlabel}_{suffix}` for an input file
    pub fn output_for(&self, input: &Path, suffix: &str) -> PathBuf {
        output_path(self.output_dir(), &base_name(input, &self.pattern), &self.outlabel, suffix)
    }
}

/// How covariates are loaded and matched to expression samples
#[derive(Debug, Clone, Default)]
pub struct CovariateConfig {
    pub metadata: PathBuf,
    /// Sample id column of the metadata file; first column if `None`
    pub id_column: Option<String>,
    /// Optional subject-level table whose columns are all added
    pub phenotype: Option<PathBuf>,
    /// Maps a metadata id to the phenotype table's id
    pub phenotype_key: IdNormalizer,
    /// Metadata columns to regress out; every column if empty
    pub covariates: Vec<String>,
    /// Columns forced to be categorical
    pub categorical: Vec<String>,
    pub standardize: Vec<String>,
    /// Rule applied to expression sample ids before joining
    pub sample_ids: IdNormalizer,
    /// Rule applied to metadata ids before joining
    pub covariate_ids: IdNormalizer,
    /// Shapiro-Wilk on each gene's residuals; `None` leaves it to a preset (off otherwise)
    pub normality_test: Option<bool>,
}

impl CovariateConfig {
    /// Read, subset and merge the covariate tables
    pub fn load(&self) -> Result<CovariateTable> {
        let mut table = read_covariate_table(&self.metadata, None, self.id_column.as_deref())?;
        if !self.covariates.is_empty() {
            table = table.select(&self.covariates)?;
        }

        if let Some(phenotype) = &self.phenotype {
            let pheno = read_covariate_table(phenotype, None, None)?;
            table = table.merge(&pheno, &self.phenotype_key)?;
        }

        for name in &self.categorical {
            table.set_kind(name, ColumnKind::Categorical)?;
        }
        table.validate_schema()?;

        log::info!(
            "Covariates: {} ({} samples)",
            table.column_names().join(", "),
            table.n_samples()
        );
        Ok(table)
    }
}

/// Identifier rules and covariate lists for known cohorts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CohortPreset {
    Gtex,
    Rosmap,
}

pub const GTEX_COVARIATES: [&str; 6] = ["SMRIN", "SMNABTCHT", "SMNABTCH", "SMGEBTCH", "SMGEBTCHD", "SMCENTER"];

pub const ROSMAP_COVARIATES: [&str; 16] = [
    "pmi",
    "RIN",
    "library_batch",
    "race",
    "msex",
    "study",
    "age_death",
    "age_at_visit_max",
    "Unknown",
    "InNeurons",
    "Oligodendrocytes",
    "Endothelial",
    "Microglia",
    "Astrocytes",
    "OPC",
    "ExNeurons",
];

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl CohortPreset {
    /// Fill settings the user left unset
    pub fn apply(&self, config: &mut CovariateConfig) -> Result<()> {
        match self {
            CohortPreset::Gtex => {
                if config.id_column.is_none() {
                    config.id_column = Some("SAMPID".to_string());
                }
                if config.covariates.is_empty() {
                    config.covariates = owned(&GTEX_COVARIATES);
                }
                if config.sample_ids.is_identity() {
                    config.sample_ids = IdNormalizer::new().replace(".", "-");
                }
                if config.phenotype_key.is_identity() {
                    config.phenotype_key = IdNormalizer::new().extract(r"^(GTEX-[^-]+)")?;
                }
                if config.phenotype.is_none() {
                    log::warn!("GTEx preset without a phenotype table; subject covariates are not regressed");
                }
            }
            CohortPreset::Rosmap => {
                if config.covariates.is_empty() {
                    config.covariates = owned(&ROSMAP_COVARIATES);
                }
                if config.standardize.is_empty() {
                    config.standardize = owned(&["age_death", "age_at_visit_max"]);
                }
                if config.sample_ids.is_identity() {
                    config.sample_ids = IdNormalizer::new().strip_prefix("X");
                }
            }
        }
        if config.normality_test.is_none() {
            config.normality_test = Some(true);
        }
        Ok(())
    }
}

impl fmt::Display for CohortPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CohortPreset::Gtex => write!(f, "gtex"),
            CohortPreset::Rosmap => write!(f, "rosmap"),
        }
    }
}

impl FromStr for CohortPreset {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gtex" => Ok(CohortPreset::Gtex),
            "rosmap" => Ok(CohortPreset::Rosmap),
            other => Err(PipelineError::InvalidInput {
                reason: format!("unknown cohort preset '{}' (expected gtex or rosmap)", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_output_naming_defaults_to_input_dir() {
        let config = BatchConfig {
            input_dir: PathBuf::from("/data"),
            pattern: "_tpm.csv".to_string(),
            outlabel: "v1".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.output_for(Path::new("/data/liver_tpm.csv"), "residuals.csv"),
            PathBuf::from("/data/liver_v1_residuals.csv")
        );

        let config = BatchConfig {
            output_dir: Some(PathBuf::from("/out")),
            ..config
        };
        assert_eq!(config.output_dir(), Path::new("/out"));
    }

    #[test]
    fn test_gtex_preset_fills_unset_fields() {
        let mut config = CovariateConfig {
            covariates: vec!["SMRIN".to_string()],
            ..Default::default()
        };
        CohortPreset::Gtex.apply(&mut config).unwrap();
        assert_eq!(config.id_column.as_deref(), Some("SAMPID"));
        assert_eq!(config.covariates, vec!["SMRIN"]);
        assert_eq!(config.sample_ids.normalize("GTEX.1117F.0226.SM.5GZZ7"), "GTEX-1117F-0226-SM-5GZZ7");
        assert_eq!(config.phenotype_key.normalize("GTEX-1117F-0226-SM-5GZZ7"), "GTEX-1117F");
        assert_eq!(config.normality_test, Some(true));
    }

    #[test]
    fn test_explicit_normality_choice_survives_preset() {
        for preset in [CohortPreset::Gtex, CohortPreset::Rosmap] {
            let mut config = CovariateConfig {
                normality_test: Some(false),
                ..Default::default()
            };
            preset.apply(&mut config).unwrap();
            assert_eq!(config.normality_test, Some(false));
        }
    }

    #[test]
    fn test_rosmap_preset() {
        let mut config = CovariateConfig::default();
        CohortPreset::Rosmap.apply(&mut config).unwrap();
        assert_eq!(config.covariates.len(), 16);
        assert_eq!(config.standardize, vec!["age_death", "age_at_visit_max"]);
        assert_eq!(config.sample_ids.normalize("X492_120515"), "492_120515");
        assert_eq!("ROSMAP".parse::<CohortPreset>().unwrap(), CohortPreset::Rosmap);
    }

    #[test]
    fn test_load_merges_phenotype_columns() {
        let dir = tempdir().unwrap();
        let meta = dir.path().join("attributes.tsv");
        std::fs::write(
            &meta,
            "SAMPID\tSMRIN\tSMCENTER\tSMTSD\n\
             GTEX-A-0001-SM-1\t7.0\tB1\tLiver\n\
             GTEX-B-0002-SM-2\t6.5\tC1\tLiver\n\
             GTEX-C-0003-SM-3\t8.0\tB1\tLung\n",
        )
        .unwrap();
        let mut pheno = NamedTempFile::new_in(dir.path()).unwrap();
        writeln!(pheno, "SUBJID\tSEX\tAGE").unwrap();
        writeln!(pheno, "GTEX-A\t1\t60-69").unwrap();
        writeln!(pheno, "GTEX-B\t2\t50-59").unwrap();

        let mut config = CovariateConfig {
            metadata: meta,
            phenotype: Some(pheno.path().to_path_buf()),
            covariates: vec!["SMRIN".to_string(), "SMCENTER".to_string()],
            categorical: vec!["SEX".to_string()],
            ..Default::default()
        };
        CohortPreset::Gtex.apply(&mut config).unwrap();

        let table = config.load().unwrap();
        assert_eq!(table.sample_ids(), &["GTEX-A-0001-SM-1", "GTEX-B-0002-SM-2"]);
        assert_eq!(table.column_names(), &["SMRIN", "SMCENTER", "SEX", "AGE"]);
        assert_eq!(table.schema().kind("SEX"), Some(ColumnKind::Categorical));
    }

    #[test]
    fn test_load_missing_covariate_is_schema_error() {
        let mut meta = NamedTempFile::new().unwrap();
        writeln!(meta, "id,age").unwrap();
        writeln!(meta, "s1,30").unwrap();
        let config = CovariateConfig {
            metadata: meta.path().to_path_buf(),
            covariates: vec!["pmi".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.load(), Err(PipelineError::Schema { .. })));
    }
}
