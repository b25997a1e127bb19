//! Command-line interface for rust_genecorr

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_genecorr")]
#[command(version)]
#[command(about = "Covariate regression and mitochondrial co-expression for expression matrices")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options shared by every per-file stage
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Directory holding the input matrices
    #[arg(short, long, default_value = ".")]
    pub input_dir: PathBuf,

    /// Substring selecting input files
    #[arg(short, long, default_value = ".csv",
        long_help = "Substring selecting input files within --input-dir.\n\
            The pattern is also removed from each file name to form the output base name:\n\
            liver_tpm.csv with --pattern _tpm.csv gives liver_<label>_<suffix>.")]
    pub pattern: String,

    /// Field delimiter (comma, tab or a single character) [default: auto]
    #[arg(short, long, value_parser = parse_delimiter,
        long_help = "Field delimiter of the input files.\n\
            Accepts 'comma', 'tab' or any single character.\n\
            When omitted, tab is used if the header line contains one, comma otherwise.")]
    pub delimiter: Option<u8>,

    /// Output directory [default: the input directory]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Label inserted into output file names
    #[arg(short = 'l', long, default_value = "")]
    pub outlabel: String,

    /// Number of threads (0 = auto) [default: 0]
    #[arg(short = 't', long, default_value = "0")]
    pub threads: usize,

    /// Write the run report as JSON
    #[arg(long, value_name = "FILE",
        long_help = "Write a JSON report listing each input file, its outputs, shape,\n\
            masked cell counts, degenerate genes, warnings and any failure.")]
    pub report: Option<PathBuf>,
}

/// Gene identifier matching options
#[derive(Args, Debug, Clone)]
pub struct GeneIdArgs {
    /// Regex removed from gene ids before matching [default: \..*]
    #[arg(long, value_name = "REGEX",
        long_help = "Regular expression removed from gene identifiers before matching\n\
            against the reference panel. The default strips Ensembl version suffixes\n\
            (ENSG00000198888.2 -> ENSG00000198888).")]
    pub gene_version_pattern: Option<String>,

    /// Match gene ids exactly, keeping version suffixes
    #[arg(long, conflicts_with = "gene_version_pattern")]
    pub keep_gene_versions: bool,

    /// File with one reference gene id per line [default: mitochondrial panel]
    #[arg(long, value_name = "FILE",
        long_help = "File with one reference gene identifier per line (first field of each line).\n\
            Replaces the built-in panel of 13 mitochondrially-encoded genes.")]
    pub panel_file: Option<PathBuf>,
}

/// Options of the `regress` command
#[derive(Args, Debug, Clone)]
pub struct RegressArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Sample metadata table
    #[arg(short, long)]
    pub metadata: PathBuf,

    /// Sample id column of the metadata [default: first column]
    #[arg(long)]
    pub id_column: Option<String>,

    /// Subject phenotype table merged into the metadata
    #[arg(long,
        long_help = "Subject-level table whose columns are all added as covariates.\n\
            Its first column is matched against --phenotype-key applied to the metadata ids.")]
    pub phenotype: Option<PathBuf>,

    /// Regex whose first group turns a metadata id into a phenotype id
    #[arg(long, value_name = "REGEX")]
    pub phenotype_key: Option<String>,

    /// Cohort preset (gtex, rosmap)
    #[arg(long,
        long_help = "Cohort preset filling the covariate list and identifier rules.\n\
            gtex:   SAMPID ids, '.' -> '-' in sample ids, SMRIN/SMNABTCHT/SMNABTCH/\n\
                    SMGEBTCH/SMGEBTCHD/SMCENTER plus phenotype columns\n\
            rosmap: leading 'X' stripped from sample ids, 16 covariates,\n\
                    age_death and age_at_visit_max standardized\n\
            Both presets turn on the normality test unless --no-normality is given.\n\
            Explicit options take precedence over the preset.")]
    pub preset: Option<String>,

    /// Covariate column to regress out [default: all columns]
    #[arg(long, value_name = "COLUMN")]
    pub covariate: Vec<String>,

    /// Covariate forced to be categorical
    #[arg(long, value_name = "COLUMN")]
    pub categorical: Vec<String>,

    /// Numeric covariate to z-score before imputation
    #[arg(long, value_name = "COLUMN")]
    pub standardize: Vec<String>,

    /// Prefix stripped from expression sample ids before matching
    #[arg(long, value_name = "PREFIX")]
    pub strip_prefix: Option<String>,

    /// Run the Shapiro-Wilk test on each gene's residuals
    #[arg(long)]
    pub normality: bool,

    /// Skip the Shapiro-Wilk test even when a preset enables it
    #[arg(long, conflicts_with = "normality")]
    pub no_normality: bool,
}

impl RegressArgs {
    /// `None` when neither normality flag was given
    pub fn normality_choice(&self) -> Option<bool> {
        match (self.normality, self.no_normality) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mask outliers outside the IQR fences
    #[command(
        long_about = "Mask outliers gene by gene.\n\n\
            Values strictly outside [Q1 - k*IQR, Q3 + k*IQR] become missing.\n\
            Quartiles use linear interpolation over the present values of each gene.",
        after_long_help = "\
Examples:
  rust_genecorr mask -i tpm/ -p _tpm.csv -l v8
  rust_genecorr mask -i tpm/ -p .txt -d tab --iqr-multiplier 1.5 --drop-label tissue"
    )]
    Mask {
        #[command(flatten)]
        batch: BatchArgs,

        /// Fence width in IQR units [default: 3.0]
        #[arg(long, default_value = "3.0")]
        iqr_multiplier: f64,

        /// Non-numeric row or column label to drop before masking
        #[arg(long, value_name = "LABEL", default_values_t = vec!["brain_region".to_string()],
            long_help = "Row or column label removed before numeric parsing.\n\
                Can be specified multiple times. Defaults to brain_region.")]
        drop_label: Vec<String>,
    },

    /// Regress covariates out of every gene
    #[command(
        long_about = "Regress covariates out of every gene.\n\n\
            Each gene is fitted by least squares against an intercept plus the encoded\n\
            covariates, using only samples where the gene is present. Residuals keep the\n\
            input's shape; missing cells stay missing.",
        after_long_help = "\
Examples:
  # GTEx sample attributes plus subject phenotypes
  rust_genecorr regress -i tpm/ -p _masked_outliers.csv --preset gtex \\
    --metadata SampleAttributesDS.txt --phenotype SubjectPhenotypesDS.txt

  # ROSMAP
  rust_genecorr regress -i tpm/ -p _masked_outliers.csv --preset rosmap \\
    --metadata rosmap_meta.csv

  # Explicit covariates
  rust_genecorr regress -i data/ --metadata meta.csv --covariate age \\
    --covariate batch --categorical batch --standardize age --normality"
    )]
    Regress(RegressArgs),

    /// Correlate the reference panel against every gene
    #[command(
        long_about = "Correlate reference genes against every gene.\n\n\
            Writes a correlation matrix and a p-value matrix per file, reference genes\n\
            on the rows. Each pair uses the samples where both genes are present.",
        after_long_help = "\
Examples:
  rust_genecorr corr -i residuals/ -p _residuals.csv -m spearman
  rust_genecorr corr -i residuals/ -p _residuals.csv --all-genes
  rust_genecorr corr -i residuals/ -p _residuals.csv --shuffle --seed 7 -l control"
    )]
    Corr {
        #[command(flatten)]
        batch: BatchArgs,

        #[command(flatten)]
        genes: GeneIdArgs,

        /// Correlation method (pearson, spearman) [default: pearson]
        #[arg(short, long, default_value = "pearson")]
        method: String,

        /// Put every gene on the rows instead of the reference panel
        #[arg(long, conflicts_with = "panel_file")]
        all_genes: bool,

        /// Shuffle gene labels first (negative control)
        #[arg(long)]
        shuffle: bool,

        /// Seed for --shuffle
        #[arg(long, requires = "shuffle")]
        seed: Option<u64>,
    },

    /// Keep genes expressed in every sample
    #[command(
        long_about = "Drop samples whose values are all zero, then keep only genes\n\
            with no zero value in the remaining samples.",
        after_long_help = "\
Examples:
  rust_genecorr filter -i tpm/ -p _tpm.csv"
    )]
    Filter {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Stack correlation outputs into one table
    #[command(
        long_about = "Stack correlation and p-value matrices into one long table.\n\n\
            Reads every matching _corrs / _pvals file and writes\n\
            <output-dir>/<label>summary_table.csv with one row per (reference gene, gene).",
        after_long_help = "\
Examples:
  rust_genecorr summarize -i corrs/ -p pearson -l v8_"
    )]
    Summarize {
        #[command(flatten)]
        batch: BatchArgs,

        #[command(flatten)]
        genes: GeneIdArgs,
    },
}

/// Parse a delimiter name or single character
pub fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "tab" | "\\t" => Ok(b'\t'),
        "comma" => Ok(b','),
        other if other.len() == 1 => Ok(other.as_bytes()[0]),
        other => Err(format!("invalid delimiter '{}': use comma, tab or one character", other)),
    }
}
