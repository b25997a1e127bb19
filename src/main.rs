//! rust_genecorr command-line interface

use clap::Parser;
use log::{info, LevelFilter};

use rust_genecorr::cli::{BatchArgs, Cli, Commands, GeneIdArgs, RegressArgs};
use rust_genecorr::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["mask", "regress", "corr", "filter", "summarize", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("rust_genecorr {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Mask {
            batch,
            iqr_multiplier,
            drop_label,
        }) => run_mask_command(&batch, iqr_multiplier, drop_label),
        Some(Commands::Regress(args)) => build_covariate_config(&args)
            .and_then(|config| finish(&args.batch, run_regress(&batch_config(&args.batch), &config))),
        Some(Commands::Corr {
            batch,
            genes,
            method,
            all_genes,
            shuffle,
            seed,
        }) => run_corr_command(&batch, &genes, &method, all_genes, shuffle, seed),
        Some(Commands::Filter { batch }) => finish(&batch, run_filter(&batch_config(&batch))),
        Some(Commands::Summarize { batch, genes }) => run_summarize_command(&batch, &genes),
        None => {
            print_no_args();
            return;
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("rust_genecorr v{}", VERSION);
    println!("Run `rust_genecorr -h` for usage or `rust_genecorr --help` for detailed information.");
}

fn print_short_help() {
    println!("rust_genecorr v{}", VERSION);
    println!();
    println!("Usage: rust_genecorr <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  mask       Mask outliers outside the IQR fences");
    println!("  regress    Regress covariates out of every gene");
    println!("  corr       Correlate the reference panel against every gene");
    println!("  filter     Keep genes expressed in every sample");
    println!("  summarize  Stack correlation outputs into one table");
    println!();
    println!("Run `rust_genecorr <COMMAND> -h` for command-specific options.");
}

fn print_long_help() {
    println!("rust_genecorr v{}", VERSION);
    println!("Covariate regression and mitochondrial co-expression for expression matrices");
    println!();
    println!("Usage: rust_genecorr <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  mask       Mask outliers outside [Q1 - k*IQR, Q3 + k*IQR] (k = 3 by default)");
    println!("  regress    Regress covariates out of every gene");
    println!("               - per-gene fits on present samples only");
    println!("               - categorical encoding, standardization, mean imputation");
    println!("               - GTEx and ROSMAP presets");
    println!("               - optional Shapiro-Wilk test of residuals");
    println!("  corr       Correlate the reference panel against every gene");
    println!("               - Pearson or Spearman, pairwise-complete observations");
    println!("               - 13 mitochondrial genes, a custom panel or all genes");
    println!("  filter     Drop all-zero samples, keep genes expressed in every sample");
    println!("  summarize  Stack correlation and p-value matrices into one table");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Exit status: 0 on success, 1 on a fatal error, 2 when any input file failed.");
    println!();
    println!("Examples:");
    println!("  rust_genecorr mask -i tpm/ -p _tpm.csv -l v8");
    println!();
    println!("  rust_genecorr regress -i tpm/ -p _v8_masked_outliers.csv --preset gtex \\");
    println!("    --metadata SampleAttributesDS.txt --phenotype SubjectPhenotypesDS.txt");
    println!();
    println!("  rust_genecorr corr -i tpm/ -p _residuals.csv -m spearman --report corr.json");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn batch_config(args: &BatchArgs) -> BatchConfig {
    BatchConfig {
        input_dir: args.input_dir.clone(),
        pattern: args.pattern.clone(),
        delimiter: args.delimiter,
        output_dir: args.output_dir.clone(),
        outlabel: args.outlabel.clone(),
        threads: args.threads,
    }
}

/// Write the optional report; `Ok(false)` when any file failed
fn finish(args: &BatchArgs, report: Result<BatchReport>) -> Result<bool> {
    let report = report?;
    if let Some(path) = &args.report {
        report.write_json(path)?;
        info!("Report written to: {}", path.display());
    }
    for output in report.outputs() {
        info!("  wrote {}", output.display());
    }
    Ok(report.is_success())
}

fn run_mask_command(batch: &BatchArgs, iqr_multiplier: f64, drop_labels: Vec<String>) -> Result<bool> {
    let params = MaskParams {
        iqr_multiplier,
        drop_labels,
    };
    info!("Masking outliers beyond {} IQR", params.iqr_multiplier);
    finish(batch, run_mask(&batch_config(batch), &params))
}

fn build_covariate_config(args: &RegressArgs) -> Result<CovariateConfig> {
    let mut config = CovariateConfig {
        metadata: args.metadata.clone(),
        id_column: args.id_column.clone(),
        phenotype: args.phenotype.clone(),
        covariates: args.covariate.clone(),
        categorical: args.categorical.clone(),
        standardize: args.standardize.clone(),
        normality_test: args.normality_choice(),
        ..Default::default()
    };
    if let Some(pattern) = &args.phenotype_key {
        config.phenotype_key = IdNormalizer::new().extract(pattern)?;
    }
    if let Some(prefix) = &args.strip_prefix {
        config.sample_ids = IdNormalizer::new().strip_prefix(prefix);
    }
    if let Some(name) = &args.preset {
        let preset: CohortPreset = name.parse()?;
        preset.apply(&mut config)?;
        info!("Using {} preset", preset);
    }
    Ok(config)
}

fn gene_id_rule(args: &GeneIdArgs) -> Result<IdNormalizer> {
    if args.keep_gene_versions {
        return Ok(IdNormalizer::new());
    }
    match &args.gene_version_pattern {
        Some(pattern) => IdNormalizer::new().remove(pattern),
        None => Ok(IdNormalizer::gene_version()),
    }
}

fn reference_genes(args: &GeneIdArgs) -> Result<Vec<String>> {
    match &args.panel_file {
        Some(path) => {
            let genes = read_gene_list(path)?;
            info!("Loaded {} reference genes from {}", genes.len(), path.display());
            Ok(genes)
        }
        None => Ok(MITO_GENES.iter().map(|g| g.to_string()).collect()),
    }
}

fn run_corr_command(
    batch: &BatchArgs,
    genes: &GeneIdArgs,
    method: &str,
    all_genes: bool,
    shuffle: bool,
    seed: Option<u64>,
) -> Result<bool> {
    let method: CorrelationMethod = method.parse()?;
    let panel = if all_genes {
        RowPanel::AllGenes
    } else {
        RowPanel::Reference(reference_genes(genes)?)
    };
    let shuffle = match (shuffle, seed) {
        (false, _) => ShuffleMode::Off,
        (true, Some(seed)) => ShuffleMode::Seeded(seed),
        (true, None) => ShuffleMode::Random,
    };
    let params = CorrelationParams {
        method,
        panel,
        shuffle,
        gene_ids: gene_id_rule(genes)?,
    };
    info!("Computing {} correlations", params.method);
    finish(batch, run_correlate(&batch_config(batch), &params))
}

fn run_summarize_command(batch: &BatchArgs, genes: &GeneIdArgs) -> Result<bool> {
    let panel = reference_genes(genes)?;
    let gene_ids = gene_id_rule(genes)?;
    finish(batch, run_summarize(&batch_config(batch), &panel, &gene_ids))
}
