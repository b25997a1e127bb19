//! Per-file stage tasks and their batch drivers

use std::path::{Path, PathBuf};

use super::batch::run_batch;
use super::config::{BatchConfig, CovariateConfig};
use crate::correlation::{correlation_matrix, CorrelationParams};
use crate::data::{CovariateTable, IdNormalizer, TableAligner};
use crate::error::Result;
use crate::filter::{filter_null_genes_and_samples, mask_matrix, MaskParams};
use crate::glm::{encode_covariates, EncoderParams};
use crate::io::{
    discover_inputs, ensure_dir, read_expression_matrix, summarize_correlations, write_correlation_pair,
    write_expression_matrix, write_gene_scores, BatchReport, FileReport,
};
use crate::residuals::{residualize_matrix, ResidualParams};

/// Mask IQR outliers in one expression file
pub fn mask_file(path: &Path, batch: &BatchConfig, params: &MaskParams) -> Result<FileReport> {
    let expression = read_expression_matrix(path, batch.delimiter, &params.drop_labels)?;
    let output = mask_matrix(&expression, params)?;

    let out = batch.output_for(path, "masked_outliers.csv");
    write_expression_matrix(&out, &output.masked)?;

    let mut report = FileReport::new(path);
    report.n_samples = output.masked.n_samples();
    report.n_genes = output.masked.n_genes();
    report.n_masked = Some(output.n_masked);
    if !output.skipped_genes.is_empty() {
        report
            .warnings
            .push(format!("{} genes had too few values to mask", output.skipped_genes.len()));
    }
    report.outputs.push(out);
    Ok(report)
}

/// Drop all-zero samples and genes with any zero from one file
pub fn filter_file(path: &Path, batch: &BatchConfig) -> Result<FileReport> {
    let expression = read_expression_matrix(path, batch.delimiter, &[])?;
    let filtered = filter_null_genes_and_samples(&expression)?;

    let out = batch.output_for(path, "0filtered.csv");
    write_expression_matrix(&out, &filtered)?;

    let mut report = FileReport::new(path);
    report.n_samples = filtered.n_samples();
    report.n_genes = filtered.n_genes();
    let dropped_samples = expression.n_samples() - filtered.n_samples();
    if dropped_samples > 0 {
        report.warnings.push(format!("{} all-zero samples removed", dropped_samples));
    }
    report.outputs.push(out);
    Ok(report)
}

/// Regress covariates out of one expression file
///
/// `covariates` is loaded once per batch and shared read-only.
pub fn regress_file(
    path: &Path,
    batch: &BatchConfig,
    config: &CovariateConfig,
    covariates: &CovariateTable,
) -> Result<FileReport> {
    let expression = read_expression_matrix(path, batch.delimiter, &[])?;
    let aligner = TableAligner::new(config.sample_ids.clone(), config.covariate_ids.clone());
    let aligned = aligner.align(&expression, covariates)?;

    let design = encode_covariates(
        &aligned.covariates,
        &EncoderParams {
            standardize: config.standardize.clone(),
        },
    )?;
    let output = residualize_matrix(
        &aligned.expression,
        &design,
        &ResidualParams {
            normality_test: config.normality_test.unwrap_or(false),
        },
    )?;

    let mut report = FileReport::new(path);
    let out = batch.output_for(path, "residuals.csv");
    write_expression_matrix(&out, &output.residuals)?;
    report.outputs.push(out);

    if let Some(pvals) = &output.normality {
        let out = batch.output_for(path, "shapiro.csv");
        write_gene_scores(&out, output.residuals.gene_ids(), "shapiro_pval", pvals)?;
        report.outputs.push(out);
    }

    report.n_samples = output.residuals.n_samples();
    report.n_genes = output.residuals.n_genes();
    if !aligned.dropped_samples.is_empty() {
        report.warnings.push(format!(
            "{} samples without covariates were dropped",
            aligned.dropped_samples.len()
        ));
    }
    report.degenerate_genes = output.issues;
    Ok(report)
}

/// Correlate the reference panel against every gene of one file
pub fn correlate_file(path: &Path, batch: &BatchConfig, params: &CorrelationParams) -> Result<FileReport> {
    let expression = read_expression_matrix(path, batch.delimiter, &[])?;
    let output = correlation_matrix(&expression, params)?;

    let corr_path = batch.output_for(path, &format!("{}_corrs.csv", params.method));
    let pval_path = batch.output_for(path, &format!("{}_pvals.csv", params.method));
    write_correlation_pair(&corr_path, &pval_path, &output.pair)?;

    let mut report = FileReport::new(path);
    report.n_samples = expression.n_samples();
    report.n_genes = expression.n_genes();
    if !output.unmatched_panel.is_empty() {
        report.warnings.push(format!(
            "reference genes not found: {}",
            output.unmatched_panel.join(", ")
        ));
    }
    let undefined = output.pair.n_undefined();
    if undefined > 0 {
        report.warnings.push(format!("{} correlations undefined", undefined));
    }
    report.outputs.push(corr_path);
    report.outputs.push(pval_path);
    Ok(report)
}

fn prepare(batch: &BatchConfig) -> Result<Vec<PathBuf>> {
    let files = batch.discover()?;
    ensure_dir(batch.output_dir())?;
    Ok(files)
}

pub fn run_mask(batch: &BatchConfig, params: &MaskParams) -> Result<BatchReport> {
    let files = prepare(batch)?;
    run_batch("mask", &files, batch.threads, |path| mask_file(path, batch, params))
}

pub fn run_filter(batch: &BatchConfig) -> Result<BatchReport> {
    let files = prepare(batch)?;
    run_batch("filter", &files, batch.threads, |path| filter_file(path, batch))
}

/// Residualise every file; a covariate load failure aborts the batch
pub fn run_regress(batch: &BatchConfig, config: &CovariateConfig) -> Result<BatchReport> {
    let files = prepare(batch)?;
    let covariates = config.load()?;
    run_batch("regress", &files, batch.threads, |path| {
        regress_file(path, batch, config, &covariates)
    })
}

pub fn run_correlate(batch: &BatchConfig, params: &CorrelationParams) -> Result<BatchReport> {
    let files = prepare(batch)?;
    run_batch("corr", &files, batch.threads, |path| correlate_file(path, batch, params))
}

/// Stack every correlation output under `batch.input_dir` into one table
///
/// Written to `{output_dir}/{outlabel}summary_table.csv`.
pub fn run_summarize(batch: &BatchConfig, panel: &[String], gene_ids: &IdNormalizer) -> Result<BatchReport> {
    let files = discover_inputs(&batch.input_dir, &batch.pattern)?;
    ensure_dir(batch.output_dir())?;
    let table = summarize_correlations(&files, panel, gene_ids)?;

    let out = batch.output_dir().join(format!("{}summary_table.csv", batch.outlabel));
    table.write_csv(&out)?;

    let mut report = BatchReport::new("summarize");
    let mut file_report = FileReport::new(&batch.input_dir);
    file_report.n_genes = table.keys.len();
    file_report.outputs.push(out);
    report.succeeded.push(file_report);
    report.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn batch_in(dir: &Path, pattern: &str) -> BatchConfig {
        BatchConfig {
            input_dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
            outlabel: "t".to_string(),
            threads: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_mask_file_writes_masked_copy() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("liver_tpm.csv");
        let mut text = String::from(",g1,g2,g3,g4,g5,g6,g7,g8,brain_region\n");
        for i in 0..6 {
            let g1 = if i == 5 { 1000.0 } else { i as f64 };
            let rest: Vec<String> = (2..=8).map(|j| format!("{}", i + j)).collect();
            text.push_str(&format!("s{},{},{},cortex\n", i, g1, rest.join(",")));
        }
        std::fs::write(&input, text).unwrap();

        let batch = batch_in(dir.path(), "_tpm.csv");
        let report = mask_file(&input, &batch, &MaskParams::default()).unwrap();
        assert_eq!(report.n_masked, Some(1));
        assert_eq!((report.n_samples, report.n_genes), (6, 8));
        assert_eq!(report.outputs[0], dir.path().join("liver_t_masked_outliers.csv"));

        let written = read_expression_matrix(&report.outputs[0], None, &[]).unwrap();
        assert!(written.gene_values(0)[5].is_nan());
        assert_eq!(written.n_missing(), 1);
    }

    #[test]
    fn test_correlate_file_outputs_pair() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("lung_res.csv");
        let mut text = String::from(",ENSG00000198888.2,ENSG1.1,ENSG2.5,ENSG3.1,ENSG4.1\n");
        for i in 0..4 {
            let f = i as f64;
            text.push_str(&format!("s{},{},{},{},{},{}\n", i, f, 2.0 * f + 1.0, (f * 1.7).sin(), f * f, -f));
        }
        std::fs::write(&input, text).unwrap();

        let batch = batch_in(dir.path(), "_res.csv");
        let report = correlate_file(&input, &batch, &CorrelationParams::default()).unwrap();
        assert_eq!(report.outputs.len(), 2);
        assert!(report.outputs[0].ends_with("lung_t_pearson_corrs.csv"));
        assert!(report.outputs[1].ends_with("lung_t_pearson_pvals.csv"));
        assert!(report.warnings[0].contains("reference genes not found"));

        let corrs = crate::io::read_labelled_matrix(&report.outputs[0], None, &[]).unwrap();
        assert_eq!(corrs.row_labels, vec!["ENSG00000198888"]);
        assert_eq!(corrs.col_labels, vec!["ENSG00000198888", "ENSG1", "ENSG2", "ENSG3", "ENSG4"]);
        assert!((corrs.values[[0, 1]] - 1.0).abs() < 1e-12);
        assert!((corrs.values[[0, 4]] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_filter_file_drops_zero_genes() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a_x.csv");
        std::fs::write(&input, ",g1,g2,g3,g4\ns1,1,0,2,3\ns2,2,3,1,1\ns3,0,0,0,0\n").unwrap();
        let report = filter_file(&input, &batch_in(dir.path(), "_x.csv")).unwrap();
        assert_eq!((report.n_samples, report.n_genes), (2, 3));
        assert!(report.outputs[0].ends_with("a_t_0filtered.csv"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_run_regress_writes_residuals_and_shapiro() {
        let dir = tempdir().unwrap();
        let meta = dir.path().join("meta.txt");
        std::fs::write(&meta, "id,age,batch\nA1,30,x\nA2,41,y\nA3,52,x\nA4,38,y\nA5,60,x\nA6,45,y\n").unwrap();

        let mut text = String::from(",g1,g2,g3,g4,g5,g6,g7\n");
        for i in 0..6 {
            let row: Vec<String> = (1..=7).map(|j| format!("{}", ((i * j) % 5) as f64 + 0.1 * j as f64)).collect();
            text.push_str(&format!("XA{},{}\n", i + 1, row.join(",")));
        }
        std::fs::write(dir.path().join("brain_tpm.csv"), text).unwrap();

        let out_dir = dir.path().join("out");
        let batch = BatchConfig {
            output_dir: Some(out_dir.clone()),
            ..batch_in(dir.path(), "_tpm.csv")
        };
        let config = CovariateConfig {
            metadata: meta,
            sample_ids: IdNormalizer::new().strip_prefix("X"),
            normality_test: Some(true),
            ..Default::default()
        };

        let report = run_regress(&batch, &config).unwrap();
        assert!(report.is_success());
        let file = &report.succeeded[0];
        assert_eq!((file.n_samples, file.n_genes), (6, 7));
        assert_eq!(file.outputs[0], out_dir.join("brain_t_residuals.csv"));
        assert_eq!(file.outputs[1], out_dir.join("brain_t_shapiro.csv"));

        let shapiro = std::fs::read_to_string(&file.outputs[1]).unwrap();
        assert!(shapiro.starts_with("gene,shapiro_pval"));
        let residuals = read_expression_matrix(&file.outputs[0], None, &[]).unwrap();
        assert_eq!(residuals.sample_ids()[0], "XA1");
        for j in 0..residuals.n_genes() {
            let sum: f64 = residuals.gene_values(j).iter().sum();
            assert!(sum.abs() < 1e-9);
        }
    }
}
