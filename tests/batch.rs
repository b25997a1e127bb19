//! End-to-end batch runs over a directory of expression files

use std::fs;
use std::path::Path;

use rust_genecorr::io::read_labelled_matrix;
use rust_genecorr::prelude::*;
use tempfile::tempdir;

const GENES: [&str; 12] = [
    "ENSG00000198888.2",
    "ENSG00000198763.3",
    "ENSG00000000001.1",
    "ENSG00000000002.4",
    "ENSG00000000003.1",
    "ENSG00000000004.9",
    "ENSG00000000005.1",
    "ENSG00000000006.2",
    "ENSG00000000007.1",
    "ENSG00000000008.3",
    "ENSG00000000009.1",
    "ENSG00000000010.1",
];

fn write_expression(path: &Path, n_samples: usize, shift: f64) {
    let mut text = String::from("gene_id");
    for i in 0..n_samples {
        text.push_str(&format!(",S{}", i));
    }
    text.push('\n');
    // More genes than samples, so the reader puts genes on the columns
    for (j, gene) in GENES.iter().enumerate() {
        text.push_str(gene);
        for i in 0..n_samples {
            let f = i as f64;
            let v = match j {
                0 => 10.0 + f + shift,
                1 => 5.0 + 0.5 * f + (f * 1.1).sin(),
                2 => 20.0 - f,
                3 => 1.0 + (f * 0.7).cos(),
                4 => (f * f) % 7.0 + 1.0,
                5 => 3.0 + f * 0.25,
                _ => 2.0 + j as f64 + (f * 0.37 * j as f64).sin(),
            };
            text.push_str(&format!(",{}", v));
        }
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

fn batch(dir: &Path, pattern: &str) -> BatchConfig {
    BatchConfig {
        input_dir: dir.to_path_buf(),
        pattern: pattern.to_string(),
        outlabel: "run".to_string(),
        threads: 2,
        ..Default::default()
    }
}

#[test]
fn malformed_file_does_not_stop_the_batch() {
    let dir = tempdir().unwrap();
    write_expression(&dir.path().join("a_tpm.csv"), 8, 0.0);
    fs::write(
        dir.path().join("b_tpm.csv"),
        "gene_id,S0,S1\nENSG00000198888.2,1.0,oops\n",
    )
    .unwrap();
    write_expression(&dir.path().join("c_tpm.csv"), 8, 2.0);

    let report = run_correlate(&batch(dir.path(), "_tpm.csv"), &CorrelationParams::default()).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].input.ends_with("b_tpm.csv"));

    for base in ["a", "c"] {
        let corrs = dir.path().join(format!("{}_run_pearson_corrs.csv", base));
        let pvals = dir.path().join(format!("{}_run_pearson_pvals.csv", base));
        assert!(pvals.exists());
        let matrix = read_labelled_matrix(&corrs, None, &[]).unwrap();
        assert_eq!(matrix.row_labels, vec!["ENSG00000198888", "ENSG00000198763"]);
        assert_eq!(matrix.col_labels.len(), GENES.len());
        // gene 0 and gene 2 are exact opposites
        assert!((matrix.values[[0, 2]] + 1.0).abs() < 1e-12);
    }
    assert!(!dir.path().join("b_run_pearson_corrs.csv").exists());
}

#[test]
fn mask_regress_correlate_summarize() {
    let dir = tempdir().unwrap();
    let tpm = dir.path().join("tpm");
    fs::create_dir(&tpm).unwrap();
    write_expression(&tpm.join("liver_tpm.csv"), 10, 0.0);
    write_expression(&tpm.join("lung_tpm.csv"), 10, 1.0);

    let meta = dir.path().join("meta.csv");
    let mut text = String::from("sample,rin,center\n");
    for i in 0..10 {
        let center = if i % 2 == 0 { "B1" } else { "C1" };
        text.push_str(&format!("S{},{},{}\n", i, 6.0 + (i % 3) as f64 * 0.5, center));
    }
    fs::write(&meta, text).unwrap();

    let out = dir.path().join("out");

    let masked = run_mask(
        &BatchConfig {
            output_dir: Some(out.clone()),
            ..batch(&tpm, "_tpm.csv")
        },
        &MaskParams::default(),
    )
    .unwrap();
    assert!(masked.is_success());
    assert_eq!(masked.succeeded[0].n_masked, Some(0));

    let config = CovariateConfig {
        metadata: meta,
        normality_test: Some(true),
        ..Default::default()
    };
    let regressed = run_regress(&batch(&out, "_run_masked_outliers.csv"), &config).unwrap();
    assert!(regressed.is_success());
    assert_eq!(regressed.succeeded.len(), 2);
    assert!(out.join("liver_run_residuals.csv").exists());
    assert!(out.join("lung_run_shapiro.csv").exists());

    let correlated = run_correlate(&batch(&out, "_run_residuals.csv"), &CorrelationParams::default()).unwrap();
    assert!(correlated.is_success());
    assert!(out.join("liver_run_pearson_corrs.csv").exists());

    let panel: Vec<String> = MITO_GENES.iter().map(|g| g.to_string()).collect();
    let summary = run_summarize(
        &BatchConfig {
            outlabel: "all_".to_string(),
            ..batch(&out, "pearson")
        },
        &panel,
        &IdNormalizer::gene_version(),
    )
    .unwrap();
    let table_path = &summary.succeeded[0].outputs[0];
    assert_eq!(table_path, &out.join("all_summary_table.csv"));

    let table = fs::read_to_string(table_path).unwrap();
    let header = table.lines().next().unwrap();
    assert_eq!(
        header,
        "ref_gene,gene,liver_run_pearson_corrscorr,lung_run_pearson_corrscorr,\
         liver_run_pearson_pvalspval,lung_run_pearson_pvalspval"
    );
    // 2 panel genes x 12 genes
    assert_eq!(table.lines().count(), 1 + 2 * GENES.len());
}

#[test]
fn regress_fails_whole_run_on_missing_covariate() {
    let dir = tempdir().unwrap();
    write_expression(&dir.path().join("a_tpm.csv"), 6, 0.0);
    let meta = dir.path().join("meta.csv");
    fs::write(&meta, "sample,rin\nS0,7\nS1,6\n").unwrap();

    let config = CovariateConfig {
        metadata: meta,
        covariates: vec!["pmi".to_string()],
        ..Default::default()
    };
    let err = run_regress(&batch(dir.path(), "_tpm.csv"), &config).unwrap_err();
    assert!(matches!(err, PipelineError::Schema { .. }));
}
