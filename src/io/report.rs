//! Per-run reports of succeeded and failed files

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::residuals::GeneIssue;

/// Outcome of one successfully processed file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub outputs: Vec<PathBuf>,
    pub n_samples: usize,
    pub n_genes: usize,
    /// Cells masked by the outlier stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_masked: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub degenerate_genes: Vec<GeneIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

impl FileReport {
    pub fn new<P: AsRef<Path>>(input: P) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}

/// A file whose task returned an error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub input: PathBuf,
    pub error: String,
}

/// Collected outcome of a batch stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub stage: String,
    pub succeeded: Vec<FileReport>,
    pub failed: Vec<FileFailure>,
}

impl BatchReport {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// True when no file failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Every output written by the stage
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.succeeded.iter().flat_map(|r| r.outputs.iter())
    }

    /// Log a one-line summary plus each failure
    pub fn log_summary(&self) {
        log::info!(
            "{}: {} files succeeded, {} failed",
            self.stage,
            self.succeeded.len(),
            self.failed.len()
        );
        for failure in &self.failed {
            log::error!("{}: {}", failure.input.display(), failure.error);
        }
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}
