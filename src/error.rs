//! Error types for rust_genecorr

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid expression matrix: {reason}")]
    InvalidMatrix { reason: String },

    #[error("Invalid covariate table: {reason}")]
    InvalidCovariates { reason: String },

    /// No usable overlap between expression samples and covariate rows
    #[error("Sample alignment failed: {reason}")]
    Alignment { reason: String },

    /// Expected columns or marker genes are absent
    #[error("Schema error: {reason}")]
    Schema { reason: String },

    /// Too few observations for a per-gene computation
    #[error("Degenerate gene {gene_id}: {reason}")]
    DegenerateGene { gene_id: String, reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid identifier pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl PipelineError {
    /// Attach a path to an I/O failure
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
