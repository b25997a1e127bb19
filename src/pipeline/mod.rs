//! Batch stages: discover inputs, run one task per file, collect a report

mod batch;
mod config;
mod stages;

pub use batch::{run_batch, worker_count};
pub use config::{BatchConfig, CohortPreset, CovariateConfig, GTEX_COVARIATES, ROSMAP_COVARIATES};
pub use stages::{
    correlate_file, filter_file, mask_file, regress_file, run_correlate, run_filter, run_mask, run_regress,
    run_summarize,
};
