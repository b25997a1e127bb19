//! Per-gene filters applied before regression and correlation

mod null;
mod outliers;

pub use null::filter_null_genes_and_samples;
pub use outliers::{iqr_bounds, mask_matrix, mask_outliers, mask_with_bounds, MaskOutput, MaskParams};
