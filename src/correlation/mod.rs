//! Pairwise-complete correlation matrices against a row gene panel

mod engine;
mod pairwise;
mod panel;

pub use engine::{correlation_matrix, CorrelationMatrixPair, CorrelationOutput, CorrelationParams};
pub use pairwise::{correlation_pvalue, pairwise_complete, pearson_r, CorrelationMethod, PairCorrelation};
pub use panel::{RowPanel, ShuffleMode, MITO_GENES};
