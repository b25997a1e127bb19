//! Linear models: covariate encoding and ordinary least squares

mod design;
mod ols;

pub use design::{check_full_rank, encode_covariates, DesignMatrix, EncoderParams};
pub use ols::QrFactorization;
