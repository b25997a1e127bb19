//! Data structures for expression matrices and covariates

mod align;
mod covariates;
mod expression_matrix;
mod ids;

pub use align::{AlignedTables, TableAligner};
pub use covariates::{infer_kind, is_missing_token, ColumnKind, CovariateSchema, CovariateTable, MISSING_TOKENS};
pub(crate) use covariates::parse_numeric_cell;
pub use expression_matrix::ExpressionMatrix;
pub use ids::{IdNormalizer, GENE_VERSION_PATTERN};
