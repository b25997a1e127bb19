//! Input/Output: delimited tables, file discovery and run reports

mod csv;
mod discovery;
mod report;
mod summary;

pub use self::csv::{
    detect_delimiter, read_covariate_table, read_expression_matrix, read_gene_list, read_labelled_matrix,
    write_correlation_pair, write_expression_matrix, write_gene_scores, write_matrix, LabelledMatrix,
};
pub use discovery::{base_name, discover_inputs, ensure_dir, output_path};
pub use report::{BatchReport, FileFailure, FileReport};
pub use summary::{summarize_correlations, MatrixKind, SummaryTable};
