//! Statistical tests used by the pipeline stages

mod normality;
mod pvalue;

pub use normality::{shapiro_wilk, ShapiroWilk};
pub use pvalue::{calculate_pvalue_t, normal_quantile, normal_upper_tail};
