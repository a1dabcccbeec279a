#![warn(missing_docs)]
//! hbsbench Statistics
//!
//! Reduces the per-variant timing samples collected across repetitions:
//! - Average, minimum and maximum (the reported columns)
//! - Median and sample standard deviation (machine-readable output)

mod percentiles;
mod series;
mod summary;

pub use percentiles::compute_percentile;
pub use series::TimingSeries;
pub use summary::{TimingSummary, compute_summary};
