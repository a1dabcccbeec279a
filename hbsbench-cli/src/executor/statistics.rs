//! Statistics Computation
//!
//! Summaries are computed per series in parallel with Rayon. Empty series
//! (every repetition failed) get no summary.

use hbsbench_stats::{TimingSeries, TimingSummary};
use rayon::prelude::*;

/// Compute `(label, summary)` for each series, in series order
pub fn compute_statistics(series: &[TimingSeries]) -> Vec<(String, Option<TimingSummary>)> {
    series
        .par_iter()
        .map(|s| (s.label().to_string(), s.summary()))
        .collect()
}
