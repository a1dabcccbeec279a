//! Summary Statistics
//!
//! Every value is computed from all samples; there is no outlier rejection,
//! repeated compile batches are few and each one matters.

use crate::percentiles::compute_percentile;

/// Reduced view of a non-empty timing series (milliseconds)
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSummary {
    /// Arithmetic mean
    pub average: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// 50th percentile
    pub median: f64,
    /// Sample standard deviation, 0 for a single sample
    pub std_dev: f64,
    /// Number of samples
    pub samples: usize,
}

/// Compute a summary; `None` when `samples` is empty
pub fn compute_summary(samples: &[f64]) -> Option<TimingSummary> {
    if samples.is_empty() {
        return None;
    }

    let n = samples.len();
    let average = samples.iter().sum::<f64>() / n as f64;

    let min = samples
        .iter()
        .cloned()
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0);
    let max = samples
        .iter()
        .cloned()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0);

    let std_dev = if n < 2 {
        0.0
    } else {
        let variance = samples.iter().map(|x| (x - average).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };

    Some(TimingSummary {
        average,
        min,
        max,
        median: compute_percentile(samples, 50.0),
        std_dev,
        samples: n,
    })
}
