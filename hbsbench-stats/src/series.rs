//! Timing Series
//!
//! Ordered samples for one compiler variant across repetitions.

use crate::summary::{TimingSummary, compute_summary};

/// Samples (milliseconds) for one compiler label, in collection order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingSeries {
    label: String,
    samples: Vec<f64>,
}

impl TimingSeries {
    /// Empty series for `label`
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            samples: Vec::new(),
        }
    }

    /// Series pre-filled with `samples`
    pub fn with_samples(label: impl Into<String>, samples: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            samples,
        }
    }

    /// Compiler label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Append one sample
    pub fn push(&mut self, elapsed_ms: f64) {
        self.samples.push(elapsed_ms);
    }

    /// Samples in collection order
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample was collected
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Arithmetic mean
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
        }
    }

    /// Smallest sample
    pub fn min(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::min)
    }

    /// Largest sample
    pub fn max(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }

    /// Full summary, `None` for an empty series
    pub fn summary(&self) -> Option<TimingSummary> {
        compute_summary(&self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_min_max() {
        let series = TimingSeries::with_samples("handlebars-6", vec![10.0, 20.0, 30.0]);
        assert_eq!(series.average(), Some(20.0));
        assert_eq!(series.min(), Some(10.0));
        assert_eq!(series.max(), Some(30.0));
    }

    #[test]
    fn test_order_preserved() {
        let mut series = TimingSeries::new("x");
        series.push(3.0);
        series.push(1.0);
        series.push(2.0);
        assert_eq!(series.samples(), &[3.0, 1.0, 2.0]);
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_empty_series() {
        let series = TimingSeries::new("empty");
        assert!(series.is_empty());
        assert_eq!(series.average(), None);
        assert_eq!(series.min(), None);
        assert_eq!(series.max(), None);
        assert!(series.summary().is_none());
    }
}
