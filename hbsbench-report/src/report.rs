//! Report Data Structures

use chrono::{DateTime, Utc};
use hbsbench_stats::TimingSummary;
use serde::{Deserialize, Serialize};

/// Complete comparison report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Run metadata
    pub meta: ReportMeta,
    /// One entry per compiler, in registration order
    pub results: Vec<VariantResult>,
    /// Repetitions without a sample
    pub missing_samples: Vec<MissingSample>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// hbsbench version
    pub version: String,
    /// When the report was built
    pub timestamp: DateTime<Utc>,
    /// Commit of the working directory, if any
    pub git_commit: Option<String>,
    /// Branch of the working directory, if any
    pub git_branch: Option<String>,
    /// Host description
    pub system: SystemInfo,
    /// Effective run settings
    pub config: ReportConfig,
}

/// Run configuration captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Timed batches per compiler
    pub repetitions: usize,
    /// Isolation mode
    pub isolation: String,
    /// Concurrent isolated workers
    pub jobs: usize,
    /// Templates in the corpus
    pub templates: usize,
    /// Corpus size in bytes
    pub template_bytes: usize,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system
    pub os: String,
    /// Kernel or OS release
    pub os_version: String,
    /// CPU model
    pub cpu: String,
    /// Logical CPUs
    pub cpu_cores: u32,
    /// Total memory
    pub memory_gb: f64,
}

/// One compiler variant in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantResult {
    /// Compiler label
    pub label: String,
    /// Package name
    pub package: String,
    /// Package version
    pub version: String,
    /// Package family
    pub family: String,
    /// Raw samples in collection order (milliseconds)
    pub samples: Vec<f64>,
    /// `None` when every repetition failed
    pub metrics: Option<VariantMetrics>,
}

/// Timing metrics in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantMetrics {
    /// Samples summarized
    pub samples: usize,
    /// Mean batch time
    pub average_ms: f64,
    /// Fastest batch
    pub min_ms: f64,
    /// Slowest batch
    pub max_ms: f64,
    /// Median batch time
    pub median_ms: f64,
    /// Sample standard deviation
    pub std_dev_ms: f64,
}

impl From<&TimingSummary> for VariantMetrics {
    fn from(summary: &TimingSummary) -> Self {
        Self {
            samples: summary.samples,
            average_ms: summary.average,
            min_ms: summary.min,
            max_ms: summary.max,
            median_ms: summary.median,
            std_dev_ms: summary.std_dev,
        }
    }
}

/// A repetition that produced no sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingSample {
    /// Compiler label
    pub label: String,
    /// Zero-based repetition index
    pub repetition: usize,
    /// Why no sample was recorded
    pub reason: String,
}
