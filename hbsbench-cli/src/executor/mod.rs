//! Comparison Executor
//!
//! Runs every registered compiler the configured number of times and turns
//! the samples into a report. Supports both in-process execution and
//! out-of-process execution via supervisor-worker IPC.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CompilerRegistry (from the manifest)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Repeated timed batches, one TimingSeries per label
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ statistics  │  average/min/max (+ median, std-dev)
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   report    │  Report with run metadata
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - In-process and isolated execution
//! - [`statistics`] - Per-series summaries
//! - [`report`] - Report building
//! - [`metadata`] - System metadata collection

mod execution;
mod metadata;
mod report;
mod statistics;

pub use execution::{ExecutionResult, Executor, IsolatedExecutor, progress_bar};
pub use metadata::build_report_meta;
pub use report::build_report;
pub use statistics::compute_statistics;
