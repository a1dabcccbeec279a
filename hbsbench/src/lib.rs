#![warn(missing_docs)]
//! # hbsbench
//!
//! Compile-time comparison of Handlebars template compilers.
//!
//! hbsbench loads every template under `templates/**/*.hbs`, compiles the
//! whole set with each registered compiler variant and reports the average,
//! minimum and maximum batch time per variant:
//! - **Process Isolation**: each repetition runs in its own worker process by default
//! - **Compiler Registry**: framework compilers and low-level compilers that borrow an options builder
//! - **Profiling**: CPU profiles and heap snapshots of a single batch
//! - **Reports**: markdown table, plain lines or JSON with run metadata
//!
//! ## Quick Start
//!
//! ```ignore
//! use hbsbench::{CompilerRegistry, Executor, TemplateSource};
//!
//! let registry = CompilerRegistry::from_manifest(
//!     &Manifest::all(&installed_packages()),
//!     &installed_packages(),
//! )?;
//! let result = Executor::new(".", TemplateSource::default(), 5).execute(&registry)?;
//! ```

// Re-export core types
pub use hbsbench_core::{
    CompileError, CompileOptions, CompilerDescriptor, CompilerFamily, CompilerRegistry, Manifest,
    Measurement, TemplateSet, TemplateSource, installed_packages, load_templates, measure,
};

// Re-export the runners
pub use hbsbench_cli::{
    ExecutionResult, Executor, HbsConfig, IsolatedExecutor, IsolationMode, Supervisor,
};

// Re-export profiling
pub use hbsbench_profile::{CpuProfile, HeapSnapshot, Profiler, TrackingAllocator};

// Re-export reporting
pub use hbsbench_report::{OutputFormat, Report, generate_markdown_table};
pub use hbsbench_stats::{TimingSeries, TimingSummary, compute_summary};
