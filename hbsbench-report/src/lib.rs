#![warn(missing_docs)]
//! hbsbench Report - Rendering
//!
//! Generates the output formats of a comparison run:
//! - Markdown table (default, one row per compiler variant)
//! - Plain lines (one average per variant)
//! - JSON (machine-readable, with run metadata)

mod json;
mod report;
mod table;

pub use json::generate_json_report;
pub use report::{
    MissingSample, Report, ReportConfig, ReportMeta, SystemInfo, VariantMetrics, VariantResult,
};
pub use table::{generate_lines, generate_markdown_table};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Markdown table of average/min/max
    #[default]
    Table,
    /// `Average total precompile time using <label> <ms>` per variant
    Lines,
    /// JSON with full metadata
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "markdown" | "md" => Ok(OutputFormat::Table),
            "lines" | "text" => Ok(OutputFormat::Lines),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => f.write_str("table"),
            OutputFormat::Lines => f.write_str("lines"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}
