//! Report Building
//!
//! Joins the registry (package, version, family), the collected series and
//! their summaries into a [`Report`].

use super::execution::ExecutionResult;
use super::metadata::build_report_meta;
use hbsbench_core::CompilerRegistry;
use hbsbench_report::{Report, ReportConfig, VariantMetrics, VariantResult};
use hbsbench_stats::TimingSummary;

/// Build a complete Report from execution results
pub fn build_report(
    registry: &CompilerRegistry,
    execution: &ExecutionResult,
    stats: &[(String, Option<TimingSummary>)],
    config: ReportConfig,
) -> Report {
    let results = registry
        .iter()
        .map(|compiler| {
            let samples = execution
                .series
                .iter()
                .find(|s| s.label() == compiler.label)
                .map(|s| s.samples().to_vec())
                .unwrap_or_default();
            let metrics = stats
                .iter()
                .find(|(label, _)| *label == compiler.label)
                .and_then(|(_, summary)| summary.as_ref())
                .map(VariantMetrics::from);

            if metrics.is_none() {
                tracing::warn!(label = %compiler.label, "no samples collected; left out of the table");
            }

            VariantResult {
                label: compiler.label.clone(),
                package: compiler.package.clone(),
                version: compiler.version.clone(),
                family: compiler.family.to_string(),
                samples,
                metrics,
            }
        })
        .collect();

    Report {
        meta: build_report_meta(config),
        results,
        missing_samples: execution.missing.clone(),
    }
}
