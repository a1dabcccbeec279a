//! Text Output
//!
//! Markdown table and plain per-variant lines. Variants without metrics are
//! left out of both.

use crate::report::Report;

/// Generate the Markdown comparison table
///
/// ```text
/// | variant | average | min | max |
/// |---------|---------|-----|-----|
/// | handlebars-6 | 12.34 | 11.90 | 13.02 |
/// ```
pub fn generate_markdown_table(report: &Report) -> String {
    let mut output = String::new();
    output.push_str("| variant | average | min | max |\n");
    output.push_str("|---------|---------|-----|-----|\n");

    for result in &report.results {
        if let Some(metrics) = &result.metrics {
            output.push_str(&format!(
                "| {} | {:.2} | {:.2} | {:.2} |\n",
                result.label, metrics.average_ms, metrics.min_ms, metrics.max_ms
            ));
        }
    }

    output
}

/// Generate one `Average total precompile time using <label> <ms>` line per
/// variant
pub fn generate_lines(report: &Report) -> String {
    report
        .results
        .iter()
        .filter_map(|result| {
            result.metrics.as_ref().map(|metrics| {
                format!(
                    "Average total precompile time using {} {}\n",
                    result.label, metrics.average_ms
                )
            })
        })
        .collect()
}
