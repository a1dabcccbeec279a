//! Measurement Runner
//!
//! Compiles a whole template set with one compiler and times the batch.
//! The set is drained as it goes so a large corpus is never held twice.

use crate::compilers::{CompileError, CompileOptions, CompilerDescriptor, ParseOptions};
use crate::measure::Timer;
use crate::templates::TemplateSet;
use std::hint::black_box;
use thiserror::Error;

/// A compile batch aborted on its first failing template
#[derive(Debug, Error)]
#[error("{label} failed to compile {path}: {source}")]
pub struct RunError {
    /// Compiler label
    pub label: String,
    /// Relative path of the failing template
    pub path: String,
    /// Compiler error
    #[source]
    pub source: CompileError,
}

/// One timing sample
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Compiler label
    pub label: String,
    /// Wall-clock time for the whole batch in milliseconds
    pub elapsed_ms: f64,
    /// Number of templates compiled
    pub templates: usize,
}

/// Compile every template in `templates`, removing each one as it is processed.
///
/// Templates are compiled one at a time in the order they are popped. The
/// first failure aborts the batch; templates not yet reached stay in the set.
pub fn compile_templates(
    compiler: &CompilerDescriptor,
    templates: &mut TemplateSet,
) -> Result<usize, RunError> {
    let mut compiled = 0;
    while let Some(record) = templates.pop() {
        let options = (compiler.build_options)(CompileOptions {
            contents: record.content,
            module_name: record.relative_path.clone(),
            parse_options: ParseOptions {
                src_name: record.relative_path.clone(),
            },
            strict_mode: false,
        });

        let output = (compiler.compile)(&options.contents, &options).map_err(|e| RunError {
            label: compiler.label.clone(),
            path: record.relative_path,
            source: e,
        })?;
        black_box(output);
        compiled += 1;
    }
    Ok(compiled)
}

/// Time one full compile batch, consuming the template set
pub fn measure(
    compiler: &CompilerDescriptor,
    mut templates: TemplateSet,
) -> Result<Measurement, RunError> {
    let timer = Timer::start();
    let compiled = compile_templates(compiler, &mut templates)?;
    let elapsed_ms = timer.elapsed_ms();

    Ok(Measurement {
        label: compiler.label.clone(),
        elapsed_ms,
        templates: compiled,
    })
}
