//! Comparison Execution
//!
//! ## Execution Modes
//!
//! - **In-process (`Executor`)**: every repetition runs in this process. A
//!   fresh template set is loaded per repetition because a batch consumes
//!   its set. A load or compile failure aborts the run.
//!
//! - **Isolated (`IsolatedExecutor`)**: one `hbsbench measure` worker per
//!   compiler and repetition. The sample is read back from the worker's
//!   result file. A worker that fails or crashes, or leaves no readable
//!   result file, only loses its own sample; the comparison continues.
//!
//! Both produce one [`TimingSeries`] per registered compiler, in
//! registration order.

use crate::supervisor::{Supervisor, SupervisorError, WorkerJob, WorkerOutcome};
use crate::worker::parse_elapsed;
use anyhow::Context;
use hbsbench_core::{CompilerRegistry, TemplateSource, load_templates, measure};
use hbsbench_report::MissingSample;
use hbsbench_stats::TimingSeries;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Samples collected for one run
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// One series per compiler, in registration order
    pub series: Vec<TimingSeries>,
    /// Repetitions that produced no sample
    pub missing: Vec<MissingSample>,
}

impl ExecutionResult {
    fn for_registry(registry: &CompilerRegistry) -> Self {
        Self {
            series: registry
                .iter()
                .map(|d| TimingSeries::new(d.label.clone()))
                .collect(),
            missing: Vec::new(),
        }
    }

    fn record(&mut self, label: &str, elapsed_ms: f64) {
        if let Some(series) = self.series.iter_mut().find(|s| s.label() == label) {
            series.push(elapsed_ms);
        }
    }

    fn record_missing(&mut self, label: &str, repetition: usize, reason: String) {
        self.missing.push(MissingSample {
            label: label.to_string(),
            repetition,
            reason,
        });
    }
}

/// Progress bar on stderr counting finished batches
pub fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Run every repetition in-process
pub struct Executor {
    base: PathBuf,
    source: TemplateSource,
    repetitions: usize,
}

impl Executor {
    /// Executor loading `source` relative to `base`
    pub fn new(base: impl Into<PathBuf>, source: TemplateSource, repetitions: usize) -> Self {
        Self {
            base: base.into(),
            source,
            repetitions,
        }
    }

    /// Measure every registered compiler `repetitions` times
    pub fn execute(&self, registry: &CompilerRegistry) -> anyhow::Result<ExecutionResult> {
        let mut result = ExecutionResult::for_registry(registry);
        let pb = progress_bar((registry.len() * self.repetitions) as u64);

        for compiler in registry.iter() {
            pb.set_message(compiler.label.clone());
            for repetition in 0..self.repetitions {
                let templates = load_templates(&self.base, &self.source)?;
                let measurement = measure(compiler, templates)?;
                tracing::debug!(
                    label = %compiler.label,
                    repetition,
                    elapsed_ms = measurement.elapsed_ms,
                    "measured"
                );
                result.record(&compiler.label, measurement.elapsed_ms);
                pb.inc(1);
            }
        }

        pb.finish_with_message("Complete");
        Ok(result)
    }
}

/// Run every repetition in its own worker process
pub struct IsolatedExecutor {
    supervisor: Supervisor,
    repetitions: usize,
    run_dir: PathBuf,
}

impl IsolatedExecutor {
    /// Executor whose workers write result files into `run_dir`
    pub fn new(supervisor: Supervisor, repetitions: usize, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            supervisor,
            repetitions,
            run_dir: run_dir.into(),
        }
    }

    /// Directory receiving `<label>-<repetition>.txt` files
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// One job per compiler and repetition, compiler-major
    pub fn job_plan(&self, registry: &CompilerRegistry) -> Vec<WorkerJob> {
        registry
            .iter()
            .flat_map(|compiler| {
                (0..self.repetitions).map(move |repetition| WorkerJob {
                    label: compiler.label.clone(),
                    repetition,
                    output: self
                        .run_dir
                        .join(format!("{}-{}.txt", compiler.label, repetition)),
                })
            })
            .collect()
    }

    /// Measure every registered compiler `repetitions` times
    pub fn execute(&self, registry: &CompilerRegistry) -> anyhow::Result<ExecutionResult> {
        std::fs::create_dir_all(&self.run_dir)
            .with_context(|| format!("creating {}", self.run_dir.display()))?;

        let jobs = self.job_plan(registry);
        let pb = progress_bar(jobs.len() as u64);
        pb.set_message("Starting isolated workers...");

        let failures = Mutex::new(0usize);
        let outcomes = self.supervisor.run_all(&jobs, |job, outcome| {
            match outcome {
                Ok(WorkerOutcome::Completed { .. }) => {}
                Ok(WorkerOutcome::Failed { kind, message }) => {
                    tracing::error!(
                        label = %job.label,
                        repetition = job.repetition,
                        %kind,
                        "worker failed: {}",
                        message
                    );
                    *failures.lock().unwrap_or_else(|e| e.into_inner()) += 1;
                }
                Err(e) => {
                    tracing::error!(label = %job.label, repetition = job.repetition, "{}", e);
                    *failures.lock().unwrap_or_else(|e| e.into_inner()) += 1;
                }
            }
            pb.set_message(job.label.clone());
            pb.inc(1);
        })?;

        let mut result = ExecutionResult::for_registry(registry);
        for (job, outcome) in jobs.iter().zip(outcomes) {
            match outcome {
                Ok(WorkerOutcome::Completed { elapsed_ms, .. }) => {
                    match read_sample(&job.output, elapsed_ms) {
                        Ok(sample) => result.record(&job.label, sample),
                        Err(reason) => {
                            tracing::error!(
                                label = %job.label,
                                repetition = job.repetition,
                                "{}",
                                reason
                            );
                            result.record_missing(&job.label, job.repetition, reason)
                        }
                    }
                }
                Ok(WorkerOutcome::Failed { kind, message }) => {
                    result.record_missing(&job.label, job.repetition, format!("{}: {}", kind, message))
                }
                Err(e) => result.record_missing(&job.label, job.repetition, describe(&e)),
            }
        }

        let failures = failures.into_inner().unwrap_or_else(|e| e.into_inner());
        if failures > 0 {
            pb.finish_with_message(format!("Complete (isolated, {} failed)", failures));
        } else {
            pb.finish_with_message("Complete (isolated)");
        }
        Ok(result)
    }
}

/// Sample from a worker's result file, checked against the reported value
fn read_sample(path: &Path, reported_ms: f64) -> Result<f64, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("result file {}: {}", path.display(), e))?;
    let sample = parse_elapsed(&content)
        .ok_or_else(|| format!("result file {}: not a timing: {:?}", path.display(), content))?;

    if (sample - reported_ms).abs() > 1e-6 {
        tracing::warn!(
            path = %path.display(),
            file_ms = sample,
            reported_ms,
            "result file disagrees with the reported timing; using the file"
        );
    }
    Ok(sample)
}

fn describe(error: &SupervisorError) -> String {
    match error {
        SupervisorError::SpawnFailed(e) => format!("spawn: {}", e),
        SupervisorError::WorkerCrashed(reason) => format!("crashed: {}", reason),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbsbench_core::{CompileError, CompileOptions, CompilerDescriptor};

    fn length_compile(source: &str, _options: &CompileOptions) -> Result<usize, CompileError> {
        Ok(source.len())
    }

    fn corpus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("a.hbs"), "hello").unwrap();
        std::fs::write(templates.join("b.hbs"), "world").unwrap();
        dir
    }

    fn registry(labels: &[&str]) -> CompilerRegistry {
        let mut registry = CompilerRegistry::default();
        for label in labels {
            registry
                .register(CompilerDescriptor::new(*label, length_compile))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_in_process_series() {
        let dir = corpus();
        let executor = Executor::new(dir.path(), TemplateSource::default(), 3);

        let result = executor.execute(&registry(&["stub", "other"])).unwrap();
        assert_eq!(result.series.len(), 2);
        assert_eq!(result.series[0].label(), "stub");
        assert_eq!(result.series[0].len(), 3);

        let series = &result.series[0];
        let (min, avg, max) = (
            series.min().unwrap(),
            series.average().unwrap(),
            series.max().unwrap(),
        );
        assert!(min >= 0.0);
        assert!(min <= avg && avg <= max);
        assert!(result.missing.is_empty());
    }

    #[test]
    fn test_in_process_missing_corpus_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = TemplateSource::default();
        let executor = Executor::new(dir.path().join("nope"), source, 1);
        assert!(executor.execute(&registry(&["stub"])).is_err());
    }

    #[test]
    fn test_job_plan() {
        let supervisor = Supervisor::with_binary("true", 1);
        let executor = IsolatedExecutor::new(supervisor, 2, "/data/2024-3-7-0905");

        let jobs = executor.job_plan(&registry(&["handlebars-6", "hbs-compiler-experiment"]));
        let outputs: Vec<_> = jobs.iter().map(|j| j.output.clone()).collect();
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("/data/2024-3-7-0905/handlebars-6-0.txt"),
                PathBuf::from("/data/2024-3-7-0905/handlebars-6-1.txt"),
                PathBuf::from("/data/2024-3-7-0905/hbs-compiler-experiment-0.txt"),
                PathBuf::from("/data/2024-3-7-0905/hbs-compiler-experiment-1.txt"),
            ]
        );
    }

    #[test]
    fn test_sample_read_back_from_result_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handlebars-6-0.txt");

        std::fs::write(&path, crate::worker::format_elapsed(12.5)).unwrap();
        assert_eq!(read_sample(&path, 12.5), Ok(12.5));
        assert_eq!(read_sample(&path, 99.0), Ok(12.5));

        std::fs::write(&path, "not a number").unwrap();
        assert!(read_sample(&path, 12.5).unwrap_err().contains("not a timing"));

        let missing = dir.path().join("handlebars-6-1.txt");
        assert!(read_sample(&missing, 12.5).is_err());
    }

    #[test]
    fn test_isolated_failures_leave_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = Supervisor::with_binary("true", 1);
        let executor = IsolatedExecutor::new(supervisor, 2, dir.path().join("run"));

        let result = executor.execute(&registry(&["stub"])).unwrap();
        assert!(executor.run_dir().is_dir());
        assert_eq!(result.series.len(), 1);
        assert!(result.series[0].is_empty());
        assert_eq!(result.missing.len(), 2);
        assert!(result.missing[0].reason.starts_with("crashed"));
    }
}
