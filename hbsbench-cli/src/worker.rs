//! Worker Entry Point
//!
//! `hbsbench measure <LABEL> <OUTPUT>` times one compile batch and writes the
//! elapsed milliseconds to OUTPUT as plain decimal text. When started by the
//! supervisor (`HBSBENCH_IPC_FD` set), the outcome is also reported over the
//! inherited pipe.
//!
//! A failed result write is logged and reported but is not a process error.

use crate::config::HbsConfig;
use hbsbench_core::{
    CompilerRegistry, Manifest, RegistryError, installed_packages, load_templates, measure,
    pin_to_cpu,
};
use hbsbench_ipc::{FailureKind, FrameWriter, IPC_FD_ENV, WorkerCapabilities, WorkerMessage};
use std::fmt::Display;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// Message pipe back to the supervisor, absent when run by hand
pub struct WorkerChannel {
    writer: Option<FrameWriter<std::fs::File>>,
}

impl WorkerChannel {
    /// Open the pipe named by `HBSBENCH_IPC_FD`, if any
    pub fn from_env() -> Self {
        let Ok(value) = std::env::var(IPC_FD_ENV) else {
            return Self::detached();
        };

        #[cfg(unix)]
        if let Ok(fd) = value.parse::<i32>() {
            let file = unsafe { std::fs::File::from_raw_fd(fd) };
            return Self {
                writer: Some(FrameWriter::new(file)),
            };
        }

        tracing::warn!("invalid {}={:?}, not reporting to a supervisor", IPC_FD_ENV, value);
        Self::detached()
    }

    /// Channel that drops every message
    pub fn detached() -> Self {
        Self { writer: None }
    }

    /// Send a message; a broken pipe is logged and otherwise ignored
    fn send(&mut self, message: &WorkerMessage) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.write(message) {
                tracing::error!("failed to report to supervisor: {}", e);
                self.writer = None;
            }
        }
    }

    /// Report a failure and turn it into the process error
    fn fail(&mut self, kind: FailureKind, error: impl Display) -> anyhow::Error {
        let message = error.to_string();
        self.send(&WorkerMessage::Failure {
            kind,
            message: message.clone(),
        });
        anyhow::anyhow!(message)
    }
}

/// Registry holding only the manifest entry for `label`
fn worker_registry(config: &HbsConfig, label: &str) -> Result<CompilerRegistry, RegistryError> {
    let manifest: Manifest = config
        .manifest_or_installed()
        .entries()
        .iter()
        .filter(|entry| entry.label == label)
        .map(|entry| (entry.label.clone(), entry.requirement.clone()))
        .collect();
    CompilerRegistry::from_manifest(&manifest, &installed_packages())
}

/// Time one batch of `label` over the corpus under `base` and write the
/// result to `output`. With `cpu` set the worker stays on that core for the
/// whole batch.
pub fn run_measure(
    config: &HbsConfig,
    base: &Path,
    label: &str,
    output: &Path,
    cpu: Option<usize>,
    channel: &mut WorkerChannel,
) -> anyhow::Result<()> {
    channel.send(&WorkerMessage::Hello(WorkerCapabilities::current()));

    if let Some(cpu) = cpu {
        if let Err(e) = pin_to_cpu(cpu) {
            tracing::warn!(cpu, "could not pin worker: {}", e);
        }
    }

    let registry =
        worker_registry(config, label).map_err(|e| channel.fail(FailureKind::Registry, e))?;
    let compiler = registry
        .get(label)
        .map_err(|e| channel.fail(FailureKind::NotFound, e))?;

    let templates = load_templates(base, &config.templates.source())
        .map_err(|e| channel.fail(FailureKind::Load, e))?;
    tracing::debug!(label, templates = templates.len(), "measuring");

    let measurement = measure(compiler, templates).map_err(|e| channel.fail(FailureKind::Compile, e))?;

    if let Err(e) = std::fs::write(output, format_elapsed(measurement.elapsed_ms)) {
        tracing::error!(path = %output.display(), "Could not write file: {}", e);
        channel.send(&WorkerMessage::Failure {
            kind: FailureKind::Write,
            message: format!("{}: {}", output.display(), e),
        });
        return Ok(());
    }

    tracing::debug!(label, elapsed_ms = measurement.elapsed_ms, "measured");
    channel.send(&WorkerMessage::Complete {
        label: measurement.label,
        elapsed_ms: measurement.elapsed_ms,
        templates: measurement.templates as u64,
    });
    Ok(())
}

/// Plain decimal milliseconds, as read back by [`parse_elapsed`]
pub fn format_elapsed(elapsed_ms: f64) -> String {
    format!("{}", elapsed_ms)
}

/// Parse a result file written by a worker
pub fn parse_elapsed(content: &str) -> Option<f64> {
    content
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
}
