//! CPU Profile Artifact

use crate::ProfileError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sampled call stacks for one compile batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuProfile {
    /// Compiler label
    pub label: String,
    /// Sampling frequency in Hz
    pub frequency: i32,
    /// Wall time the session ran
    pub duration_ms: f64,
    /// Distinct stacks, most frequent first
    pub samples: Vec<CpuSample>,
}

/// One distinct call stack and how often it was sampled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuSample {
    /// Name of the sampled thread
    pub thread: String,
    /// Symbol names, innermost frame first
    pub stack: Vec<String>,
    /// Times this stack was sampled
    pub count: isize,
}

impl CpuProfile {
    pub(crate) fn from_report(label: &str, report: &pprof::Report) -> Self {
        let mut samples: Vec<CpuSample> = report
            .data
            .iter()
            .map(|(frames, count)| CpuSample {
                thread: frames.thread_name.clone(),
                stack: frames
                    .frames
                    .iter()
                    .flat_map(|symbols| symbols.iter().map(|symbol| symbol.name()))
                    .collect(),
                count: *count,
            })
            .collect();
        samples.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.stack.cmp(&b.stack)));

        Self {
            label: label.to_string(),
            frequency: report.timing.frequency,
            duration_ms: report.timing.duration.as_secs_f64() * 1000.0,
            samples,
        }
    }

    /// Total number of samples taken
    pub fn total_samples(&self) -> isize {
        self.samples.iter().map(|s| s.count).sum()
    }
}

/// Write `<dir>/<timestamp>-<label>.cpuprofile` using the current local time
pub fn write_cpu_profile(
    dir: &Path,
    label: &str,
    profile: &CpuProfile,
) -> Result<PathBuf, ProfileError> {
    write_cpu_profile_at(dir, &crate::current_timestamp(), label, profile)
}

/// Write `<dir>/<timestamp>-<label>.cpuprofile`, creating `dir` if needed
pub fn write_cpu_profile_at(
    dir: &Path,
    timestamp: &str,
    label: &str,
    profile: &CpuProfile,
) -> Result<PathBuf, ProfileError> {
    let path = dir.join(format!("{}-{}.cpuprofile", timestamp, label));
    let write_err = |source| ProfileError::Write {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(write_err)?;
    let file = File::create(&path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, profile)?;
    writer.flush().map_err(write_err)?;

    tracing::info!(path = %path.display(), samples = profile.total_samples(), "wrote CPU profile");
    Ok(path)
}
