//! `hbsbench profile`
//!
//! Profiles one compile batch per selected compiler instead of timing
//! repetitions. Compilers run strictly one after another so sessions never
//! overlap.

use crate::config::ProfileConfig;
use hbsbench_core::{
    CompilerDescriptor, CompilerRegistry, TemplateSource, compile_templates, load_templates,
};
use hbsbench_profile::{Profiler, current_timestamp, reset_peak, write_cpu_profile};
use std::path::{Path, PathBuf};

/// Artifacts written for one compiler
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileArtifacts {
    /// Compiler label
    pub label: String,
    /// Written `.cpuprofile`
    pub cpu_profile: PathBuf,
    /// Written `.heapsnapshot`, when requested
    pub heap_snapshot: Option<PathBuf>,
}

/// Compilers from `registry` named in the allow-list, in allow-list order
pub fn select_compilers<'a>(
    registry: &'a CompilerRegistry,
    allow: &[String],
) -> Vec<&'a CompilerDescriptor> {
    allow
        .iter()
        .filter_map(|label| match registry.get(label) {
            Ok(descriptor) => Some(descriptor),
            Err(_) => {
                tracing::warn!(label = %label, "profiled compiler is not registered, skipping");
                None
            }
        })
        .collect()
}

/// Directory receiving this run's artifacts
pub fn artifact_dir(base: &Path, config: &ProfileConfig) -> PathBuf {
    let dir = base.join(&config.directory);
    if config.nest_by_run {
        dir.join(current_timestamp())
    } else {
        dir
    }
}

/// Profile each compiler over a fresh template set
pub fn run_profiles(
    compilers: &[&CompilerDescriptor],
    base: &Path,
    source: &TemplateSource,
    config: &ProfileConfig,
    heap_snapshot: bool,
) -> anyhow::Result<Vec<ProfileArtifacts>> {
    let dir = artifact_dir(base, config);
    std::fs::create_dir_all(&dir)?;

    let mut profiler = Profiler::with_frequency(config.frequency)?;
    let mut artifacts = Vec::with_capacity(compilers.len());

    for compiler in compilers {
        let mut templates = load_templates(base, source)?;
        tracing::info!(label = %compiler.label, templates = templates.len(), "profiling");

        // Peak in the heap snapshot covers this batch only
        reset_peak();
        let session = profiler.cpu_session()?;
        compile_templates(compiler, &mut templates)?;
        let profile = session.finish(&compiler.label)?;

        let cpu_profile = write_cpu_profile(&dir, &compiler.label, &profile)?;

        let heap_snapshot = if heap_snapshot {
            let path = dir.join(format!(
                "{}-{}.heapsnapshot",
                current_timestamp(),
                compiler.label
            ));
            profiler.take_heap_snapshot(&path)?;
            Some(path)
        } else {
            None
        };

        artifacts.push(ProfileArtifacts {
            label: compiler.label.clone(),
            cpu_profile,
            heap_snapshot,
        });
    }

    Ok(artifacts)
}
