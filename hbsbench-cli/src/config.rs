//! Configuration loading from hbsbench.toml
//!
//! hbsbench configuration can be specified in a `hbsbench.toml` file in the
//! project root. The configuration is discovered by walking up from the
//! current directory. The `[compilers]` table doubles as the compiler
//! manifest: its entries are read in file order.

use hbsbench_core::{Manifest, TemplateSource};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration file name
pub const CONFIG_FILE: &str = "hbsbench.toml";

/// hbsbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HbsConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Template corpus configuration
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Ordered compiler manifest: `label = "version range"`
    #[serde(default)]
    pub compilers: toml::Table,
    /// CPU profiling configuration
    #[serde(default)]
    pub profile: ProfileConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Isolation mode for comparison runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationMode {
    /// One worker process per compiler and repetition (default)
    #[default]
    Process,
    /// Every repetition in the current process
    InProcess,
}

impl IsolationMode {
    /// Whether this mode provides process isolation
    pub fn is_isolated(self) -> bool {
        matches!(self, IsolationMode::Process)
    }
}

impl std::str::FromStr for IsolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "process" => Ok(IsolationMode::Process),
            "in-process" | "inprocess" => Ok(IsolationMode::InProcess),
            other => Err(format!("Unknown isolation mode: {}", other)),
        }
    }
}

impl std::fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsolationMode::Process => f.write_str("process"),
            IsolationMode::InProcess => f.write_str("in-process"),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Timed batches per compiler
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    /// Isolation mode: "process" or "in-process"
    #[serde(default)]
    pub isolation: IsolationMode,
    /// Number of concurrent isolated workers
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            repetitions: default_repetitions(),
            isolation: IsolationMode::default(),
            jobs: default_jobs(),
        }
    }
}

fn default_repetitions() -> usize {
    5
}
fn default_jobs() -> usize {
    1
}

/// Template corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory searched recursively, relative to the working directory
    #[serde(default = "default_template_directory")]
    pub directory: String,
    /// File extension without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Path components that exclude a file
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            directory: default_template_directory(),
            extension: default_extension(),
            exclude: default_exclude(),
        }
    }
}

fn default_template_directory() -> String {
    "templates".to_string()
}
fn default_extension() -> String {
    "hbs".to_string()
}
fn default_exclude() -> Vec<String> {
    vec!["node_modules".to_string()]
}

impl TemplatesConfig {
    /// Loader source for this configuration
    pub fn source(&self) -> TemplateSource {
        TemplateSource {
            directory: self.directory.clone(),
            extension: self.extension.clone(),
            exclude: self.exclude.clone(),
        }
    }
}

/// CPU profiling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Compiler labels profiled by `hbsbench profile`, in order
    #[serde(default = "default_profile_compilers")]
    pub compilers: Vec<String>,
    /// Artifact directory
    #[serde(default = "default_profile_directory")]
    pub directory: String,
    /// Put each run's artifacts in a timestamped subdirectory
    #[serde(default)]
    pub nest_by_run: bool,
    /// Sampling frequency in Hz
    #[serde(default = "default_frequency")]
    pub frequency: i32,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            compilers: default_profile_compilers(),
            directory: default_profile_directory(),
            nest_by_run: false,
            frequency: default_frequency(),
        }
    }
}

fn default_profile_compilers() -> Vec<String> {
    vec![
        "hbs-compiler-experiment".to_string(),
        "hbs-compiler-handlebars-6".to_string(),
    ]
}
fn default_profile_directory() -> String {
    "cpu-profiles".to_string()
}
fn default_frequency() -> i32 {
    hbsbench_profile::DEFAULT_FREQUENCY
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "table", "lines" or "json"
    #[serde(default = "default_format")]
    pub format: String,
    /// Root of the per-run timing files written by isolated workers
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            data_directory: default_data_directory(),
        }
    }
}

fn default_format() -> String {
    "table".to_string()
}
fn default_data_directory() -> String {
    "data".to_string()
}

impl HbsConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    ///
    /// A config file that exists but fails to parse is reported and ignored.
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => {
                        tracing::debug!(path = %config_path.display(), "loaded configuration");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), "ignoring configuration: {}", e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Compiler manifest from the `[compilers]` table, in file order.
    ///
    /// Values are version ranges; a non-string value is kept in its TOML
    /// form.
    pub fn manifest(&self) -> Manifest {
        self.compilers
            .iter()
            .map(|(label, requirement)| {
                let requirement = requirement
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| requirement.to_string());
                (label.clone(), requirement)
            })
            .collect()
    }

    /// Manifest entries, or every installed package when `[compilers]` is
    /// empty
    pub fn manifest_or_installed(&self) -> Manifest {
        let manifest = self.manifest();
        if manifest.is_empty() {
            Manifest::all(&hbsbench_core::installed_packages())
        } else {
            manifest
        }
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# hbsbench configuration

[runner]
# Timed batches per compiler
repetitions = 5
# Isolation mode: "process" (one worker per batch) or "in-process"
isolation = "process"
# Concurrent isolated workers; 1 keeps workers strictly sequential
jobs = 1

[templates]
# Searched recursively, relative to the working directory
directory = "templates"
extension = "hbs"
# Any path containing one of these components is skipped
exclude = ["node_modules"]

[compilers]
# Compilers taking part in a run, in order: label = "version range".
# Leave empty to run every installed compiler.
"handlebars-6" = "^6.3"
"hbs-compiler-handlebars-6" = "^6.3"
# "handlebars-5" = "^5.1"
# "handlebars-4" = "^4.5"
# "hbs-compiler-experiment" = "*"

[profile]
# Compilers profiled by `hbsbench profile`
compilers = ["hbs-compiler-experiment", "hbs-compiler-handlebars-6"]
directory = "cpu-profiles"
# Write each run into its own timestamped subdirectory
nest_by_run = false
# Sampling frequency in Hz
frequency = 1000

[output]
# Default output format: table, lines, json
format = "table"
# Timing files of isolated runs go to <data_directory>/<run timestamp>/
data_directory = "data"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HbsConfig::default();
        assert_eq!(config.runner.repetitions, 5);
        assert_eq!(config.runner.isolation, IsolationMode::Process);
        assert_eq!(config.runner.jobs, 1);
        assert_eq!(config.templates.directory, "templates");
        assert_eq!(config.templates.exclude, vec!["node_modules"]);
        assert_eq!(config.profile.directory, "cpu-profiles");
        assert!(config.manifest().is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            repetitions = 3
            isolation = "in-process"

            [compilers]
            "hbs-compiler-handlebars-6" = "^6.3"
            "handlebars-5" = "^5.1"
            "hbs-compiler-experiment" = "*"
        "#;

        let config: HbsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.repetitions, 3);
        assert_eq!(config.runner.isolation, IsolationMode::InProcess);
        // Defaults should still apply
        assert_eq!(config.runner.jobs, 1);
        assert_eq!(config.output.format, "table");

        let manifest = config.manifest();
        let labels: Vec<&str> = manifest.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["hbs-compiler-handlebars-6", "handlebars-5", "hbs-compiler-experiment"]
        );
        assert_eq!(manifest.entries()[1].requirement, "^5.1");
    }

    #[test]
    fn test_non_string_requirement() {
        let config: HbsConfig = toml::from_str("[compilers]\nhandlebars-6 = 6\n").unwrap();
        assert_eq!(config.manifest().entries()[0].requirement, "6");
    }

    #[test]
    fn test_default_toml_parses() {
        let config: HbsConfig = toml::from_str(&HbsConfig::default_toml()).unwrap();
        assert_eq!(config.runner.repetitions, 5);
        assert_eq!(config.profile.frequency, 1000);
        assert_eq!(config.manifest().entries().len(), 2);
    }

    #[test]
    fn test_isolation_mode_parse() {
        assert_eq!("process".parse::<IsolationMode>(), Ok(IsolationMode::Process));
        assert_eq!("in-process".parse::<IsolationMode>(), Ok(IsolationMode::InProcess));
        assert!("thread".parse::<IsolationMode>().is_err());
    }

    #[test]
    fn test_templates_source() {
        let source = TemplatesConfig::default().source();
        assert_eq!(source.directory, "templates");
        assert_eq!(source.extension, "hbs");
    }
}
