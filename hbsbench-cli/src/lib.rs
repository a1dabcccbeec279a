#![warn(missing_docs)]
//! hbsbench CLI Library
//!
//! Command-line front end for comparing Handlebars template compilers:
//! - `run` (default): time every registered compiler over `templates/**/*.hbs`
//! - `list`: show the registered compilers
//! - `measure`: isolated worker entry point, one timed batch
//! - `profile`: CPU profiles (and heap snapshots) of single batches
//! - `init`: write a default `hbsbench.toml`
//!
//! # Example
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     hbsbench_cli::run()
//! }
//! ```

mod config;
mod executor;
mod profile;
mod supervisor;
mod worker;

pub use config::*;
pub use executor::{
    ExecutionResult, Executor, IsolatedExecutor, build_report, build_report_meta,
    compute_statistics, progress_bar,
};
pub use profile::{ProfileArtifacts, artifact_dir, run_profiles, select_compilers};
pub use supervisor::*;
pub use worker::{WorkerChannel, format_elapsed, parse_elapsed, run_measure};

use clap::{Parser, Subcommand};
use hbsbench_core::{CompilerRegistry, installed_packages, load_templates};
use hbsbench_report::{
    OutputFormat, ReportConfig, generate_json_report, generate_lines, generate_markdown_table,
};
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};

/// hbsbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "hbsbench")]
#[command(author, version, about = "hbsbench - compare Handlebars template compile times")]
pub struct Cli {
    /// Optional subcommand; defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Filter compilers by regex pattern
    #[arg(default_value = ".*")]
    pub filter: String,

    /// Timed batches per compiler
    #[arg(short = 'n', long, global = true)]
    pub repetitions: Option<usize>,

    /// Isolation mode: process or in-process
    #[arg(long, global = true)]
    pub isolation: Option<IsolationMode>,

    /// Number of concurrent isolated workers
    #[arg(long, global = true)]
    pub jobs: Option<usize>,

    /// Output format: table, lines, json
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the registered compilers
    List,
    /// Compare compile times (default)
    Run {
        /// Filter compilers by regex pattern
        filter: Option<String>,
    },
    /// Time one batch and write the elapsed milliseconds to OUTPUT
    Measure {
        /// Compiler label
        label: String,
        /// Result file
        #[arg(value_name = "OUTPUT")]
        result: PathBuf,
        /// Pin the worker to this CPU
        #[arg(long)]
        cpu: Option<usize>,
    },
    /// Write CPU profiles of one batch per profiled compiler
    Profile {
        /// Also write a heap snapshot after each batch
        #[arg(long)]
        heap_snapshot: bool,
        /// Filter compilers by regex pattern
        filter: Option<String>,
    },
    /// Write a default hbsbench.toml in the current directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the hbsbench CLI with the process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the hbsbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    init_logging(cli.verbose);

    // Discover hbsbench.toml configuration (CLI flags override)
    let config = HbsConfig::discover().unwrap_or_default();
    let base = std::env::current_dir()?;

    match cli.command {
        Some(Commands::List) => list_compilers(&cli, &config),
        Some(Commands::Run { ref filter }) => {
            let filter = filter.as_deref().unwrap_or(&cli.filter);
            run_comparison(&cli, &config, &base, filter)
        }
        Some(Commands::Measure {
            ref label,
            ref result,
            cpu,
        }) => run_measure(
            &config,
            &base,
            label,
            result,
            cpu,
            &mut WorkerChannel::from_env(),
        ),
        Some(Commands::Profile {
            heap_snapshot,
            ref filter,
        }) => {
            let filter = filter.as_deref().unwrap_or(&cli.filter);
            profile_compilers(&config, &base, filter, heap_snapshot)
        }
        Some(Commands::Init { force }) => init_config(&base, force),
        None => run_comparison(&cli, &config, &base, &cli.filter),
    }
}

/// Log to stderr; stdout carries the report
fn init_logging(verbose: bool) {
    let filter = if verbose {
        "hbsbench=debug"
    } else {
        "hbsbench=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Registry for the configured manifest, filtered by `filter`
fn build_registry(config: &HbsConfig, filter: &str) -> anyhow::Result<CompilerRegistry> {
    let filter_re = Regex::new(filter)?;
    let registry =
        CompilerRegistry::from_manifest(&config.manifest_or_installed(), &installed_packages())?;
    Ok(registry.filter(&filter_re))
}

fn list_compilers(cli: &Cli, config: &HbsConfig) -> anyhow::Result<()> {
    let registry = build_registry(config, &cli.filter)?;

    println!("hbsbench compilers:");
    for compiler in registry.iter() {
        let options = if compiler.options_source == compiler.label {
            String::new()
        } else {
            format!(", options from {}", compiler.options_source)
        };
        println!(
            "├── {} ({} {}, {}{})",
            compiler.label, compiler.package, compiler.version, compiler.family, options
        );
    }
    println!("{} compilers registered.", registry.len());

    Ok(())
}

fn run_comparison(
    cli: &Cli,
    config: &HbsConfig,
    base: &Path,
    filter: &str,
) -> anyhow::Result<()> {
    let registry = build_registry(config, filter)?;
    if registry.is_empty() {
        println!("No compilers found.");
        return Ok(());
    }

    let format: OutputFormat = match cli.format.as_deref() {
        Some(format) => format.parse().map_err(anyhow::Error::msg)?,
        None => config.output.format.parse().unwrap_or_default(),
    };
    let repetitions = cli.repetitions.unwrap_or(config.runner.repetitions).max(1);
    let isolation = cli.isolation.unwrap_or(config.runner.isolation);
    let jobs = cli.jobs.unwrap_or(config.runner.jobs).max(1);

    let source = config.templates.source();
    tracing::info!("Getting all templates in {}/", source.directory);
    let corpus = load_templates(base, &source)?;
    tracing::info!("Found {} templates", corpus.len());
    let report_config = ReportConfig {
        repetitions,
        isolation: isolation.to_string(),
        jobs,
        templates: corpus.len(),
        template_bytes: corpus.total_bytes(),
    };
    drop(corpus);

    tracing::info!(
        "Running {} compilers x {} repetitions ({}, {} worker(s))",
        registry.len(),
        repetitions,
        isolation,
        jobs
    );

    let execution = if isolation.is_isolated() {
        let run_dir = base
            .join(&config.output.data_directory)
            .join(hbsbench_profile::current_timestamp());
        let supervisor = Supervisor::new(jobs)?.verbose(cli.verbose);
        IsolatedExecutor::new(supervisor, repetitions, run_dir).execute(&registry)?
    } else {
        if jobs > 1 {
            tracing::warn!("--jobs applies only to isolated mode; running in-process serially");
        }
        Executor::new(base, source, repetitions).execute(&registry)?
    };

    let stats = compute_statistics(&execution.series);
    let report = build_report(&registry, &execution, &stats, report_config);

    let output = match format {
        OutputFormat::Table => generate_markdown_table(&report),
        OutputFormat::Lines => generate_lines(&report),
        OutputFormat::Json => generate_json_report(&report)?,
    };

    if let Some(ref path) = cli.output {
        let mut file = std::fs::File::create(path)?;
        file.write_all(output.as_bytes())?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    Ok(())
}

fn profile_compilers(
    config: &HbsConfig,
    base: &Path,
    filter: &str,
    heap_snapshot: bool,
) -> anyhow::Result<()> {
    let registry = build_registry(config, filter)?;
    let compilers = select_compilers(&registry, &config.profile.compilers);
    if compilers.is_empty() {
        println!("No compilers to profile.");
        return Ok(());
    }

    let artifacts = run_profiles(
        &compilers,
        base,
        &config.templates.source(),
        &config.profile,
        heap_snapshot,
    )?;

    for artifact in &artifacts {
        println!("{}: {}", artifact.label, artifact.cpu_profile.display());
        if let Some(ref snapshot) = artifact.heap_snapshot {
            println!("{}: {}", artifact.label, snapshot.display());
        }
    }
    Ok(())
}

fn init_config(base: &Path, force: bool) -> anyhow::Result<()> {
    let path = base.join(CONFIG_FILE);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    std::fs::write(&path, HbsConfig::default_toml())?;
    println!("Created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::try_parse_from(["hbsbench"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.filter, ".*");
        assert!(cli.repetitions.is_none());
    }

    #[test]
    fn test_run_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hbsbench",
            "run",
            "handlebars",
            "-n",
            "2",
            "--isolation",
            "in-process",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Run { filter }) => assert_eq!(filter.as_deref(), Some("handlebars")),
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.repetitions, Some(2));
        assert_eq!(cli.isolation, Some(IsolationMode::InProcess));
        assert_eq!(cli.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_measure_arguments() {
        let cli = Cli::try_parse_from([
            "hbsbench",
            "measure",
            "handlebars-6",
            "out.txt",
            "--cpu",
            "2",
            "--verbose",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Measure { label, result, cpu }) => {
                assert_eq!(label, "handlebars-6");
                assert_eq!(result, PathBuf::from("out.txt"));
                assert_eq!(cpu, Some(2));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(cli.verbose);
    }

    #[test]
    fn test_bad_isolation_rejected() {
        assert!(Cli::try_parse_from(["hbsbench", "--isolation", "thread"]).is_err());
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();
        let written = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(written, HbsConfig::default_toml());

        assert!(init_config(dir.path(), false).is_err());
        init_config(dir.path(), true).unwrap();
    }

    #[test]
    fn test_registry_filter() {
        let registry = build_registry(&HbsConfig::default(), "^handlebars-6$").unwrap();
        assert_eq!(registry.len(), 1);
        assert!(build_registry(&HbsConfig::default(), "(").is_err());
    }
}
