#![warn(missing_docs)]
//! hbsbench Core - Measurement Runtime
//!
//! This crate provides everything a single timed compilation batch needs:
//! - Template discovery and loading (`templates/**/*.hbs`)
//! - The compiler package catalog and the registry of compiler descriptors
//! - The measurement runner that drains a template set through one compiler
//! - A monotonic timer and CPU pinning for stable worker measurements

mod compilers;
mod measure;
mod packages;
mod runner;
mod templates;

pub use compilers::{
    COMPILER_PREFIX, CompileError, CompileFn, CompileOptions, CompilerDescriptor, CompilerFamily,
    CompilerRegistry, DEFAULT_OPTIONS_PACKAGE, Manifest, ManifestEntry, OptionsFn, PackageDef,
    PackageKind, ParseOptions, RegistryError, framework_options, identity_options,
    installed_packages, normalize_module_name,
};
pub use measure::{Timer, available_cpus, pin_to_cpu};
pub use runner::{Measurement, RunError, compile_templates, measure};
pub use templates::{LoadError, TemplateRecord, TemplateSet, TemplateSource, load_templates};

// Collect every installed compiler package
inventory::collect!(PackageDef);
