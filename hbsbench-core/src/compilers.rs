//! Compiler Catalog and Registry
//!
//! Installed compiler packages register a [`PackageDef`] through `inventory`.
//! A [`Manifest`] (ordered `label -> version requirement`) selects which of
//! them take part in a run, and [`CompilerRegistry::from_manifest`] turns each
//! selected package into a [`CompilerDescriptor`] with both capabilities
//! (compile function and options builder) resolved up front.
//!
//! Two package families exist:
//! - **Framework** packages compile directly; their descriptors pass options
//!   through unchanged. They also export the options builder used by
//!   low-level compilers.
//! - **Low-level** compilers (`hbs-compiler-<framework>`) borrow the options
//!   builder of their paired framework package. When that package is not
//!   installed, the builder of [`DEFAULT_OPTIONS_PACKAGE`] is substituted.

use regex::Regex;
use thiserror::Error;

/// Alias prefix that marks a low-level compiler package
pub const COMPILER_PREFIX: &str = "hbs-compiler-";

/// Framework package whose options builder backs low-level compilers with a
/// missing pair
pub const DEFAULT_OPTIONS_PACKAGE: &str = "handlebars-6";

/// Parser options nested inside [`CompileOptions`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Source name reported in parse errors
    pub src_name: String,
}

/// Options handed to a compile function alongside the template source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Raw template contents
    pub contents: String,
    /// Name the compiled template is registered under
    pub module_name: String,
    /// Parser options
    pub parse_options: ParseOptions,
    /// Strict mode, enabled by framework options builders
    pub strict_mode: bool,
}

/// Error returned by a compile function
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CompileError {
    /// Compiler-provided description
    pub message: String,
}

impl CompileError {
    /// Create a compile error from any displayable cause
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Compile `source` with `options`, returning the number of top-level
/// elements produced
pub type CompileFn = fn(&str, &CompileOptions) -> Result<usize, CompileError>;

/// Build the final options for a compile call
pub type OptionsFn = fn(CompileOptions) -> CompileOptions;

/// Options builder that passes options through unchanged
pub fn identity_options(options: CompileOptions) -> CompileOptions {
    options
}

/// Options builder exported by framework packages.
///
/// Normalizes the module name and turns on strict mode.
pub fn framework_options(mut options: CompileOptions) -> CompileOptions {
    options.module_name = normalize_module_name(&options.module_name);
    options.strict_mode = true;
    options
}

/// Strip the file extension and use `/` separators
pub fn normalize_module_name(path: &str) -> String {
    let path = path.replace('\\', "/");
    match path.rsplit_once('.') {
        Some((stem, extension)) if !extension.contains('/') && !stem.is_empty() => {
            stem.to_string()
        }
        _ => path,
    }
}

/// Package family and the capabilities it exports
#[derive(Debug, Clone, Copy)]
pub enum PackageKind {
    /// Full framework compiler
    Framework {
        /// Direct compile entry point
        compile: CompileFn,
        /// Options builder lent to paired low-level compilers
        compile_options: OptionsFn,
    },
    /// Low-level compiler without its own options builder
    Compiler {
        /// Compile entry point
        compile: CompileFn,
    },
}

/// An installed compiler package
#[derive(Debug)]
pub struct PackageDef {
    /// Name the package is installed under (manifest label)
    pub alias: &'static str,
    /// Underlying package name
    pub package: &'static str,
    /// Pinned version
    pub version: &'static str,
    /// Family and exported capabilities
    pub kind: PackageKind,
}

/// All packages registered in this binary, sorted by alias
pub fn installed_packages() -> Vec<&'static PackageDef> {
    let mut packages: Vec<_> = inventory::iter::<PackageDef>.into_iter().collect();
    packages.sort_by_key(|p| p.alias);
    packages
}

/// Which family a descriptor was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerFamily {
    /// Full framework compiler
    Framework,
    /// Low-level compiler with a borrowed options builder
    LowLevel,
}

impl std::fmt::Display for CompilerFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompilerFamily::Framework => f.write_str("framework"),
            CompilerFamily::LowLevel => f.write_str("low-level"),
        }
    }
}

/// One compiler variant under test
#[derive(Debug, Clone)]
pub struct CompilerDescriptor {
    /// Unique display label
    pub label: String,
    /// Package name
    pub package: String,
    /// Installed version
    pub version: String,
    /// Package family
    pub family: CompilerFamily,
    /// Alias of the package the options builder came from
    pub options_source: String,
    /// Compile entry point
    pub compile: CompileFn,
    /// Options builder
    pub build_options: OptionsFn,
}

impl CompilerDescriptor {
    /// Descriptor for a compile function with pass-through options
    pub fn new(label: impl Into<String>, compile: CompileFn) -> Self {
        let label = label.into();
        Self {
            options_source: label.clone(),
            label,
            package: "custom".to_string(),
            version: "0.0.0".to_string(),
            family: CompilerFamily::Framework,
            compile,
            build_options: identity_options,
        }
    }
}

/// A single manifest line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Package alias, used as the descriptor label
    pub label: String,
    /// Requested version range, informational only
    pub requirement: String,
}

/// Ordered list of declared compiler dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Create a manifest from entries in declaration order
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Manifest naming every package in `catalog`
    pub fn all(catalog: &[&PackageDef]) -> Self {
        catalog
            .iter()
            .map(|p| (p.alias.to_string(), p.version.to_string()))
            .collect()
    }

    /// Entries in declaration order
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Whether nothing is declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(label, requirement)| ManifestEntry { label, requirement })
                .collect(),
        )
    }
}

/// Errors raised while building or querying the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No descriptor has this label
    #[error("Compiler not found: {0}")]
    NotFound(String),

    /// Two descriptors share a label
    #[error("Compiler label registered twice: {0}")]
    DuplicateLabel(String),

    /// A low-level compiler has neither its paired nor the default options package
    #[error("Fallback options package {fallback} is not installed (needed by {label})")]
    MissingFallback {
        /// Low-level compiler label
        label: String,
        /// Default options package that is missing
        fallback: String,
    },
}

/// Compiler descriptors in registration order
#[derive(Debug, Clone, Default)]
pub struct CompilerRegistry {
    descriptors: Vec<CompilerDescriptor>,
}

impl CompilerRegistry {
    /// Resolve every manifest entry against the installed catalog.
    ///
    /// Entries with no matching package are skipped.
    pub fn from_manifest(
        manifest: &Manifest,
        catalog: &[&PackageDef],
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();

        for entry in manifest.entries() {
            let Some(package) = find_package(catalog, &entry.label) else {
                tracing::debug!(label = %entry.label, "not a known compiler package, skipping");
                continue;
            };

            let descriptor = match package.kind {
                PackageKind::Framework { compile, .. } => CompilerDescriptor {
                    label: entry.label.clone(),
                    package: package.package.to_string(),
                    version: package.version.to_string(),
                    family: CompilerFamily::Framework,
                    options_source: entry.label.clone(),
                    compile,
                    build_options: identity_options,
                },
                PackageKind::Compiler { compile } => {
                    let (options_source, build_options) =
                        resolve_options(catalog, &entry.label)?;
                    CompilerDescriptor {
                        label: entry.label.clone(),
                        package: package.package.to_string(),
                        version: package.version.to_string(),
                        family: CompilerFamily::LowLevel,
                        options_source,
                        compile,
                        build_options,
                    }
                }
            };

            tracing::debug!(
                label = %descriptor.label,
                requested = %entry.requirement,
                package = %descriptor.package,
                version = %descriptor.version,
                "registered compiler"
            );
            registry.register(descriptor)?;
        }

        Ok(registry)
    }

    /// Add a descriptor; labels must be unique
    pub fn register(&mut self, descriptor: CompilerDescriptor) -> Result<(), RegistryError> {
        if self.descriptors.iter().any(|d| d.label == descriptor.label) {
            return Err(RegistryError::DuplicateLabel(descriptor.label));
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Look up exactly one descriptor by label
    pub fn get(&self, label: &str) -> Result<&CompilerDescriptor, RegistryError> {
        self.descriptors
            .iter()
            .find(|d| d.label == label)
            .ok_or_else(|| RegistryError::NotFound(label.to_string()))
    }

    /// Keep only descriptors whose label matches `filter`
    pub fn filter(self, filter: &Regex) -> Self {
        Self {
            descriptors: self
                .descriptors
                .into_iter()
                .filter(|d| filter.is_match(&d.label))
                .collect(),
        }
    }

    /// Descriptors in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CompilerDescriptor> {
        self.descriptors.iter()
    }

    /// Number of registered compilers
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no compiler was registered
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn find_package<'a>(catalog: &[&'a PackageDef], alias: &str) -> Option<&'a PackageDef> {
    catalog.iter().copied().find(|p| p.alias == alias)
}

fn framework_builder(catalog: &[&PackageDef], alias: &str) -> Option<OptionsFn> {
    match find_package(catalog, alias)?.kind {
        PackageKind::Framework {
            compile_options, ..
        } => Some(compile_options),
        PackageKind::Compiler { .. } => None,
    }
}

/// Options builder for a low-level compiler: its paired framework package,
/// or the pinned default when the pair is not installed.
fn resolve_options(
    catalog: &[&PackageDef],
    label: &str,
) -> Result<(String, OptionsFn), RegistryError> {
    let paired = label.strip_prefix(COMPILER_PREFIX).unwrap_or(label);
    if let Some(builder) = framework_builder(catalog, paired) {
        return Ok((paired.to_string(), builder));
    }

    tracing::warn!(
        label = %label,
        paired = %paired,
        fallback = DEFAULT_OPTIONS_PACKAGE,
        "paired options package not installed, using fallback"
    );
    framework_builder(catalog, DEFAULT_OPTIONS_PACKAGE)
        .map(|builder| (DEFAULT_OPTIONS_PACKAGE.to_string(), builder))
        .ok_or_else(|| RegistryError::MissingFallback {
            label: label.to_string(),
            fallback: DEFAULT_OPTIONS_PACKAGE.to_string(),
        })
}
