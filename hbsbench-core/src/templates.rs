//! Template Discovery and Loading
//!
//! Finds every template under `<base>/<directory>/**/*.<extension>`, skipping
//! dependency directories, and reads them into memory in parallel. Any read
//! failure aborts the whole load.

use glob::{MatchOptions, Pattern};
use rayon::prelude::*;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors raised while discovering or reading templates
#[derive(Debug, Error)]
pub enum LoadError {
    /// The working directory could not be canonicalized
    #[error("Failed to resolve base directory {path}: {source}")]
    BaseDirectory {
        /// Directory as given
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The glob pattern built from the template source is invalid
    #[error("Invalid template pattern {pattern}: {source}")]
    Pattern {
        /// Offending pattern
        pattern: String,
        /// Underlying error
        #[source]
        source: glob::PatternError,
    },

    /// A directory could not be walked
    #[error("Failed to scan {path}: {source}")]
    Scan {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A template could not be read as UTF-8
    #[error("Failed to read template {path}: {source}")]
    Read {
        /// Template path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Where templates live relative to the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    /// Directory scanned recursively (relative to the base directory)
    pub directory: String,
    /// File extension without the leading dot
    pub extension: String,
    /// Directory names never descended into
    pub exclude: Vec<String>,
}

impl Default for TemplateSource {
    fn default() -> Self {
        Self {
            directory: "templates".to_string(),
            extension: "hbs".to_string(),
            exclude: vec!["node_modules".to_string()],
        }
    }
}

impl TemplateSource {
    /// Glob pattern for this source rooted at `base`
    pub fn pattern(&self, base: &Path) -> String {
        let base = Pattern::escape(&base.to_string_lossy());
        let directory = self.directory.trim_matches('/');
        if directory.is_empty() {
            format!("{}/**/*.{}", base, self.extension)
        } else {
            format!("{}/{}/**/*.{}", base, directory, self.extension)
        }
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        relative.components().any(|component| match component {
            Component::Normal(name) => self
                .exclude
                .iter()
                .any(|excluded| name.to_str() == Some(excluded.as_str())),
            _ => false,
        })
    }
}

/// A single template file held in memory
#[derive(Debug)]
pub struct TemplateRecord {
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// Path relative to the base directory, always `/`-separated
    pub relative_path: String,
    /// Raw UTF-8 contents
    pub content: String,
}

/// Move-only collection of templates.
///
/// Deliberately not `Clone`: a set is handed to exactly one compile batch,
/// which drains it.
#[derive(Debug, Default)]
pub struct TemplateSet {
    records: Vec<TemplateRecord>,
}

impl TemplateSet {
    /// Wrap already-loaded records
    pub fn new(records: Vec<TemplateRecord>) -> Self {
        Self { records }
    }

    /// Number of templates still held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether every template has been drained
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total size of all template contents in bytes
    pub fn total_bytes(&self) -> usize {
        self.records.iter().map(|r| r.content.len()).sum()
    }

    /// Iterate over the records without consuming them
    pub fn iter(&self) -> impl Iterator<Item = &TemplateRecord> {
        self.records.iter()
    }

    /// Remove the next template to compile
    pub(crate) fn pop(&mut self) -> Option<TemplateRecord> {
        self.records.pop()
    }
}

impl FromIterator<TemplateRecord> for TemplateSet {
    fn from_iter<I: IntoIterator<Item = TemplateRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Discover and read every template under `base`.
pub fn load_templates(base: &Path, source: &TemplateSource) -> Result<TemplateSet, LoadError> {
    let base = base.canonicalize().map_err(|e| LoadError::BaseDirectory {
        path: base.to_path_buf(),
        source: e,
    })?;

    let pattern = source.pattern(&base);
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let entries = glob::glob_with(&pattern, options).map_err(|e| LoadError::Pattern {
        pattern: pattern.clone(),
        source: e,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            LoadError::Scan {
                path,
                source: e.into(),
            }
        })?;
        let Ok(relative) = path.strip_prefix(&base) else {
            continue;
        };
        if source.is_excluded(relative) || !path.is_file() {
            continue;
        }
        let relative_path = slash_path(relative);
        paths.push((path, relative_path));
    }

    tracing::debug!(pattern = %pattern, count = paths.len(), "discovered templates");

    let records = paths
        .into_par_iter()
        .map(|(absolute_path, relative_path)| {
            let content = std::fs::read_to_string(&absolute_path).map_err(|e| LoadError::Read {
                path: absolute_path.clone(),
                source: e,
            })?;
            Ok(TemplateRecord {
                absolute_path,
                relative_path,
                content,
            })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    Ok(TemplateSet::new(records))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_loads_one_record_per_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "templates/a.hbs", "hello");
        write(dir.path(), "templates/nested/deep/b.hbs", "{{#if x}}world{{/if}}");
        write(dir.path(), "templates/readme.md", "not a template");
        write(dir.path(), "other/c.hbs", "outside");

        let set = load_templates(dir.path(), &TemplateSource::default()).unwrap();
        assert_eq!(set.len(), 2);

        let mut relative: Vec<_> = set.iter().map(|r| r.relative_path.clone()).collect();
        relative.sort();
        assert_eq!(
            relative,
            vec!["templates/a.hbs", "templates/nested/deep/b.hbs"]
        );

        for record in set.iter() {
            assert!(record.absolute_path.is_absolute());
            let on_disk = fs::read_to_string(&record.absolute_path).unwrap();
            assert_eq!(record.content, on_disk);
            assert!(!record.content.is_empty());
        }
    }

    #[test]
    fn test_excludes_dependency_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "templates/app.hbs", "app");
        write(dir.path(), "templates/node_modules/addon/x.hbs", "vendored");
        write(dir.path(), "templates/lib/node_modules/y.hbs", "vendored");

        let set = load_templates(dir.path(), &TemplateSource::default()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().relative_path, "templates/app.hbs");
    }

    #[test]
    fn test_custom_source() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "views/a.handlebars", "a");
        write(dir.path(), "views/vendor/b.handlebars", "b");

        let source = TemplateSource {
            directory: "views".to_string(),
            extension: "handlebars".to_string(),
            exclude: vec!["vendor".to_string()],
        };
        let set = load_templates(dir.path(), &source).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.total_bytes(), 1);
    }

    #[test]
    fn test_missing_template_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = load_templates(dir.path(), &TemplateSource::default()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_base_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let result = load_templates(&missing, &TemplateSource::default());
        assert!(matches!(result, Err(LoadError::BaseDirectory { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_utf8_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "templates/good.hbs", "fine");
        let bad = dir.path().join("templates/bad.hbs");
        fs::write(&bad, [0xff, 0xfe, 0xfd]).unwrap();

        let result = load_templates(dir.path(), &TemplateSource::default());
        assert!(matches!(result, Err(LoadError::Read { .. })));
    }
}
