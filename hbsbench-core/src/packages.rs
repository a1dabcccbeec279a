//! Installed Compiler Packages
//!
//! Each pinned `handlebars` release contributes two catalog entries:
//! - `handlebars-<major>`: the registry-level (framework) compiler
//! - `hbs-compiler-<framework alias>`: the bare `Template::compile` parser
//!
//! Versions 4 and 5 sit behind Cargo features; version 6 is always installed
//! because it backs [`DEFAULT_OPTIONS_PACKAGE`](crate::DEFAULT_OPTIONS_PACKAGE).

use crate::compilers::{CompileError, CompileOptions, PackageDef, PackageKind, framework_options};

macro_rules! handlebars_package {
    ($module:ident, $krate:ident, $alias:literal, $version:literal) => {
        pub(crate) mod $module {
            use super::*;

            /// Register the template in a fresh registry, as the framework does
            pub(crate) fn precompile(
                source: &str,
                options: &CompileOptions,
            ) -> Result<usize, CompileError> {
                let mut registry = $krate::Handlebars::new();
                registry.set_strict_mode(options.strict_mode);
                registry
                    .register_template_string(&options.module_name, source)
                    .map_err(|e| CompileError::new(format!("{}: {}", options.module_name, e)))?;
                Ok(registry
                    .get_template(&options.module_name)
                    .map_or(0, |template| template.elements.len()))
            }

            /// Parse the template without a registry
            pub(crate) fn compile(
                source: &str,
                options: &CompileOptions,
            ) -> Result<usize, CompileError> {
                let mut template = $krate::Template::compile(source).map_err(|e| {
                    CompileError::new(format!("{}: {}", options.parse_options.src_name, e))
                })?;
                template.name = Some(options.module_name.clone());
                Ok(template.elements.len())
            }

            inventory::submit! {
                PackageDef {
                    alias: $alias,
                    package: "handlebars",
                    version: $version,
                    kind: PackageKind::Framework {
                        compile: precompile,
                        compile_options: framework_options,
                    },
                }
            }

            inventory::submit! {
                PackageDef {
                    alias: concat!("hbs-compiler-", $alias),
                    package: "handlebars",
                    version: $version,
                    kind: PackageKind::Compiler { compile },
                }
            }
        }
    };
}

#[cfg(feature = "handlebars-4")]
handlebars_package!(v4, handlebars_v4, "handlebars-4", "4.5.0");

#[cfg(feature = "handlebars-5")]
handlebars_package!(v5, handlebars_v5, "handlebars-5", "5.1.2");

handlebars_package!(v6, handlebars_v6, "handlebars-6", "6.3.2");

// Experimental parser build; its paired framework package does not exist, so
// it always runs with the fallback options builder.
inventory::submit! {
    PackageDef {
        alias: "hbs-compiler-experiment",
        package: "handlebars",
        version: "6.3.2",
        kind: PackageKind::Compiler { compile: v6::compile },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilers::{DEFAULT_OPTIONS_PACKAGE, ParseOptions, installed_packages};

    fn options_for(path: &str, contents: &str) -> CompileOptions {
        framework_options(CompileOptions {
            contents: contents.to_string(),
            module_name: path.to_string(),
            parse_options: ParseOptions {
                src_name: path.to_string(),
            },
            strict_mode: false,
        })
    }

    #[test]
    fn test_default_package_installed() {
        let packages = installed_packages();
        assert!(packages.iter().any(|p| p.alias == DEFAULT_OPTIONS_PACKAGE));
        assert!(packages.iter().any(|p| p.alias == "hbs-compiler-experiment"));
        assert!(
            packages
                .iter()
                .any(|p| p.alias == "hbs-compiler-handlebars-6")
        );
    }

    #[test]
    fn test_catalog_sorted_and_unique() {
        let packages = installed_packages();
        let aliases: Vec<_> = packages.iter().map(|p| p.alias).collect();
        let mut sorted = aliases.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(aliases, sorted);
    }

    #[test]
    fn test_v6_framework_compiles() {
        let source = "<p>{{title}}</p>{{#if ok}}yes{{/if}}";
        let options = options_for("templates/card.hbs", source);
        let elements = v6::precompile(source, &options).unwrap();
        assert!(elements > 0);
    }

    #[test]
    fn test_v6_low_level_compiles() {
        let source = "hello {{name}}";
        let options = options_for("templates/hello.hbs", source);
        assert!(v6::compile(source, &options).unwrap() >= 2);
    }

    #[test]
    fn test_v6_reports_syntax_errors() {
        let source = "{{#if open}}never closed";
        let options = options_for("templates/broken.hbs", source);

        let err = v6::compile(source, &options).unwrap_err();
        assert!(err.message.contains("templates/broken.hbs"));
        assert!(v6::precompile(source, &options).is_err());
    }

    #[cfg(feature = "handlebars-4")]
    #[test]
    fn test_v4_compiles() {
        let source = "{{#each items}}{{this}}{{/each}}";
        let options = options_for("templates/list.hbs", source);
        assert!(v4::precompile(source, &options).is_ok());
        assert!(v4::compile(source, &options).is_ok());
    }

    #[cfg(feature = "handlebars-5")]
    #[test]
    fn test_v5_compiles() {
        let source = "{{#with user}}{{name}}{{/with}}";
        let options = options_for("templates/user.hbs", source);
        assert!(v5::precompile(source, &options).is_ok());
        assert!(v5::compile(source, &options).is_ok());
    }
}
