//! Declarative package graph model
//!
//! The package graph lives in `deps.toml`: one table per package plus a
//! top-level `[dependencies]` table carrying the overall bundle version and
//! the bootstrap toolchain version.
//!
//! ```toml
//! [dependencies]
//! version = "20260815"
//! bootstrap_version = "20260701"
//!
//! [zlib]
//! name = "zlib"
//! version = "51b7f2abdade71cd9bb0e7a373ef2610ec6f9daf"
//! url = "https://github.com/depforge-project/zlib.git"
//! options = ["-Dtests=false"]
//!
//! [libpng]
//! name = "libpng"
//! version = "..."
//! url = "..."
//! dependencies = ["zlib", { id = "zstd", when = "machine.os == linux" }]
//! ```
//!
//! Specs are loaded once per session. Predicate resolution produces a
//! filtered copy; the loaded originals are never mutated.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::core::predicate::{EvalContext, Predicate};
use crate::error::ConfigError;

/// Which bundle a session produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    /// Bootstrap build tools
    Toolchain,
    /// Prebuilt libraries and headers for the host platform
    Sdk,
}

impl BundleKind {
    /// Parse a bundle kind name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "toolchain" => Some(BundleKind::Toolchain),
            "sdk" => Some(BundleKind::Sdk),
            _ => None,
        }
    }

    /// The lowercase name used in filenames and directory names
    pub fn name(self) -> &'static str {
        match self {
            BundleKind::Toolchain => "toolchain",
            BundleKind::Sdk => "sdk",
        }
    }
}

impl std::str::FromStr for BundleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid bundle '{s}' (choose from 'toolchain', 'sdk')"))
    }
}

impl std::fmt::Display for BundleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A build-tool option, optionally gated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    /// Verbatim option string passed to the build tool
    pub value: String,
    /// Inclusion predicate
    pub when: Predicate,
}

/// A dependency edge, optionally gated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    /// Identifier of the target package
    pub identifier: String,
    /// Inclusion predicate
    pub when: Predicate,
}

/// One package in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Unique identifier, the deps.toml table key
    pub identifier: String,
    /// Human-readable display name
    pub name: String,
    /// Pinned version-control revision
    pub version: String,
    /// Source repository URL
    pub url: String,
    /// Build options, in declaration order
    pub options: Vec<OptionSpec>,
    /// Dependency edges, in declaration order
    pub dependencies: Vec<DependencySpec>,
    /// Scope tag, e.g. `toolchain`
    pub scope: Option<String>,
    /// Package-level inclusion predicate
    pub when: Predicate,
}

impl PackageSpec {
    /// Whether the package-level predicate admits this package
    pub fn can_include(&self, ctx: EvalContext<'_>) -> bool {
        self.when.evaluate(ctx)
    }

    /// Produce a copy with options and dependency edges filtered by
    /// predicate evaluation
    ///
    /// The original spec is left untouched; only the resolved copy takes
    /// part in selection and building.
    pub fn resolve(&self, ctx: EvalContext<'_>) -> PackageSpec {
        PackageSpec {
            options: self
                .options
                .iter()
                .filter(|opt| opt.when.evaluate(ctx))
                .cloned()
                .collect(),
            dependencies: self
                .dependencies
                .iter()
                .filter(|dep| dep.when.evaluate(ctx))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }
}

/// The whole loaded package graph plus session-wide versions
#[derive(Debug, Clone)]
pub struct DependencyParameters {
    /// Version of the bundle set as a whole
    pub deps_version: String,
    /// Version of the bootstrap toolchain bundle
    pub bootstrap_version: String,
    /// All packages, keyed by identifier (sorted for stable iteration)
    pub packages: BTreeMap<String, PackageSpec>,
}

/// String-or-table form of an option entry
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOption {
    Plain(String),
    Gated { value: String, when: Option<String> },
}

/// String-or-table form of a dependency entry
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Plain(String),
    Gated { id: String, when: Option<String> },
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
    version: String,
    url: String,
    #[serde(default)]
    options: Vec<RawOption>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    scope: Option<String>,
    when: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawParameters {
    version: String,
    bootstrap_version: String,
}

#[derive(Debug, Deserialize)]
struct RawDepsFile {
    dependencies: RawParameters,
    #[serde(flatten)]
    packages: BTreeMap<String, RawPackage>,
}

impl DependencyParameters {
    /// Load and validate the package graph from a deps.toml file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseFailed { error, .. } => ConfigError::ParseFailed {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse the package graph from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawDepsFile = toml::from_str(content).map_err(|e| ConfigError::ParseFailed {
            path: crate::config::defaults::DEPS_FILE_NAME.into(),
            error: e.to_string(),
        })?;

        let mut packages = BTreeMap::new();
        for (identifier, pkg) in raw.packages {
            let spec = PackageSpec {
                identifier: identifier.clone(),
                name: pkg.name,
                version: pkg.version,
                url: pkg.url,
                options: pkg
                    .options
                    .into_iter()
                    .map(|opt| {
                        let (value, when) = match opt {
                            RawOption::Plain(value) => (value, None),
                            RawOption::Gated { value, when } => (value, when),
                        };
                        Ok(OptionSpec {
                            value,
                            when: Predicate::parse_optional(when.as_deref())?,
                        })
                    })
                    .collect::<Result<_, ConfigError>>()?,
                dependencies: pkg
                    .dependencies
                    .into_iter()
                    .map(|dep| {
                        let (identifier, when) = match dep {
                            RawDependency::Plain(id) => (id, None),
                            RawDependency::Gated { id, when } => (id, when),
                        };
                        Ok(DependencySpec {
                            identifier,
                            when: Predicate::parse_optional(when.as_deref())?,
                        })
                    })
                    .collect::<Result<_, ConfigError>>()?,
                scope: pkg.scope,
                when: Predicate::parse_optional(pkg.when.as_deref())?,
            };
            packages.insert(identifier, spec);
        }

        Ok(Self {
            deps_version: raw.dependencies.version,
            bootstrap_version: raw.dependencies.bootstrap_version,
            packages,
        })
    }
}

/// Rewrite the `bootstrap_version` field of a deps.toml file in place
///
/// Used by the roll workflow's `--activate` mode once a toolchain bundle
/// has been published.
pub fn rewrite_bootstrap_version(path: &Path, version: &str) -> Result<(), ConfigError> {
    rewrite(path, |table| {
        if let Some(deps) = table.get_mut("dependencies").and_then(|v| v.as_table_mut()) {
            deps.insert("bootstrap_version".into(), toml::Value::String(version.into()));
        }
    })
}

/// Rewrite one package's pinned version in a deps.toml file
///
/// Used by the bump maintenance workflow.
pub fn rewrite_package_version(
    path: &Path,
    identifier: &str,
    version: &str,
) -> Result<(), ConfigError> {
    rewrite(path, |table| {
        if let Some(pkg) = table.get_mut(identifier).and_then(|v| v.as_table_mut()) {
            pkg.insert("version".into(), toml::Value::String(version.into()));
        }
    })
}

fn rewrite(path: &Path, mutate: impl FnOnce(&mut toml::Table)) -> Result<(), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    let mut table: toml::Table = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    mutate(&mut table);
    let serialized = toml::to_string_pretty(&table).map_err(|e| ConfigError::ParseFailed {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    std::fs::write(path, serialized).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    Ok(())
}
