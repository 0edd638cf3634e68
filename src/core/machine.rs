//! Host machine description
//!
//! A machine is identified as `os-arch` or `os-arch-config`. The config
//! component selects debug or release artifacts and defaults to release.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Build configuration flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildConfig {
    /// Optimized, stripped artifacts
    Release,
    /// Unoptimized artifacts with debug info
    Debug,
}

impl BuildConfig {
    /// The identifier component for this config, if any
    ///
    /// Release is the default and is omitted from identifiers.
    pub fn identifier_part(self) -> Option<&'static str> {
        match self {
            BuildConfig::Release => None,
            BuildConfig::Debug => Some("debug"),
        }
    }
}

/// Description of a build or host machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    /// Operating system, e.g. `linux`, `windows`, `macos`
    pub os: String,
    /// CPU architecture, e.g. `x86_64`, `arm64`
    pub arch: String,
    /// Build configuration
    pub config: BuildConfig,
}

impl MachineSpec {
    /// Create a release-config machine spec
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            config: BuildConfig::Release,
        }
    }

    /// Parse an `os-arch[-config]` identifier
    pub fn parse(identifier: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidMachine {
            identifier: identifier.to_string(),
        };

        let mut parts = identifier.split('-');
        let os = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let arch = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let config = match parts.next() {
            None => BuildConfig::Release,
            Some("debug") => BuildConfig::Debug,
            Some("release") => BuildConfig::Release,
            Some(_) => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            os: os.to_string(),
            arch: arch.to_string(),
            config,
        })
    }

    /// Describe the machine this process is running on
    pub fn detect() -> Self {
        let arch = match std::env::consts::ARCH {
            "aarch64" => "arm64",
            other => other,
        };
        Self::new(std::env::consts::OS, arch)
    }

    /// The canonical `os-arch[-config]` identifier
    pub fn identifier(&self) -> String {
        match self.config.identifier_part() {
            Some(config) => format!("{}-{}-{}", self.os, self.arch, config),
            None => format!("{}-{}", self.os, self.arch),
        }
    }

    /// Executable suffix on this OS, including the dot
    pub fn executable_suffix(&self) -> &'static str {
        if self.os == "windows" {
            ".exe"
        } else {
            ""
        }
    }

    /// Directory under the prefix holding pkg-config metadata
    pub fn libdatadir(&self) -> &'static str {
        if self.os == "freebsd" {
            "libdata"
        } else {
            "lib"
        }
    }

    /// Whether building for `host` from this machine is a cross build
    pub fn is_cross_for(&self, host: &MachineSpec) -> bool {
        self.os != host.os || self.arch != host.arch
    }
}

impl fmt::Display for MachineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
