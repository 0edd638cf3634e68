//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod bump;
pub mod roll;
pub mod sync;
pub mod wait;

use anyhow::Result;
use clap::Subcommand;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a bundle from source
    Build {
        /// Bundle kind: toolchain or sdk
        bundle: String,

        /// Host machine identifier (os-arch[-config]), defaults to this machine
        host: Option<String>,

        /// Build only these packages and their dependencies
        #[arg(long = "only", value_name = "PACKAGE", value_delimiter = ',')]
        only: Vec<String>,

        /// Drop these packages from the build set
        #[arg(long = "exclude", value_name = "PACKAGE", value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Deploy a published bundle into a local directory
    Sync {
        /// Bundle kind: toolchain or sdk
        bundle: String,

        /// Host machine identifier (os-arch[-config])
        host: String,

        /// Directory to deploy into
        location: std::path::PathBuf,

        /// Bundle version, defaults to the version pinned in deps.toml
        #[arg(long)]
        version: Option<String>,
    },

    /// Build and publish a bundle if the current version is not yet rolled
    Roll {
        /// Bundle kind: toolchain or sdk
        bundle: String,

        /// Host machine identifier (os-arch[-config])
        host: String,

        /// Pin the rolled version as the bootstrap version in deps.toml
        #[arg(long)]
        activate: bool,

        /// Post-processing script to run on the artifact before upload
        #[arg(long, value_name = "SCRIPT")]
        post: Option<std::path::PathBuf>,
    },

    /// Block until a bundle is published upstream
    Wait {
        /// Bundle kind: toolchain or sdk
        bundle: String,

        /// Host machine identifier (os-arch[-config])
        host: String,

        /// Bundle version, defaults to the version pinned in deps.toml
        #[arg(long)]
        version: Option<String>,
    },

    /// Update package pins to their upstream branch heads
    Bump,
}

impl Commands {
    pub async fn run(self) -> Result<()> {
        let current_dir = std::env::current_dir()?;
        match self {
            Self::Build {
                bundle,
                host,
                only,
                exclude,
            } => build::execute(&current_dir, &bundle, host.as_deref(), only, exclude).await,
            Self::Sync {
                bundle,
                host,
                location,
                version,
            } => sync::execute(&current_dir, &bundle, &host, &location, version.as_deref()).await,
            Self::Roll {
                bundle,
                host,
                activate,
                post,
            } => roll::execute(&current_dir, &bundle, &host, activate, post.as_deref()).await,
            Self::Wait {
                bundle,
                host,
                version,
            } => wait::execute(&current_dir, &bundle, &host, version.as_deref()).await,
            Self::Bump => bump::execute(&current_dir).await,
        }
    }
}

/// Parse a bundle-kind argument
pub(crate) fn parse_bundle(value: &str) -> Result<crate::core::spec::BundleKind> {
    crate::core::spec::BundleKind::parse(value)
        .ok_or_else(|| anyhow::anyhow!("Unknown bundle kind '{value}', expected toolchain or sdk"))
}
