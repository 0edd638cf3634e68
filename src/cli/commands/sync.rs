//! Sync command implementation
//!
//! Implements `depforge sync` to deploy a published bundle into a local
//! directory, reusing it when the deployed version already matches.

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::output::{self, status};
use crate::config::defaults;
use crate::core::deploy::{self, SourceState};
use crate::core::machine::MachineSpec;
use crate::core::spec::DependencyParameters;
use crate::infra::download::DownloadClient;

/// Execute the sync command
pub async fn execute(
    project_dir: &Path,
    bundle: &str,
    host: &str,
    location: &Path,
    version: Option<&str>,
) -> Result<()> {
    let bundle = super::parse_bundle(bundle)?;
    let machine =
        MachineSpec::parse(host).with_context(|| format!("Invalid host machine '{host}'"))?;
    let version = resolve_version(project_dir, version)?;

    let already_deployed = std::fs::read_to_string(location.join(defaults::VERSION_MARKER))
        .map(|marker| marker.trim() == version)
        .unwrap_or(false);

    let spinner = output::create_spinner(&format!(
        "Syncing {} {version} for {machine}",
        bundle.name()
    ));
    let client = DownloadClient::new();
    let result = deploy::deploy(&client, bundle, &machine, location, &version).await;
    spinner.finish_and_clear();

    match result {
        Ok(_) if already_deployed => {
            println!(
                "{} {} {version} already deployed at {}",
                status::SUCCESS,
                bundle.name(),
                location.display()
            );
        }
        Ok(SourceState::Pristine | SourceState::Modified) => {
            println!(
                "{} Deployed {} {version} to {}",
                status::SUCCESS,
                bundle.name(),
                location.display()
            );
        }
        Err(e) if e.is_bundle_not_found() => {
            anyhow::bail!(
                "{} {version} for {machine} has not been published yet",
                bundle.name()
            );
        }
        Err(e) => return Err(e).context("Deployment failed"),
    }

    Ok(())
}

/// Use the explicit version when given, the deps.toml pin otherwise
pub(crate) fn resolve_version(project_dir: &Path, version: Option<&str>) -> Result<String> {
    if let Some(version) = version {
        return Ok(version.to_string());
    }
    let deps_path = project_dir.join(defaults::DEPS_FILE_NAME);
    let params = DependencyParameters::load(&deps_path)
        .with_context(|| format!("Failed to load {}", deps_path.display()))?;
    Ok(params.deps_version)
}
