//! Roll command implementation
//!
//! Implements `depforge roll`: build and publish a bundle unless the
//! current version is already rolled, then optionally activate it as the
//! bootstrap version future sessions build against.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::output::status;
use crate::config::{defaults, urls};
use crate::core::builder::{BuildOptions, Builder};
use crate::core::deploy::compute_bundle_parameters;
use crate::core::layout::SessionLayout;
use crate::core::machine::MachineSpec;
use crate::core::spec::{self, BundleKind, DependencyParameters};
use crate::infra::download::{DownloadClient, Probe};
use crate::infra::publish;

/// Execute the roll command
pub async fn execute(
    project_dir: &Path,
    bundle: &str,
    host: &str,
    activate: bool,
    post: Option<&Path>,
) -> Result<()> {
    let bundle = super::parse_bundle(bundle)?;
    let host_machine =
        MachineSpec::parse(host).with_context(|| format!("Invalid host machine '{host}'"))?;

    let deps_path = project_dir.join(defaults::DEPS_FILE_NAME);

    // An SDK roll that activates builds against the toolchain of the same
    // version, so the pin moves before the build.
    if activate && bundle == BundleKind::Sdk {
        let params = DependencyParameters::load(&deps_path)?;
        spec::rewrite_bootstrap_version(&deps_path, &params.deps_version)?;
        info!("Pinned bootstrap version {}", params.deps_version);
    }

    let params = DependencyParameters::load(&deps_path)
        .with_context(|| format!("Failed to load {}", deps_path.display()))?;
    let version = params.deps_version.clone();
    let coords = compute_bundle_parameters(bundle, &host_machine, &version);

    let client = DownloadClient::new();
    if client.probe(&coords.url).await? == Probe::Found {
        println!(
            "{} {} {version} for {host_machine} is already rolled",
            status::SUCCESS,
            bundle.name()
        );
        return Ok(());
    }

    let s3_url = urls::expand(urls::BUNDLE_S3_URL, &version, &coords.filename);
    if publish::s3_object_exists(&s3_url)? {
        // Uploaded but not yet visible publicly; the cache is stale.
        publish::purge_cdn(&coords.url)?;
        println!(
            "{} {} {version} was already uploaded, purged the CDN cache",
            status::SUCCESS,
            bundle.name()
        );
        return Ok(());
    }

    let build_machine = MachineSpec::detect();
    let layout = SessionLayout::for_user_cache(bundle, host_machine.clone());
    let builder = Builder::new(
        bundle,
        build_machine,
        host_machine.clone(),
        layout,
        params,
    );
    let report = builder
        .run(&BuildOptions::default())
        .await
        .with_context(|| format!("Failed to build {} for {host_machine}", bundle.name()))?;

    if let Some(script) = post {
        info!("Running post-processing script {}", script.display());
        publish::run_post_script(
            script,
            bundle.name(),
            &host_machine.identifier(),
            &report.artifact,
            &version,
        )?;
    }

    publish::s3_upload(&report.artifact, &s3_url)?;
    publish::purge_cdn(&coords.url)?;

    if activate && bundle == BundleKind::Toolchain {
        spec::rewrite_bootstrap_version(&deps_path, &version)?;
        info!("Pinned bootstrap version {version}");
    }

    println!(
        "{} Rolled {} {version} for {host_machine}",
        status::SUCCESS,
        bundle.name()
    );
    Ok(())
}
