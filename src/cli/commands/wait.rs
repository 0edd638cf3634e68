//! Wait command implementation
//!
//! Implements `depforge wait`: poll until another machine publishes the
//! bundle this one needs. Ctrl-C stops the wait cleanly.

use std::path::Path;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::cli::output::{self, status};
use crate::config::defaults;
use crate::core::deploy::{self, compute_bundle_parameters, WaitOutcome};
use crate::core::machine::MachineSpec;
use crate::infra::download::DownloadClient;

/// Execute the wait command
pub async fn execute(
    project_dir: &Path,
    bundle: &str,
    host: &str,
    version: Option<&str>,
) -> Result<()> {
    let bundle = super::parse_bundle(bundle)?;
    let machine =
        MachineSpec::parse(host).with_context(|| format!("Invalid host machine '{host}'"))?;
    let version = super::sync::resolve_version(project_dir, version)?;

    let coords = compute_bundle_parameters(bundle, &machine, &version);
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });

    let spinner = output::create_spinner(&format!(
        "Waiting for {} {version} for {machine}",
        bundle.name()
    ));
    let client = DownloadClient::new();
    let outcome = deploy::wait_for_bundle(
        &client,
        &coords.url,
        defaults::WAIT_POLL_INTERVAL,
        &cancel,
    )
    .await;
    spinner.finish_and_clear();

    match outcome.context("Wait failed")? {
        WaitOutcome::Found => {
            println!(
                "{} {} {version} for {machine} is published",
                status::SUCCESS,
                bundle.name()
            );
            Ok(())
        }
        WaitOutcome::Cancelled => {
            println!("{} Wait cancelled", status::WARNING);
            Ok(())
        }
    }
}
