//! Build command implementation
//!
//! Implements `depforge build` to produce a bundle archive from source.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::cli::output::{self, status};
use crate::config::defaults;
use crate::core::builder::{BuildOptions, Builder};
use crate::core::layout::SessionLayout;
use crate::core::machine::MachineSpec;
use crate::core::spec::DependencyParameters;

/// Execute the build command
pub async fn execute(
    project_dir: &Path,
    bundle: &str,
    host: Option<&str>,
    only: Vec<String>,
    exclude: Vec<String>,
) -> Result<()> {
    let bundle = super::parse_bundle(bundle)?;
    let host_machine = match host {
        Some(identifier) => MachineSpec::parse(identifier)
            .with_context(|| format!("Invalid host machine '{identifier}'"))?,
        None => MachineSpec::detect(),
    };
    let build_machine = MachineSpec::detect();

    let deps_path = project_dir.join(defaults::DEPS_FILE_NAME);
    if !deps_path.exists() {
        bail!("No {} found in {}", defaults::DEPS_FILE_NAME, project_dir.display());
    }
    let params = DependencyParameters::load(&deps_path)
        .with_context(|| format!("Failed to load {}", deps_path.display()))?;
    let version = params.deps_version.clone();

    let layout = SessionLayout::for_user_cache(bundle, host_machine.clone());
    let builder = Builder::new(bundle, build_machine, host_machine.clone(), layout, params);

    let options = BuildOptions {
        only: if only.is_empty() {
            None
        } else {
            Some(only.into_iter().collect())
        },
        excluded: exclude.into_iter().collect::<BTreeSet<String>>(),
    };

    let report = builder
        .run(&options)
        .await
        .with_context(|| format!("Failed to build {} for {host_machine}", bundle.name()))?;

    println!(
        "{} Built {} {version} for {host_machine}",
        status::SUCCESS,
        bundle.name()
    );
    println!(
        "  {} packages built, {} up to date",
        report.built.len(),
        report.skipped.len()
    );
    println!(
        "  prepare {}, build {}, package {}",
        output::format_duration(report.prepare_time),
        output::format_duration(report.build_time),
        output::format_duration(report.package_time)
    );
    println!("  artifact: {}", report.artifact.display());

    Ok(())
}
