//! Bump command implementation
//!
//! Implements `depforge bump` to refresh package pins from their
//! upstream branch heads.

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::output::status;
use crate::core::bump;

/// Execute the bump command
pub async fn execute(project_dir: &Path) -> Result<()> {
    let report = bump::bump(project_dir)
        .await
        .context("Failed to bump dependency versions")?;

    if report.updated.is_empty() {
        println!(
            "{} All {} upstream packages are up to date",
            status::SUCCESS,
            report.checked
        );
        return Ok(());
    }

    for bump in &report.updated {
        println!(
            "{} Bumped {}: {} -> {}",
            status::SUCCESS,
            bump.identifier,
            &bump.old_version[..bump.old_version.len().min(12)],
            &bump.new_version[..bump.new_version.len().min(12)]
        );
    }
    println!(
        "{} {} of {} packages updated",
        status::INFO,
        report.updated.len(),
        report.checked
    );
    Ok(())
}
