//! Consumer-side bundle deployment
//!
//! Resolves where a published bundle lives, keeps a local copy in sync
//! with a requested version, and blocks until a bundle appears upstream.
//!
//! Deployment is atomic from the consumer's point of view: the archive is
//! unpacked and token-substituted in a staging directory next to the final
//! location, then moved into place with one rename. A crash mid-deploy
//! leaves either the old tree or no tree, never a half-written one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{defaults, urls};
use crate::core::machine::MachineSpec;
use crate::core::spec::BundleKind;
use crate::error::{DepforgeError, DownloadError, FilesystemError};
use crate::infra::download::{DownloadClient, Probe};
use crate::infra::filesystem;

/// Whether a local tree was reused as-is or replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// The existing tree already matched the requested version
    Pristine,
    /// A stale tree was discarded and replaced
    Modified,
}

/// Resolved download coordinates for one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleParameters {
    pub url: String,
    pub filename: String,
}

/// Compute the published location of a bundle
///
/// Toolchain bundles for Windows are architecture-neutral: one x86 build
/// serves every Windows host, so the filename always says `windows-x86`.
pub fn compute_bundle_parameters(
    bundle: BundleKind,
    machine: &MachineSpec,
    version: &str,
) -> BundleParameters {
    let identifier = if bundle == BundleKind::Toolchain && machine.os == "windows" {
        MachineSpec::new("windows", "x86").identifier()
    } else {
        machine.identifier()
    };
    let filename = format!("{}-{identifier}.tar.gz", bundle.name());
    let url = urls::expand(urls::BUNDLE_URL, version, &filename);
    BundleParameters { url, filename }
}

/// Ensure `location` holds the bundle at `version`
///
/// A matching `VERSION.txt` short-circuits the whole operation. Otherwise
/// any stale tree is discarded and the archive is sourced from a sibling
/// file when present, falling back to a download.
pub async fn deploy(
    client: &DownloadClient,
    bundle: BundleKind,
    machine: &MachineSpec,
    location: &Path,
    version: &str,
) -> Result<SourceState, DepforgeError> {
    let marker = location.join(defaults::VERSION_MARKER);
    if let Ok(found) = filesystem::read_file(&marker) {
        if found.trim() == version {
            debug!("{} at {} is up to date", bundle.name(), location.display());
            return Ok(SourceState::Pristine);
        }
    }

    let mut state = SourceState::Pristine;
    if location.exists() {
        info!("Discarding stale {} at {}", bundle.name(), location.display());
        filesystem::remove_dir_all(location)?;
        state = SourceState::Modified;
    }

    let params = compute_bundle_parameters(bundle, machine, version);
    let parent = location
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    filesystem::create_dir_all(&parent)?;

    let local_archive = parent.join(&params.filename);
    let (archive, downloaded) = if local_archive.is_file() {
        debug!("Using local archive {}", local_archive.display());
        (local_archive, false)
    } else {
        let dest = parent.join(format!("{}.part", params.filename));
        info!("Downloading {}", params.url);
        client.fetch_to(&params.url, &dest).await?;
        (dest, true)
    };

    let name = location
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("bundle");
    let staging = parent.join(format!("_{name}"));
    filesystem::remove_dir_all(&staging)?;
    filesystem::create_dir_all(&staging)?;

    extract_into_staging(&archive, &staging, downloaded)?;

    instantiate_templates(&staging, location)?;
    filesystem::rename(&staging, location)?;

    Ok(state)
}

/// Outcome of a wait for a published bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The bundle appeared upstream
    Found,
    /// The caller cancelled before the bundle appeared
    Cancelled,
}

/// Poll until a bundle is published, the wait is cancelled, or a fatal
/// network error occurs
///
/// A missing bundle is the expected steady state here, so only non-404
/// failures abort the loop.
pub async fn wait_for_bundle(
    client: &DownloadClient,
    url: &str,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<WaitOutcome, DepforgeError> {
    loop {
        match client.probe(url).await? {
            Probe::Found => return Ok(WaitOutcome::Found),
            Probe::NotFound => {
                info!("Bundle not yet published, retrying in {}s", interval.as_secs());
            }
        }
        tokio::select! {
            () = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
            () = tokio::time::sleep(interval) => {}
        }
    }
}

/// Unpack the archive into the staging tree
///
/// A downloaded archive is discarded afterwards whether or not extraction
/// succeeded; only a pre-existing local archive is kept.
fn extract_into_staging(
    archive: &Path,
    staging: &Path,
    downloaded: bool,
) -> Result<(), DownloadError> {
    let extracted = extract_archive(archive, staging);
    if downloaded {
        let _ = std::fs::remove_file(archive);
    }
    extracted
}

fn extract_archive(archive: &Path, dest: &Path) -> Result<(), DownloadError> {
    let extract_error = |e: std::io::Error| DownloadError::ExtractFailed {
        path: archive.to_path_buf(),
        error: e.to_string(),
    };
    let file = std::fs::File::open(archive).map_err(extract_error)?;
    let mut reader = tar::Archive::new(flate2::read::GzDecoder::new(file));
    reader.unpack(dest).map_err(extract_error)?;
    Ok(())
}

/// Materialize deploy-time templates against the final install location
///
/// Every `*.depforge.in` file has its placeholder token replaced with the
/// real deployment path and is renamed back to its original name.
fn instantiate_templates(staging: &Path, location: &Path) -> Result<(), FilesystemError> {
    let toolroot = location.display().to_string();
    let templates: Vec<PathBuf> = walkdir::WalkDir::new(staging)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(defaults::TEMPLATE_SUFFIX))
        })
        .collect();

    for template in templates {
        let text = filesystem::read_file(&template)?;
        let name = template
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let target = template.with_file_name(name.trim_end_matches(defaults::TEMPLATE_SUFFIX));
        filesystem::write_file(&target, &text.replace(defaults::TOOLROOT_TOKEN, &toolroot))?;
        std::fs::remove_file(&template).map_err(|e| FilesystemError::RemoveDir {
            path: template.clone(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}
