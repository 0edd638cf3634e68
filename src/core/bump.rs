//! Dependency version maintenance
//!
//! Walks every package hosted under the upstream organization, asks
//! GitHub for the branch head, and rewrites stale pins in deps.toml,
//! committing each bump separately so a bad update can be reverted on
//! its own.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{defaults, urls};
use crate::core::spec::{self, DependencyParameters};
use crate::error::{DepforgeError, PublishError};
use crate::infra::git;

/// One applied version bump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bump {
    pub identifier: String,
    pub old_version: String,
    pub new_version: String,
}

/// Result of one bump run
#[derive(Debug, Default)]
pub struct BumpReport {
    /// Packages checked against their upstream branch head
    pub checked: usize,
    /// Pins that were stale and got rewritten and committed
    pub updated: Vec<Bump>,
}

/// GitHub credentials sourced from the environment
struct Credentials {
    username: String,
    token: String,
}

impl Credentials {
    fn from_env() -> Result<Self, PublishError> {
        let read = |variable: &str| {
            std::env::var(variable).map_err(|_| PublishError::MissingCredential {
                variable: variable.to_string(),
            })
        };
        Ok(Self {
            username: read("GH_USERNAME")?,
            token: read("GH_TOKEN")?,
        })
    }
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
}

/// Update stale package pins in `repo_dir/deps.toml`
///
/// Only packages hosted under the upstream organization participate;
/// third-party URLs are pinned by hand.
pub async fn bump(repo_dir: &Path) -> Result<BumpReport, DepforgeError> {
    let credentials = Credentials::from_env()?;
    let deps_path = repo_dir.join(defaults::DEPS_FILE_NAME);
    let params = DependencyParameters::load(&deps_path)?;

    let client = reqwest::Client::new();
    let mut report = BumpReport::default();

    for (identifier, pkg) in &params.packages {
        let Some(repo) = upstream_repo_name(&pkg.url) else {
            debug!("Skipping {identifier}: not an upstream package");
            continue;
        };

        report.checked += 1;
        let latest = latest_commit(&client, &credentials, repo).await?;
        if latest == pkg.version {
            debug!("{identifier} is up to date");
            continue;
        }

        info!("Bumping {identifier}: {} -> {latest}", pkg.version);
        spec::rewrite_package_version(&deps_path, identifier, &latest)?;
        git::commit_file(
            repo_dir,
            defaults::DEPS_FILE_NAME,
            &format!("deps: bump {identifier} to {}", &latest[..latest.len().min(12)]),
        )?;

        report.updated.push(Bump {
            identifier: identifier.clone(),
            old_version: pkg.version.clone(),
            new_version: latest,
        });
    }

    Ok(report)
}

/// The repository name for a package hosted under the upstream org
fn upstream_repo_name(url: &str) -> Option<&str> {
    let rest = url.strip_prefix(urls::UPSTREAM_ORG_URL)?;
    let name = rest.trim_end_matches('/').trim_end_matches(".git");
    if name.is_empty() || name.contains('/') {
        None
    } else {
        Some(name)
    }
}

async fn latest_commit(
    client: &reqwest::Client,
    credentials: &Credentials,
    repo: &str,
) -> Result<String, PublishError> {
    let org = urls::UPSTREAM_ORG_URL
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let url = format!("{}/repos/{org}/{repo}/commits/main", urls::GITHUB_API);

    let unexpected = |error: String| PublishError::UnexpectedResponse {
        url: url.clone(),
        error,
    };

    let response = client
        .get(&url)
        .basic_auth(&credentials.username, Some(&credentials.token))
        .header("User-Agent", "depforge")
        .send()
        .await
        .map_err(|e| unexpected(e.to_string()))?;
    if !response.status().is_success() {
        return Err(unexpected(format!("HTTP {}", response.status())));
    }

    let commit: CommitResponse = response
        .json()
        .await
        .map_err(|e| unexpected(e.to_string()))?;
    Ok(commit.sha)
}
