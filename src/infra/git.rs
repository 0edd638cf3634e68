//! Version-control collaborator
//!
//! Thin wrappers around the `git` command line: clone with submodules,
//! fetch, checkout to a pinned revision, and read the current revision.
//! Every call blocks, captures output, and fails hard on a non-zero exit.

use std::path::Path;
use std::process::Command;

use crate::error::GitError;

fn run(operation: &str, context: &str, cmd: &mut Command) -> Result<String, GitError> {
    let output = cmd.output().map_err(|e| GitError::SpawnFailed {
        error: e.to_string(),
    })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(GitError::CommandFailed {
            operation: operation.to_string(),
            context: context.to_string(),
            output: combined.trim().to_string(),
        })
    }
}

/// Clone a repository, recursively fetching nested submodule references
pub fn clone_recursive(url: &str, dest: &Path) -> Result<(), GitError> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    run(
        "clone",
        url,
        Command::new("git")
            .args(["clone", "-q", "--recurse-submodules", url, &name])
            .current_dir(parent),
    )?;
    Ok(())
}

/// Fetch from the default remote
pub fn fetch(repo: &Path) -> Result<(), GitError> {
    run(
        "fetch",
        &repo.display().to_string(),
        Command::new("git").args(["fetch", "-q"]).current_dir(repo),
    )?;
    Ok(())
}

/// Check out a specific revision
pub fn checkout(repo: &Path, revision: &str) -> Result<(), GitError> {
    run(
        "checkout",
        &repo.display().to_string(),
        Command::new("git")
            .args(["checkout", "-q", revision])
            .current_dir(repo),
    )?;
    Ok(())
}

/// Read the revision the working copy currently points at
pub fn head_revision(repo: &Path) -> Result<String, GitError> {
    run(
        "rev-parse",
        &repo.display().to_string(),
        Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(repo),
    )
}

/// Stage a file and commit with the given message
///
/// Used by the bump maintenance workflow to record version changes.
pub fn commit_file(repo: &Path, file: &str, message: &str) -> Result<(), GitError> {
    run(
        "add",
        file,
        Command::new("git").args(["add", file]).current_dir(repo),
    )?;
    run(
        "commit",
        file,
        Command::new("git")
            .args(["commit", "-m", message])
            .current_dir(repo),
    )?;
    Ok(())
}
