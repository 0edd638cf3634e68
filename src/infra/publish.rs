//! Remote publish collaborators
//!
//! Wraps the external tools used when rolling a bundle out: the `aws` CLI
//! for the authoritative object-store check and the upload, `cfcli` for
//! CDN invalidation, and an optional operator-supplied post-processing
//! script invoked with the produced artifact.

use std::path::Path;
use std::process::Command;

use crate::error::PublishError;

/// Whether the object exists in the remote store
///
/// `aws s3 ls` exits 0 when the listing matched, 1 when it matched
/// nothing; anything else is an access failure.
pub fn s3_object_exists(s3_url: &str) -> Result<bool, PublishError> {
    let output = Command::new("aws")
        .args(["s3", "ls", s3_url])
        .output()
        .map_err(|e| PublishError::SpawnFailed {
            tool: "aws".to_string(),
            error: e.to_string(),
        })?;

    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(PublishError::ToolFailed {
            tool: "aws".to_string(),
            output: String::from_utf8_lossy(&output.stdout).trim().to_string()
                + &String::from_utf8_lossy(&output.stderr),
        }),
    }
}

/// Upload an artifact to the remote store
pub fn s3_upload(artifact: &Path, s3_url: &str) -> Result<(), PublishError> {
    run_tool(
        "aws",
        Command::new("aws").args(["s3", "cp", &artifact.display().to_string(), s3_url]),
    )
}

/// Invalidate the public URL at the CDN edge
pub fn purge_cdn(public_url: &str) -> Result<(), PublishError> {
    run_tool("cfcli", Command::new("cfcli").args(["purge", public_url]))
}

/// Invoke an operator-supplied post-processing hook
///
/// The hook receives the bundle kind, host identifier, artifact path, and
/// version as long options, mirroring what the roll flow knows.
pub fn run_post_script(
    script: &Path,
    bundle: &str,
    host: &str,
    artifact: &Path,
    version: &str,
) -> Result<(), PublishError> {
    if !script.exists() {
        return Err(PublishError::PostScriptNotFound {
            path: script.to_path_buf(),
        });
    }
    run_tool(
        "post-processing script",
        Command::new(script)
            .arg(format!("--bundle={bundle}"))
            .arg(format!("--host={host}"))
            .arg(format!("--artifact={}", artifact.display()))
            .arg(format!("--version={version}")),
    )
}

fn run_tool(tool: &str, cmd: &mut Command) -> Result<(), PublishError> {
    let output = cmd.output().map_err(|e| PublishError::SpawnFailed {
        tool: tool.to_string(),
        error: e.to_string(),
    })?;

    if output.status.success() {
        Ok(())
    } else {
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(PublishError::ToolFailed {
            tool: tool.to_string(),
            output: combined.trim().to_string(),
        })
    }
}
