//! Per-package install manifests
//!
//! A manifest lists the files one (package, runtime) build installed,
//! relative to its install prefix, one per line, sorted. The manifest's
//! existence is the authoritative "already built" marker: it is written
//! only after a build fully succeeds, so a crash mid-build leaves no
//! manifest and the next session rebuilds.

use std::path::Path;

use crate::config::defaults;
use crate::error::FilesystemError;

/// Write a manifest from prefix-relative paths
///
/// Paths are normalized to forward slashes and sorted lexicographically.
pub fn write_manifest(path: &Path, entries: &[String]) -> Result<(), FilesystemError> {
    let mut lines: Vec<String> = entries.iter().map(|e| e.replace('\\', "/")).collect();
    lines.sort();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FilesystemError::CreateDir {
            path: parent.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    std::fs::write(path, lines.join("\n") + "\n").map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read a manifest's entries
pub fn read_manifest(path: &Path) -> Result<Vec<String>, FilesystemError> {
    let content = std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Prune every manifest under a staged prefix to the files that survived
/// staging
///
/// For each entry the referenced file must exist under the prefix or the
/// line is dropped. A static archive entry whose dynamic-runtime
/// counterpart was staged under `lib-dynamic/` gains an extra line for the
/// relocated path. Manifests left empty are deleted rather than shipped.
pub fn prune_manifests(prefix: &Path) -> Result<(), FilesystemError> {
    let manifest_dir = prefix.join(defaults::MANIFEST_DIR);
    if !manifest_dir.is_dir() {
        return Ok(());
    }

    let entries = std::fs::read_dir(&manifest_dir).map_err(|e| FilesystemError::ReadFile {
        path: manifest_dir.clone(),
        error: e.to_string(),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| FilesystemError::ReadFile {
            path: manifest_dir.clone(),
            error: e.to_string(),
        })?;
        let manifest_path = entry.path();
        if manifest_path.extension().and_then(|e| e.to_str()) != Some(defaults::MANIFEST_EXT) {
            continue;
        }
        prune_one(prefix, &manifest_path)?;
    }

    Ok(())
}

fn prune_one(prefix: &Path, manifest_path: &Path) -> Result<(), FilesystemError> {
    let mut lines = Vec::new();
    for entry in read_manifest(manifest_path)? {
        if prefix.join(&entry).exists() {
            lines.push(entry.clone());
        }

        if let Some(rest) = entry.strip_prefix("lib/") {
            if entry.ends_with(".a") {
                let dynamic_entry = format!("{}/{rest}", defaults::DYNAMIC_LIB_DIR);
                if prefix.join(&dynamic_entry).exists() {
                    lines.push(dynamic_entry);
                }
            }
        }
    }

    if lines.is_empty() {
        std::fs::remove_file(manifest_path).map_err(|e| FilesystemError::WriteFile {
            path: manifest_path.to_path_buf(),
            error: e.to_string(),
        })
    } else {
        write_manifest(manifest_path, &lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_sorts_and_normalizes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest").join("pkg.pkg");
        write_manifest(
            &path,
            &[
                "lib/libz.a".to_string(),
                "include\\zlib.h".to_string(),
                "bin/tool".to_string(),
            ],
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "bin/tool\ninclude/zlib.h\nlib/libz.a\n");
    }

    #[test]
    fn test_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pkg.pkg");
        write_manifest(&path, &["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(read_manifest(&path).unwrap(), vec!["a", "b"]);
    }

    fn stage_file(prefix: &Path, rel: &str) {
        let path = prefix.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_prune_drops_unstaged_entries() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path();
        stage_file(prefix, "include/zlib.h");
        let manifest = prefix.join("manifest/zlib.pkg");
        write_manifest(
            &manifest,
            &["include/zlib.h".to_string(), "share/doc/README".to_string()],
        )
        .unwrap();

        prune_manifests(prefix).unwrap();
        assert_eq!(read_manifest(&manifest).unwrap(), vec!["include/zlib.h"]);
    }

    #[test]
    fn test_prune_adds_dynamic_counterpart() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path();
        stage_file(prefix, "lib/libz.a");
        stage_file(prefix, "lib-dynamic/libz.a");
        let manifest = prefix.join("manifest/zlib.pkg");
        write_manifest(&manifest, &["lib/libz.a".to_string()]).unwrap();

        prune_manifests(prefix).unwrap();
        assert_eq!(
            read_manifest(&manifest).unwrap(),
            vec!["lib-dynamic/libz.a", "lib/libz.a"]
        );
    }

    #[test]
    fn test_prune_records_relocated_only_archive() {
        // The static entry itself was not staged but its dynamic
        // counterpart was; only the relocated path survives.
        let dir = TempDir::new().unwrap();
        let prefix = dir.path();
        stage_file(prefix, "lib-dynamic/libz.a");
        let manifest = prefix.join("manifest/zlib.pkg");
        write_manifest(&manifest, &["lib/libz.a".to_string()]).unwrap();

        prune_manifests(prefix).unwrap();
        assert_eq!(read_manifest(&manifest).unwrap(), vec!["lib-dynamic/libz.a"]);
    }

    #[test]
    fn test_empty_manifest_is_deleted() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path();
        let manifest = prefix.join("manifest/ghost.pkg");
        write_manifest(&manifest, &["gone/file".to_string()]).unwrap();

        prune_manifests(prefix).unwrap();
        assert!(!manifest.exists());
    }

}
