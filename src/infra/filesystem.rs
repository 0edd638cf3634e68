//! Filesystem operations
//!
//! Handles file and directory operations with path-carrying errors.

use std::path::{Path, PathBuf};

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a directory and all its contents, if it exists
pub fn remove_dir_all(path: &Path) -> Result<(), FilesystemError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| FilesystemError::RemoveDir {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Write content to a file, creating parent directories as needed
pub fn write_file(path: &Path, content: &str) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Rename a path, replacing nothing that exists at the destination
pub fn rename(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    std::fs::rename(from, to).map_err(|e| FilesystemError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        error: e.to_string(),
    })
}

/// Copy a set of relative paths from one tree into another
///
/// `transform` maps each source-relative path to its destination-relative
/// path; identity keeps the layout. Symlinks are copied as links, not
/// followed.
pub fn copy_files(
    fromdir: &Path,
    files: &[PathBuf],
    todir: &Path,
    transform: impl Fn(&Path) -> PathBuf,
) -> Result<(), FilesystemError> {
    for file in files {
        let src = fromdir.join(file);
        let dst = todir.join(transform(file));
        if let Some(parent) = dst.parent() {
            create_dir_all(parent)?;
        }

        let copy_error = |e: std::io::Error| FilesystemError::CopyFile {
            from: src.clone(),
            to: dst.clone(),
            error: e.to_string(),
        };

        let metadata = std::fs::symlink_metadata(&src).map_err(copy_error)?;
        if metadata.file_type().is_symlink() {
            copy_symlink(&src, &dst).map_err(copy_error)?;
        } else {
            std::fs::copy(&src, &dst).map_err(copy_error)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    let target = std::fs::read_link(src)?;
    if dst.exists() {
        std::fs::remove_file(dst)?;
    }
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    // Windows symlink creation needs privileges; fall back to a copy.
    std::fs::copy(src, dst).map(|_| ())
}
