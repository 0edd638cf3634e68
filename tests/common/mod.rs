//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

use std::path::PathBuf;
use tempfile::TempDir;

/// Test project context
///
/// Creates a temporary directory holding a deps.toml and whatever trees
/// a scenario needs.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists in the test project
    #[allow(dead_code)]
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    #[allow(dead_code)]
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample deps.toml for testing
#[allow(dead_code)]
pub const SAMPLE_DEPS: &str = r#"
[dependencies]
version = "20260815"
bootstrap_version = "20260701"

[zlib]
name = "zlib"
version = "0d6eb2a21f6f2b46e4a4f1d1bf0d4fe4e16e21d3"
url = "https://github.com/depforge-project/zlib.git"

[libffi]
name = "libffi"
version = "8e3ef9654cd2aec1e9a84de8edcbb26fc51f6e4c"
url = "https://github.com/depforge-project/libffi.git"

[glib]
name = "GLib"
version = "f1a9f164c77cbbd6a2b2f09ec6fa541c1cb0a522"
url = "https://github.com/depforge-project/glib.git"
options = [
    "tests=false",
    { value = "iconv=external", when = "machine.os == 'linux'" },
]
dependencies = ["zlib", "libffi"]

[vala]
name = "Vala"
version = "2a866e14c3ecb918b02e1f52b0bf74a003b63259"
url = "https://github.com/depforge-project/vala.git"
dependencies = ["glib"]
scope = "toolchain"

[v8]
name = "V8"
version = "6f5e63996c31ac24ad509b9a4e59ce2da5c6fcb4"
url = "https://github.com/depforge-project/v8.git"
dependencies = ["glib"]
when = "machine.arch != 'armbe8'"
"#;
