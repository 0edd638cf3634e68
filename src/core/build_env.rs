//! Build-tool machine files and session environment
//!
//! Every package build runs against the same generated native file, an
//! optional cross file, and an environment whose PATH leads with the
//! bootstrap toolchain so freshly deployed build tools win over whatever
//! the host system carries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::machine::MachineSpec;
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// Generated build configuration shared by every package in a session
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    /// Machine file describing the build machine and toolchain binaries
    pub native_file: PathBuf,
    /// Machine file describing the host machine, for cross builds only
    pub cross_file: Option<PathBuf>,
    /// Process environment for build-tool invocations
    pub env: HashMap<String, String>,
}

/// Write machine files into `dir` and assemble the session environment
pub fn prepare(
    dir: &Path,
    build_machine: &MachineSpec,
    host_machine: &MachineSpec,
    toolchain_prefix: &Path,
) -> Result<BuildEnvironment, FilesystemError> {
    filesystem::create_dir_all(dir)?;

    let native_file = dir.join("native.ini");
    filesystem::write_file(
        &native_file,
        &machine_file(build_machine, toolchain_prefix),
    )?;

    let cross_file = if build_machine.is_cross_for(host_machine) {
        let path = dir.join("cross.ini");
        filesystem::write_file(&path, &machine_file(host_machine, toolchain_prefix))?;
        Some(path)
    } else {
        None
    };

    Ok(BuildEnvironment {
        native_file,
        cross_file,
        env: session_env(toolchain_prefix),
    })
}

/// Render a machine file for one machine
fn machine_file(machine: &MachineSpec, toolchain_prefix: &Path) -> String {
    let bindir = toolchain_prefix.join("bin");
    let exe = machine_exe_suffix();
    let mut text = String::from("[binaries]\n");
    for (tool, binary) in [("pkg-config", "pkg-config"), ("vala", "valac")] {
        let candidate = bindir.join(format!("{binary}{exe}"));
        if candidate.is_file() {
            text.push_str(&format!("{tool} = '{}'\n", candidate.display()));
        }
    }

    text.push_str(&format!(
        "\n[host_machine]\nsystem = '{}'\ncpu_family = '{}'\ncpu = '{}'\nendian = 'little'\n",
        machine.os,
        cpu_family(&machine.arch),
        machine.arch,
    ));
    text
}

/// Executable suffix of the machine the tools themselves run on
fn machine_exe_suffix() -> &'static str {
    if cfg!(windows) {
        ".exe"
    } else {
        ""
    }
}

/// Map target architecture names onto build-tool CPU family names
fn cpu_family(arch: &str) -> &str {
    match arch {
        "arm64" => "aarch64",
        "armhf" | "armbe8" => "arm",
        other => other,
    }
}

/// Inherit the process environment with the toolchain's bin leading PATH
fn session_env(toolchain_prefix: &Path) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    let bindir = toolchain_prefix.join("bin").display().to_string();
    let separator = if cfg!(windows) { ";" } else { ":" };
    let path = match env.get("PATH") {
        Some(existing) => format!("{bindir}{separator}{existing}"),
        None => bindir,
    };
    env.insert("PATH".to_string(), path);
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_native_only_for_non_cross_session() {
        let dir = TempDir::new().unwrap();
        let machine = MachineSpec::new("linux", "x86_64");
        let env = prepare(dir.path(), &machine, &machine, &dir.path().join("toolchain"))
            .unwrap();
        assert!(env.native_file.is_file());
        assert!(env.cross_file.is_none());

        let text = std::fs::read_to_string(&env.native_file).unwrap();
        assert!(text.contains("system = 'linux'"));
        assert!(text.contains("cpu_family = 'x86_64'"));
    }

    #[test]
    fn test_cross_file_describes_host() {
        let dir = TempDir::new().unwrap();
        let build = MachineSpec::new("linux", "x86_64");
        let host = MachineSpec::new("linux", "arm64");
        let env = prepare(dir.path(), &build, &host, &dir.path().join("toolchain")).unwrap();

        let cross = env.cross_file.unwrap();
        let text = std::fs::read_to_string(&cross).unwrap();
        assert!(text.contains("cpu_family = 'aarch64'"));
        assert!(text.contains("cpu = 'arm64'"));
    }

    #[test]
    fn test_session_env_leads_with_toolchain_bin() {
        let dir = TempDir::new().unwrap();
        let machine = MachineSpec::new("linux", "x86_64");
        let toolchain = dir.path().join("toolchain");
        let env = prepare(dir.path(), &machine, &machine, &toolchain).unwrap();

        let path = env.env.get("PATH").unwrap();
        assert!(path.starts_with(&toolchain.join("bin").display().to_string()));
    }

    #[test]
    fn test_discovered_toolchain_binaries_are_listed() {
        let dir = TempDir::new().unwrap();
        let machine = MachineSpec::new("linux", "x86_64");
        let toolchain = dir.path().join("toolchain");
        std::fs::create_dir_all(toolchain.join("bin")).unwrap();
        std::fs::write(toolchain.join("bin/pkg-config"), b"").unwrap();

        let env = prepare(dir.path(), &machine, &machine, &toolchain).unwrap();
        let text = std::fs::read_to_string(&env.native_file).unwrap();
        assert!(text.contains("pkg-config = '"));
        assert!(!text.contains("vala = '"));
    }
}
