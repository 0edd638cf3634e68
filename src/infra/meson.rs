//! External build tool collaborator
//!
//! Drives `meson` for configure, install, and installed-file introspection.
//! All calls block with captured output; a non-zero exit aborts the session
//! with the captured streams attached to the error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::layout::RuntimeVariant;
use crate::core::machine::BuildConfig;
use crate::error::BuildError;

/// Arguments for one `meson setup` invocation
#[derive(Debug, Clone)]
pub struct SetupArgs {
    /// Source directory the invocation runs in
    pub sourcedir: PathBuf,
    /// Isolated build-scratch directory
    pub builddir: PathBuf,
    /// Native machine description file
    pub native_file: PathBuf,
    /// Cross machine description file, when cross-building
    pub cross_file: Option<PathBuf>,
    /// Install prefix
    pub prefix: PathBuf,
    /// Library directory under the prefix
    pub libdir: PathBuf,
    /// pkg-config search path under the prefix
    pub pkg_config_path: PathBuf,
    /// Default linkage mode
    pub default_library: String,
    /// Optimization level option value
    pub optimization: String,
    /// Whether assertions are compiled out
    pub ndebug: bool,
    /// CRT linkage flavor option value, on platforms that have one
    pub vscrt: Option<String>,
    /// The package's effective option list, passed through verbatim
    pub extra_options: Vec<String>,
}

/// Whether meson can be found on PATH
pub fn is_available() -> bool {
    which::which("meson").is_ok()
}

fn run(
    operation: &str,
    package: &str,
    cwd: &Path,
    env: &HashMap<String, String>,
    args: &[String],
) -> Result<String, BuildError> {
    let output = Command::new("meson")
        .args(args)
        .current_dir(cwd)
        .envs(env)
        .output()
        .map_err(|e| BuildError::SpawnFailed {
            error: e.to_string(),
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(BuildError::ToolFailed {
            operation: operation.to_string(),
            package: package.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Configure a build directory
pub fn setup(
    package: &str,
    args: &SetupArgs,
    env: &HashMap<String, String>,
) -> Result<(), BuildError> {
    let mut argv = vec![
        "setup".to_string(),
        args.builddir.display().to_string(),
        format!("--native-file={}", args.native_file.display()),
    ];
    if let Some(cross_file) = &args.cross_file {
        argv.push(format!("--cross-file={}", cross_file.display()));
    }
    argv.push(format!("-Dprefix={}", args.prefix.display()));
    argv.push(format!("-Dlibdir={}", args.libdir.display()));
    argv.push(format!("-Dpkg_config_path={}", args.pkg_config_path.display()));
    argv.push(format!("-Ddefault_library={}", args.default_library));
    argv.push("-Dbackend=ninja".to_string());
    argv.push(format!("-Doptimization={}", args.optimization));
    argv.push(format!("-Db_ndebug={}", args.ndebug));
    argv.push("-Dstrip=true".to_string());
    if let Some(vscrt) = &args.vscrt {
        argv.push(format!("-Db_vscrt={vscrt}"));
    }
    argv.extend(args.extra_options.iter().cloned());

    run("setup", package, &args.sourcedir, env, &argv)?;
    Ok(())
}

/// Build and install into the configured prefix
pub fn install(
    package: &str,
    builddir: &Path,
    env: &HashMap<String, String>,
) -> Result<(), BuildError> {
    run("install", package, builddir, env, &["install".to_string()])?;
    Ok(())
}

/// Enumerate every file the build installed
///
/// `meson introspect --installed` reports a JSON object whose values are
/// absolute installed paths.
pub fn introspect_installed(
    package: &str,
    builddir: &Path,
    env: &HashMap<String, String>,
) -> Result<Vec<PathBuf>, BuildError> {
    let stdout = run(
        "introspect",
        package,
        builddir,
        env,
        &["introspect".to_string(), "--installed".to_string()],
    )?;

    let locations: HashMap<String, String> =
        serde_json::from_str(&stdout).map_err(|e| BuildError::BadIntrospection {
            package: package.to_string(),
            error: e.to_string(),
        })?;

    let mut paths: Vec<PathBuf> = locations.into_values().map(PathBuf::from).collect();
    paths.sort();
    Ok(paths)
}

/// The CRT linkage option value for a configuration and runtime
pub fn vscrt(config: BuildConfig, runtime: RuntimeVariant) -> &'static str {
    match (runtime, config) {
        (RuntimeVariant::Dynamic, BuildConfig::Release) => "md",
        (RuntimeVariant::Dynamic, BuildConfig::Debug) => "mdd",
        (RuntimeVariant::Static, BuildConfig::Release) => "mt",
        (RuntimeVariant::Static, BuildConfig::Debug) => "mtd",
    }
}

/// Optimization level for a configuration
pub fn optimization(config: BuildConfig) -> &'static str {
    match config {
        BuildConfig::Release => "s",
        BuildConfig::Debug => "0",
    }
}
