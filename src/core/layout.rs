//! Session directory layout
//!
//! Every path a build session touches is derived here, keyed by
//! (bundle kind, host identifier, runtime variant, package identifier).
//! No two build steps ever share a writable directory.

use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::machine::MachineSpec;
use crate::core::spec::{BundleKind, PackageSpec};

/// CRT/linkage flavor a package is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeVariant {
    /// Statically linked C runtime
    Static,
    /// Dynamically linked C runtime (Windows SDK builds only)
    Dynamic,
}

impl RuntimeVariant {
    /// Lowercase name used in directory names and option values
    pub fn name(self) -> &'static str {
        match self {
            RuntimeVariant::Static => "static",
            RuntimeVariant::Dynamic => "dynamic",
        }
    }
}

/// The runtime variants applicable to a session
pub fn runtimes_for(bundle: BundleKind, host: &MachineSpec) -> Vec<RuntimeVariant> {
    let mut runtimes = vec![RuntimeVariant::Static];
    if host.os == "windows" && bundle == BundleKind::Sdk {
        runtimes.push(RuntimeVariant::Dynamic);
    }
    runtimes
}

/// Resolved directory layout for one build session
#[derive(Debug, Clone)]
pub struct SessionLayout {
    bundle: BundleKind,
    host: MachineSpec,
    /// Cache root, typically `~/.cache/depforge`
    cachedir: PathBuf,
    /// Source checkouts and per-bundle scratch live under here
    workdir: PathBuf,
}

impl SessionLayout {
    /// Create a layout rooted at the given cache directory
    pub fn new(cachedir: PathBuf, bundle: BundleKind, host: MachineSpec) -> Self {
        let workdir = cachedir.join("src");
        Self {
            bundle,
            host,
            cachedir,
            workdir,
        }
    }

    /// Layout rooted at the platform cache directory
    pub fn for_user_cache(bundle: BundleKind, host: MachineSpec) -> Self {
        let cachedir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("depforge");
        Self::new(cachedir, bundle, host)
    }

    /// The cache root
    pub fn cachedir(&self) -> &Path {
        &self.cachedir
    }

    /// The working directory holding sources and scratch trees
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Where the bootstrap toolchain bundle is deployed
    pub fn toolchain_prefix(&self) -> PathBuf {
        self.cachedir.join("toolchain")
    }

    /// A package's source checkout
    pub fn sourcedir(&self, pkg: &PackageSpec) -> PathBuf {
        self.workdir.join(&pkg.identifier)
    }

    /// The accumulated install-output tree for this bundle
    pub fn outdir(&self) -> PathBuf {
        self.workdir.join(format!("_{}.out", self.bundle.name()))
    }

    /// The build-scratch container for this bundle
    pub fn builddir_container(&self) -> PathBuf {
        self.workdir.join(format!("_{}.tmp", self.bundle.name()))
    }

    /// The isolated scratch directory for one (package, runtime) build
    pub fn builddir(&self, pkg: &PackageSpec, runtime: RuntimeVariant) -> PathBuf {
        self.builddir_container()
            .join(self.output_id(runtime))
            .join(&pkg.identifier)
    }

    /// The install prefix for one runtime variant
    pub fn prefix(&self, runtime: RuntimeVariant) -> PathBuf {
        self.outdir().join(self.output_id(runtime))
    }

    /// The manifest recording one (package, runtime) build's installed files
    pub fn manifest_path(&self, pkg: &PackageSpec, runtime: RuntimeVariant) -> PathBuf {
        self.prefix(runtime)
            .join(defaults::MANIFEST_DIR)
            .join(format!("{}.{}", pkg.identifier, defaults::MANIFEST_EXT))
    }

    /// The archive the session produces
    pub fn artifact_path(&self) -> PathBuf {
        self.cachedir.join(format!(
            "{}-{}.tar.gz",
            self.bundle.name(),
            self.host.identifier()
        ))
    }

    /// Prefix directory name: host identifier, plus the runtime on
    /// platforms where variants coexist
    fn output_id(&self, runtime: RuntimeVariant) -> String {
        if self.host.os == "windows" {
            format!("{}-{}", self.host.identifier(), runtime.name())
        } else {
            self.host.identifier()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(bundle: BundleKind, host: MachineSpec) -> SessionLayout {
        SessionLayout::new(PathBuf::from("/cache"), bundle, host)
    }

    #[test]
    fn test_linux_prefix_has_no_runtime_component() {
        let l = layout(BundleKind::Sdk, MachineSpec::new("linux", "x86_64"));
        assert_eq!(
            l.prefix(RuntimeVariant::Static),
            PathBuf::from("/cache/src/_sdk.out/linux-x86_64")
        );
    }

    #[test]
    fn test_windows_prefixes_are_runtime_keyed() {
        let l = layout(BundleKind::Sdk, MachineSpec::new("windows", "x86_64"));
        assert_eq!(
            l.prefix(RuntimeVariant::Static),
            PathBuf::from("/cache/src/_sdk.out/windows-x86_64-static")
        );
        assert_eq!(
            l.prefix(RuntimeVariant::Dynamic),
            PathBuf::from("/cache/src/_sdk.out/windows-x86_64-dynamic")
        );
    }

    #[test]
    fn test_manifest_path_shape() {
        let l = layout(BundleKind::Toolchain, MachineSpec::new("linux", "x86_64"));
        let pkg = PackageSpec {
            identifier: "zlib".into(),
            name: "zlib".into(),
            version: "v".into(),
            url: "u".into(),
            options: vec![],
            dependencies: vec![],
            scope: None,
            when: crate::core::predicate::Predicate::Always,
        };
        assert_eq!(
            l.manifest_path(&pkg, RuntimeVariant::Static),
            PathBuf::from("/cache/src/_toolchain.out/linux-x86_64/manifest/zlib.pkg")
        );
    }

    #[test]
    fn test_scratch_and_output_are_disjoint_per_bundle() {
        let sdk = layout(BundleKind::Sdk, MachineSpec::new("linux", "x86_64"));
        let tc = layout(BundleKind::Toolchain, MachineSpec::new("linux", "x86_64"));
        assert_ne!(sdk.outdir(), tc.outdir());
        assert_ne!(sdk.builddir_container(), tc.builddir_container());
        assert_ne!(sdk.outdir(), sdk.builddir_container());
    }

    #[test]
    fn test_runtimes_for() {
        let linux = MachineSpec::new("linux", "x86_64");
        let windows = MachineSpec::new("windows", "x86_64");
        assert_eq!(
            runtimes_for(BundleKind::Sdk, &linux),
            vec![RuntimeVariant::Static]
        );
        assert_eq!(
            runtimes_for(BundleKind::Sdk, &windows),
            vec![RuntimeVariant::Static, RuntimeVariant::Dynamic]
        );
        assert_eq!(
            runtimes_for(BundleKind::Toolchain, &windows),
            vec![RuntimeVariant::Static]
        );
    }

    #[test]
    fn test_artifact_name() {
        let l = layout(BundleKind::Sdk, MachineSpec::new("macos", "arm64"));
        assert_eq!(
            l.artifact_path(),
            PathBuf::from("/cache/sdk-macos-arm64.tar.gz")
        );
    }
}
