//! Session orchestration
//!
//! Drives one producer session end to end: deploy the bootstrap
//! toolchain, synchronize package sources, run the per-package builds in
//! dependency order, and stage the result into a publishable archive.
//!
//! The per-package manifest doubles as the completion marker. A package
//! whose manifest exists is skipped wholesale; anything that interrupts a
//! build leaves no manifest behind, so the next session redoes exactly the
//! unfinished work. Source drift invalidates the whole session: one
//! modified checkout wipes every install prefix and build directory,
//! because already-built packages may have linked against the old code.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::defaults;
use crate::core::build_env::{self, BuildEnvironment};
use crate::core::deploy::{self, SourceState};
use crate::core::layout::{runtimes_for, RuntimeVariant, SessionLayout};
use crate::core::machine::{BuildConfig, MachineSpec};
use crate::core::predicate::EvalContext;
use crate::core::selector;
use crate::core::spec::{BundleKind, DependencyParameters, PackageSpec};
use crate::core::stage::Stager;
use crate::error::{BuildError, DepforgeError};
use crate::infra::download::DownloadClient;
use crate::infra::{filesystem, git, meson};

/// Caller-selected narrowing of the build set
#[derive(Debug, Default, Clone)]
pub struct BuildOptions {
    /// Build only these packages and their dependency closures
    pub only: Option<BTreeSet<String>>,
    /// Drop these packages from the ordered build set
    pub excluded: BTreeSet<String>,
}

/// What a session produced and how long each phase took
#[derive(Debug)]
pub struct BuildReport {
    /// The staged bundle archive
    pub artifact: PathBuf,
    /// Packages built this session, in build order
    pub built: Vec<String>,
    /// Packages whose manifests already existed
    pub skipped: Vec<String>,
    pub prepare_time: Duration,
    pub build_time: Duration,
    pub package_time: Duration,
}

/// One producer session
pub struct Builder {
    bundle: BundleKind,
    build_machine: MachineSpec,
    host_machine: MachineSpec,
    layout: SessionLayout,
    params: DependencyParameters,
    runtimes: Vec<RuntimeVariant>,
    client: DownloadClient,
}

impl Builder {
    pub fn new(
        bundle: BundleKind,
        build_machine: MachineSpec,
        host_machine: MachineSpec,
        layout: SessionLayout,
        params: DependencyParameters,
    ) -> Self {
        let runtimes = runtimes_for(bundle, &host_machine);
        Self {
            bundle,
            build_machine,
            host_machine,
            layout,
            params,
            runtimes,
            client: DownloadClient::new(),
        }
    }

    /// Run the session and return the staged artifact
    pub async fn run(&self, options: &BuildOptions) -> Result<BuildReport, DepforgeError> {
        let started = Instant::now();

        let ctx = EvalContext {
            bundle: self.bundle,
            machine: &self.host_machine,
        };
        let packages = selector::select_packages(
            &self.params,
            ctx,
            options.only.as_ref(),
            &options.excluded,
        )?;
        info!(
            "Building {} for {}: {} packages",
            self.bundle.name(),
            self.host_machine,
            packages.len()
        );

        let env = self.prepare(&packages).await?;
        let prepare_time = started.elapsed();

        let building = Instant::now();
        let mut built = Vec::new();
        let mut skipped = Vec::new();
        for pkg in &packages {
            if self.build_package(pkg, &env)? {
                built.push(pkg.identifier.clone());
            } else {
                skipped.push(pkg.identifier.clone());
            }
        }
        let build_time = building.elapsed();

        let packaging = Instant::now();
        let toolchain_prefix = self.layout.toolchain_prefix();
        let stager = Stager::new(
            &self.layout,
            self.bundle,
            &self.host_machine,
            &self.runtimes,
            &toolchain_prefix,
        );
        let artifact = stager.stage(&self.params.deps_version)?;
        let package_time = packaging.elapsed();

        Ok(BuildReport {
            artifact,
            built,
            skipped,
            prepare_time,
            build_time,
            package_time,
        })
    }

    /// Deploy the bootstrap toolchain, synchronize sources, and generate
    /// the shared build configuration
    async fn prepare(&self, packages: &[PackageSpec]) -> Result<BuildEnvironment, DepforgeError> {
        if !meson::is_available() {
            return Err(BuildError::ToolNotFound.into());
        }

        let toolchain_state = deploy::deploy(
            &self.client,
            BundleKind::Toolchain,
            &self.build_machine,
            &self.layout.toolchain_prefix(),
            &self.params.bootstrap_version,
        )
        .await?;

        // A replaced toolchain taints everything built with the old one.
        let mut invalidated = toolchain_state == SourceState::Modified;
        for pkg in packages {
            if self.sync_source(pkg)? == SourceState::Modified {
                invalidated = true;
            }
        }
        if invalidated {
            self.discard_built_state()?;
        }

        let env = build_env::prepare(
            &self.layout.builddir_container(),
            &self.build_machine,
            &self.host_machine,
            &self.layout.toolchain_prefix(),
        )?;
        Ok(env)
    }

    /// Drop every install prefix and build directory from earlier sessions
    ///
    /// Wiping the install prefixes also wipes the manifests, so every
    /// package rebuilds from scratch afterwards.
    fn discard_built_state(&self) -> Result<(), DepforgeError> {
        warn!("Build inputs changed, discarding all previously built state");
        filesystem::remove_dir_all(&self.layout.outdir())?;
        filesystem::remove_dir_all(&self.layout.builddir_container())?;
        Ok(())
    }

    /// Bring one package checkout to its pinned revision
    fn sync_source(&self, pkg: &PackageSpec) -> Result<SourceState, DepforgeError> {
        let sourcedir = self.layout.sourcedir(pkg);
        if sourcedir.join(".git").exists() {
            let current = git::head_revision(&sourcedir)?;
            if current == pkg.version {
                return Ok(SourceState::Pristine);
            }
            info!("Updating {} to {}", pkg.identifier, pkg.version);
            git::fetch(&sourcedir)?;
            git::checkout(&sourcedir, &pkg.version)?;
            return Ok(SourceState::Modified);
        }

        info!("Cloning {} from {}", pkg.identifier, pkg.url);
        filesystem::create_dir_all(self.layout.workdir())?;
        git::clone_recursive(&pkg.url, &sourcedir)?;
        git::checkout(&sourcedir, &pkg.version)?;
        Ok(SourceState::Pristine)
    }

    /// Build one package for every runtime; true when any work ran
    fn build_package(
        &self,
        pkg: &PackageSpec,
        env: &BuildEnvironment,
    ) -> Result<bool, DepforgeError> {
        let mut worked = false;
        for &runtime in &self.runtimes {
            let manifest = self.layout.manifest_path(pkg, runtime);
            if manifest.is_file() {
                debug!("{} ({}) already built", pkg.identifier, runtime.name());
                continue;
            }
            self.build_for_runtime(pkg, runtime, env)?;
            worked = true;
        }
        Ok(worked)
    }

    fn build_for_runtime(
        &self,
        pkg: &PackageSpec,
        runtime: RuntimeVariant,
        env: &BuildEnvironment,
    ) -> Result<(), DepforgeError> {
        info!("Building {} ({})", pkg.identifier, runtime.name());

        let builddir = self.layout.builddir(pkg, runtime);
        filesystem::remove_dir_all(&builddir)?;
        filesystem::create_dir_all(&builddir)?;

        let prefix = self.layout.prefix(runtime);
        let config = self.host_machine.config;
        let vscrt = if self.host_machine.os == "windows" {
            Some(meson::vscrt(config, runtime).to_string())
        } else {
            None
        };

        let args = meson::SetupArgs {
            sourcedir: self.layout.sourcedir(pkg),
            builddir: builddir.clone(),
            native_file: env.native_file.clone(),
            cross_file: env.cross_file.clone(),
            prefix: prefix.clone(),
            libdir: prefix.join("lib"),
            pkg_config_path: prefix.join(self.host_machine.libdatadir()).join("pkgconfig"),
            default_library: defaults::DEFAULT_LIBRARY.to_string(),
            optimization: meson::optimization(config).to_string(),
            ndebug: config == BuildConfig::Release,
            vscrt,
            extra_options: pkg
                .options
                .iter()
                .map(|opt| format_option(&opt.value))
                .collect(),
        };

        meson::setup(&pkg.identifier, &args, &env.env)?;
        meson::install(&pkg.identifier, &builddir, &env.env)?;

        let installed = meson::introspect_installed(&pkg.identifier, &builddir, &env.env)?;
        let mut entries = Vec::with_capacity(installed.len());
        for path in installed {
            let rel = path
                .strip_prefix(&prefix)
                .map_err(|_| BuildError::OutsidePrefix {
                    path: path.clone(),
                    prefix: prefix.clone(),
                })?;
            entries.push(rel.display().to_string());
        }
        crate::core::manifest::write_manifest(&self.layout.manifest_path(pkg, runtime), &entries)?;
        Ok(())
    }
}

/// Package options are written bare in deps.toml; prefix them for the
/// build tool unless the author already did
fn format_option(value: &str) -> String {
    if value.starts_with('-') {
        value.to_string()
    } else {
        format!("-D{value}")
    }
}
