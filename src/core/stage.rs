//! Artifact staging and archive assembly
//!
//! Turns the accumulated install trees into a relocatable bundle: selects
//! the files the bundle kind ships, relocates dynamic-runtime static
//! archives, prunes manifests to what survived, rewrites absolute install
//! prefixes into portable placeholder tokens, and writes the whole staged
//! tree into one compressed archive.
//!
//! Install-time paths must never leak into the archive undisguised:
//! bundles are deployed to arbitrary locations on other machines, and a
//! hardcoded build prefix in a pkg-config file or linker script would
//! break the bundle at the destination.

use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::defaults;
use crate::core::layout::{RuntimeVariant, SessionLayout};
use crate::core::machine::{BuildConfig, MachineSpec};
use crate::core::manifest;
use crate::core::spec::BundleKind;
use crate::error::{DepforgeError, FilesystemError, StageError};
use crate::infra::filesystem;

/// File suffixes belonging to the code-generation toolchain
const TOOLCHAIN_FILE_SUFFIXES: &[&str] = &["vapi", "deps"];

/// Compiler executable name prefix staged into toolchain bundles
const TOOLCHAIN_COMPILER_PREFIX: &str = "valac-";

/// Debug-helper binaries never shipped in a toolchain bundle
const TOOLCHAIN_BIN_EXCLUDES: &[&str] = &["gdbus", "gio", "gobject-query", "gsettings"];

/// Helper-binary name prefix excluded from toolchain bundles
const TOOLCHAIN_BIN_EXCLUDE_PREFIX: &str = "gspawn-";

/// Bootstrap-tool binaries kept in SDK bundles on release configs
const SDK_BIN_KEEP_PREFIXES: &[&str] = &["mksnapshot-"];

/// Stages built artifacts into a relocatable archive
pub struct Stager<'a> {
    layout: &'a SessionLayout,
    bundle: BundleKind,
    host: &'a MachineSpec,
    runtimes: &'a [RuntimeVariant],
    /// Bootstrap toolchain location, mixed into Windows toolchain bundles
    toolchain_prefix: &'a Path,
}

impl<'a> Stager<'a> {
    /// Create a stager over a session's output tree
    pub fn new(
        layout: &'a SessionLayout,
        bundle: BundleKind,
        host: &'a MachineSpec,
        runtimes: &'a [RuntimeVariant],
        toolchain_prefix: &'a Path,
    ) -> Self {
        Self {
            layout,
            bundle,
            host,
            runtimes,
            toolchain_prefix,
        }
    }

    /// Run the staging pipeline and return the produced archive path
    pub fn stage(&self, deps_version: &str) -> Result<PathBuf, DepforgeError> {
        let stagedir = self
            .layout
            .workdir()
            .join(format!("_{}.stage", self.bundle.name()));
        filesystem::remove_dir_all(&stagedir)?;
        filesystem::create_dir_all(&stagedir)?;

        match self.bundle {
            BundleKind::Toolchain => self.stage_toolchain_files(&stagedir)?,
            BundleKind::Sdk => self.stage_sdk_files(&stagedir)?,
        }

        manifest::prune_manifests(&stagedir)?;
        self.rewrite_hardcoded_paths(&stagedir)?;

        filesystem::write_file(
            &stagedir.join(defaults::VERSION_MARKER),
            &format!("{deps_version}\n"),
        )?;

        let artifact = self.layout.artifact_path();
        assemble_archive(&stagedir, &artifact)?;
        filesystem::remove_dir_all(&stagedir)?;

        Ok(artifact)
    }

    fn stage_toolchain_files(&self, dest: &Path) -> Result<(), DepforgeError> {
        // On Windows the bootstrap toolchain is mixed into the bundle,
        // minus its own manifests and anything the fresh build replaces.
        if self.host.os == "windows" {
            let mixin: Vec<PathBuf> = walk_files(self.toolchain_prefix)?
                .into_iter()
                .filter(|rel| {
                    !self.is_toolchain_compiler_file(rel)
                        && rel
                            .parent()
                            .and_then(Path::file_name)
                            .map(|n| n != defaults::MANIFEST_DIR)
                            .unwrap_or(true)
                })
                .collect();
            filesystem::copy_files(self.toolchain_prefix, &mixin, dest, |p| p.to_path_buf())?;
        }

        let prefix = self.layout.prefix(RuntimeVariant::Static);
        let files: Vec<PathBuf> = walk_files(&prefix)?
            .into_iter()
            .filter(|rel| self.is_toolchain_file(rel))
            .collect();
        filesystem::copy_files(&prefix, &files, dest, |p| p.to_path_buf())?;

        Ok(())
    }

    fn stage_sdk_files(&self, dest: &Path) -> Result<(), DepforgeError> {
        let outdir = self.layout.outdir();
        let static_prefix = self.layout.prefix(RuntimeVariant::Static);

        let mut files: Vec<PathBuf> = Vec::new();
        for rel in walk_files(&static_prefix)? {
            let from_outdir = static_prefix
                .strip_prefix(&outdir)
                .unwrap_or(&static_prefix)
                .join(&rel);
            if self.is_sdk_file(&from_outdir) {
                files.push(from_outdir);
            }
        }

        // Static archives built against the dynamic CRT ride along so both
        // flavors can coexist in one bundle.
        if self.runtimes.contains(&RuntimeVariant::Dynamic) {
            let dynamic_prefix = self.layout.prefix(RuntimeVariant::Dynamic);
            let libdir = dynamic_prefix.join("lib");
            if libdir.is_dir() {
                for rel in walk_files(&libdir)? {
                    if rel.extension().and_then(|e| e.to_str()) == Some("a") {
                        let from_outdir = dynamic_prefix
                            .strip_prefix(&outdir)
                            .unwrap_or(&dynamic_prefix)
                            .join("lib")
                            .join(&rel);
                        files.push(from_outdir);
                    }
                }
            }
        }

        filesystem::copy_files(&outdir, &files, dest, sdk_dest)?;
        Ok(())
    }

    fn is_toolchain_compiler_file(&self, rel: &Path) -> bool {
        let suffix = rel.extension().and_then(|e| e.to_str()).unwrap_or("");
        if TOOLCHAIN_FILE_SUFFIXES.contains(&suffix) {
            return true;
        }
        let name = rel.file_name().and_then(|n| n.to_str()).unwrap_or("");
        name.starts_with(TOOLCHAIN_COMPILER_PREFIX)
            && name.ends_with(self.host.executable_suffix())
    }

    fn is_toolchain_file(&self, rel: &Path) -> bool {
        if self.is_toolchain_compiler_file(rel) {
            return true;
        }

        let mut parts = rel.components().map(|c| c.as_os_str().to_string_lossy());
        match parts.next().as_deref() {
            Some("bin") => {
                let stem = rel.file_stem().and_then(|s| s.to_str()).unwrap_or("");
                let suffix = rel.extension().and_then(|e| e.to_str()).unwrap_or("");
                suffix != "pdb"
                    && !TOOLCHAIN_BIN_EXCLUDES.contains(&stem)
                    && !stem.starts_with(TOOLCHAIN_BIN_EXCLUDE_PREFIX)
            }
            Some(dir) => dir == defaults::MANIFEST_DIR,
            None => false,
        }
    }

    /// SDK inclusion policy over paths relative to the output tree
    ///
    /// The first component is the install-prefix directory name; the rest
    /// is the prefix-relative path.
    fn is_sdk_file(&self, from_outdir: &Path) -> bool {
        let suffix = from_outdir.extension().and_then(|e| e.to_str()).unwrap_or("");
        if suffix == "pdb" {
            return false;
        }
        if TOOLCHAIN_FILE_SUFFIXES.contains(&suffix) {
            return true;
        }

        let parts: Vec<String> = from_outdir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        if parts.len() >= 2 && parts[1] == "bin" {
            if self.host.config == BuildConfig::Debug {
                return false;
            }
            if parts[0].ends_with("-dynamic") {
                return false;
            }
            let name = from_outdir.file_name().and_then(|n| n.to_str()).unwrap_or("");
            return SDK_BIN_KEEP_PREFIXES
                .iter()
                .any(|prefix| name.starts_with(prefix));
        }

        !parts.iter().skip(1).any(|part| part == "share")
    }

    /// Replace every session install prefix in staged text files with a
    /// portable placeholder
    ///
    /// pkg-config metadata gets its own token; any other modified file is
    /// renamed with the template suffix so deploy knows to substitute it.
    /// Symlinks are left alone and non-UTF-8 files are skipped.
    fn rewrite_hardcoded_paths(&self, stagedir: &Path) -> Result<(), DepforgeError> {
        let prefixes: Vec<String> = self
            .runtimes
            .iter()
            .map(|&runtime| self.layout.prefix(runtime).display().to_string())
            .collect();

        for entry in WalkDir::new(stagedir).follow_links(false) {
            let entry = entry.map_err(|e| StageError::WalkFailed {
                path: stagedir.to_path_buf(),
                error: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();

            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            let Ok(text) = String::from_utf8(bytes) else {
                continue;
            };

            let is_pcfile = path.extension().and_then(|e| e.to_str()) == Some("pc");
            let token = if is_pcfile {
                defaults::PC_PREFIX_TOKEN
            } else {
                defaults::TOOLROOT_TOKEN
            };

            let mut rewritten = text.clone();
            for prefix in &prefixes {
                rewritten = rewritten.replace(prefix.as_str(), token);
            }

            if rewritten != text {
                std::fs::write(path, &rewritten).map_err(|e| FilesystemError::WriteFile {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                })?;
                if !is_pcfile {
                    let renamed = template_name(path);
                    debug!("Marked {} as deploy-time template", path.display());
                    filesystem::rename(path, &renamed)?;
                }
            }
        }

        Ok(())
    }
}

/// Destination transform for staged SDK files
///
/// Drops the install-prefix directory component; static archives from a
/// dynamic-runtime prefix land under `lib-dynamic/` instead of `lib/` so
/// the two flavors never collide.
fn sdk_dest(from_outdir: &Path) -> PathBuf {
    let parts: Vec<String> = from_outdir
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.len() < 2 {
        return from_outdir.to_path_buf();
    }

    let rootdir = &parts[0];
    let mut rest = parts[1..].to_vec();
    if rootdir.ends_with("-dynamic") && rest.first().map(String::as_str) == Some("lib") {
        rest[0] = defaults::DYNAMIC_LIB_DIR.to_string();
    }
    rest.iter().collect()
}

fn template_name(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    path.with_file_name(format!("{name}{}", defaults::TEMPLATE_SUFFIX))
}

/// All files under `root`, as paths relative to it
fn walk_files(root: &Path) -> Result<Vec<PathBuf>, StageError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| StageError::WalkFailed {
            path: root.to_path_buf(),
            error: e.to_string(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        files.push(rel);
    }
    files.sort();
    Ok(files)
}

/// Write the staged tree into one gzip-compressed tar archive
fn assemble_archive(stagedir: &Path, artifact: &Path) -> Result<(), StageError> {
    let archive_error = |e: std::io::Error| StageError::ArchiveFailed {
        path: artifact.to_path_buf(),
        error: e.to_string(),
    };

    if let Some(parent) = artifact.parent() {
        std::fs::create_dir_all(parent).map_err(archive_error)?;
    }
    let file = std::fs::File::create(artifact).map_err(archive_error)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(".", stagedir).map_err(archive_error)?;
    let encoder = builder.into_inner().map_err(archive_error)?;
    encoder.finish().map_err(archive_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sdk_stager_fixture(
        host: MachineSpec,
        runtimes: Vec<RuntimeVariant>,
    ) -> (TempDir, SessionLayout, MachineSpec, Vec<RuntimeVariant>) {
        let dir = TempDir::new().unwrap();
        let layout = SessionLayout::new(dir.path().to_path_buf(), BundleKind::Sdk, host.clone());
        (dir, layout, host, runtimes)
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_sdk_dest_strips_prefix_component() {
        assert_eq!(
            sdk_dest(Path::new("linux-x86_64/include/zlib.h")),
            PathBuf::from("include/zlib.h")
        );
    }

    #[test]
    fn test_sdk_dest_relocates_dynamic_archives() {
        assert_eq!(
            sdk_dest(Path::new("windows-x86_64-dynamic/lib/libz.a")),
            PathBuf::from("lib-dynamic/libz.a")
        );
        // Non-lib files from a dynamic prefix keep their layout.
        assert_eq!(
            sdk_dest(Path::new("windows-x86_64-dynamic/include/z.h")),
            PathBuf::from("include/z.h")
        );
        // Static-prefix archives are untouched.
        assert_eq!(
            sdk_dest(Path::new("windows-x86_64-static/lib/libz.a")),
            PathBuf::from("lib/libz.a")
        );
    }

    #[test]
    fn test_sdk_policy_excludes_debug_symbols_and_share() {
        let (_dir, layout, host, runtimes) =
            sdk_stager_fixture(MachineSpec::new("linux", "x86_64"), vec![RuntimeVariant::Static]);
        let toolchain = layout.toolchain_prefix();
        let stager = Stager::new(&layout, BundleKind::Sdk, &host, &runtimes, &toolchain);

        assert!(stager.is_sdk_file(Path::new("linux-x86_64/lib/libz.a")));
        assert!(stager.is_sdk_file(Path::new("linux-x86_64/include/zlib.h")));
        assert!(stager.is_sdk_file(Path::new("linux-x86_64/manifest/zlib.pkg")));
        assert!(stager.is_sdk_file(Path::new("linux-x86_64/lib/valadoc.vapi")));
        assert!(!stager.is_sdk_file(Path::new("linux-x86_64/lib/libz.pdb")));
        assert!(!stager.is_sdk_file(Path::new("linux-x86_64/share/doc/README")));
    }

    #[test]
    fn test_sdk_policy_bin_rules() {
        let (_dir, layout, host, runtimes) = sdk_stager_fixture(
            MachineSpec::new("windows", "x86_64"),
            vec![RuntimeVariant::Static, RuntimeVariant::Dynamic],
        );
        let toolchain = layout.toolchain_prefix();
        let stager = Stager::new(&layout, BundleKind::Sdk, &host, &runtimes, &toolchain);

        assert!(stager.is_sdk_file(Path::new(
            "windows-x86_64-static/bin/mksnapshot-x86_64.exe"
        )));
        assert!(!stager.is_sdk_file(Path::new("windows-x86_64-static/bin/stray.exe")));
        assert!(!stager.is_sdk_file(Path::new(
            "windows-x86_64-dynamic/bin/mksnapshot-x86_64.exe"
        )));

        let mut debug_host = MachineSpec::new("windows", "x86_64");
        debug_host.config = BuildConfig::Debug;
        let debug_stager =
            Stager::new(&layout, BundleKind::Sdk, &debug_host, &runtimes, &toolchain);
        assert!(!debug_stager.is_sdk_file(Path::new(
            "windows-x86_64-static/bin/mksnapshot-x86_64.exe"
        )));
    }

    #[test]
    fn test_toolchain_policy() {
        let host = MachineSpec::new("linux", "x86_64");
        let dir = TempDir::new().unwrap();
        let layout =
            SessionLayout::new(dir.path().to_path_buf(), BundleKind::Toolchain, host.clone());
        let runtimes = vec![RuntimeVariant::Static];
        let toolchain = layout.toolchain_prefix();
        let stager = Stager::new(&layout, BundleKind::Toolchain, &host, &runtimes, &toolchain);

        assert!(stager.is_toolchain_file(Path::new("bin/valac")));
        assert!(stager.is_toolchain_file(Path::new("share/vala/std.vapi")));
        assert!(stager.is_toolchain_file(Path::new("manifest/vala.pkg")));
        assert!(!stager.is_toolchain_file(Path::new("bin/gdbus")));
        assert!(!stager.is_toolchain_file(Path::new("bin/gspawn-helper")));
        assert!(!stager.is_toolchain_file(Path::new("lib/libglib.a")));
    }

    #[test]
    fn test_full_sdk_stage_rewrites_and_archives() {
        let host = MachineSpec::new("linux", "x86_64");
        let dir = TempDir::new().unwrap();
        let layout = SessionLayout::new(dir.path().to_path_buf(), BundleKind::Sdk, host.clone());
        let runtimes = vec![RuntimeVariant::Static];
        let prefix = layout.prefix(RuntimeVariant::Static);
        let prefix_str = prefix.display().to_string();

        write(
            &prefix,
            "lib/pkgconfig/zlib.pc",
            format!("prefix={prefix_str}\nlibdir={prefix_str}/lib\n").as_bytes(),
        );
        write(
            &prefix,
            "lib/zlib.link",
            format!("-L{prefix_str}/lib -lz\n").as_bytes(),
        );
        write(&prefix, "include/zlib.h", b"#define ZLIB\n");
        manifest::write_manifest(
            &layout.manifest_path(
                &crate::core::spec::PackageSpec {
                    identifier: "zlib".into(),
                    name: "zlib".into(),
                    version: "v".into(),
                    url: "u".into(),
                    options: vec![],
                    dependencies: vec![],
                    scope: None,
                    when: crate::core::predicate::Predicate::Always,
                },
                RuntimeVariant::Static,
            ),
            &[
                "lib/pkgconfig/zlib.pc".to_string(),
                "lib/zlib.link".to_string(),
                "include/zlib.h".to_string(),
                "share/doc/README".to_string(),
            ],
        )
        .unwrap();

        let toolchain = layout.toolchain_prefix();
        let stager = Stager::new(&layout, BundleKind::Sdk, &host, &runtimes, &toolchain);
        let artifact = stager.stage("20260815").unwrap();
        assert!(artifact.exists());

        // Unpack and inspect the staged tree.
        let unpacked = dir.path().join("unpacked");
        let file = std::fs::File::open(&artifact).unwrap();
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
        archive.unpack(&unpacked).unwrap();

        assert_eq!(
            std::fs::read_to_string(unpacked.join(defaults::VERSION_MARKER))
                .unwrap()
                .trim(),
            "20260815"
        );

        let pc = std::fs::read_to_string(unpacked.join("lib/pkgconfig/zlib.pc")).unwrap();
        assert!(pc.contains(defaults::PC_PREFIX_TOKEN));
        assert!(!pc.contains(&prefix_str));

        // Non-pc file with a rewritten prefix became a template.
        assert!(!unpacked.join("lib/zlib.link").exists());
        let template = std::fs::read_to_string(
            unpacked.join(format!("lib/zlib.link{}", defaults::TEMPLATE_SUFFIX)),
        )
        .unwrap();
        assert!(template.contains(defaults::TOOLROOT_TOKEN));

        // Untouched text kept its name.
        assert!(unpacked.join("include/zlib.h").exists());

        // Manifest was pruned: the share entry is gone, survivors remain
        // under their original names.
        let lines = manifest::read_manifest(&unpacked.join("manifest/zlib.pkg")).unwrap();
        assert!(lines.contains(&"include/zlib.h".to_string()));
        assert!(!lines.iter().any(|l| l.contains("share")));
    }
}
