//! Default configuration values

use std::time::Duration;

/// Name of the declarative package graph file
pub const DEPS_FILE_NAME: &str = "deps.toml";

/// Name of the version marker written at a bundle root
pub const VERSION_MARKER: &str = "VERSION.txt";

/// Placeholder substituted for the install prefix in pkg-config metadata
pub const PC_PREFIX_TOKEN: &str = "${depforge_sdk_prefix}";

/// Placeholder substituted for the install prefix in all other text files
pub const TOOLROOT_TOKEN: &str = "@DEPFORGE_TOOLROOT@";

/// Suffix marking a staged file as a deploy-time template
pub const TEMPLATE_SUFFIX: &str = ".depforge.in";

/// Subdirectory of an install prefix holding per-package manifests
pub const MANIFEST_DIR: &str = "manifest";

/// Manifest file extension
pub const MANIFEST_EXT: &str = "pkg";

/// Subdirectory dynamic-runtime static archives are relocated under
pub const DYNAMIC_LIB_DIR: &str = "lib-dynamic";

/// Interval between remote polls while waiting for a bundle
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// The default linkage mode passed to the build tool
pub const DEFAULT_LIBRARY: &str = "static";
