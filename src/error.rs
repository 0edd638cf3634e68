//! Error types for depforge
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Package-graph configuration errors
///
/// All of these are fatal and are surfaced before any filesystem mutation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// deps.toml could not be read
    #[error("Failed to read '{path}': {error}")]
    ReadFailed { path: PathBuf, error: String },

    /// deps.toml could not be parsed
    #[error("Failed to parse '{path}': {error}")]
    ParseFailed { path: PathBuf, error: String },

    /// Missing required field in a package entry
    #[error("Package '{package}' is missing required field '{field}'")]
    MissingField { package: String, field: String },

    /// A `when` expression could not be parsed
    #[error("Malformed predicate '{expression}': {error}")]
    MalformedPredicate { expression: String, error: String },

    /// A dependency references an unknown package identifier
    #[error("Unknown dependency '{dependency}' required by '{package}'")]
    UnknownDependency { package: String, dependency: String },

    /// A requested top-level package does not exist or is filtered out
    #[error("Unknown package '{package}'")]
    UnknownPackage { package: String },

    /// Circular dependency detected
    #[error("Circular dependency involving: {}", members.join(", "))]
    CircularDependency { members: Vec<String> },

    /// A machine identifier could not be parsed
    #[error("Invalid machine identifier '{identifier}'")]
    InvalidMachine { identifier: String },
}

/// Version-control collaborator errors
#[derive(Error, Debug)]
pub enum GitError {
    /// A git invocation exited non-zero
    #[error("git {operation} failed for '{context}': {output}")]
    CommandFailed {
        operation: String,
        context: String,
        output: String,
    },

    /// git itself could not be spawned
    #[error("Failed to run git: {error}")]
    SpawnFailed { error: String },
}

/// Build-tool collaborator errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// meson exited non-zero; stdout/stderr are captured verbatim
    #[error("meson {operation} failed for '{package}'\n=== stdout ===\n{stdout}\n=== stderr ===\n{stderr}")]
    ToolFailed {
        operation: String,
        package: String,
        stdout: String,
        stderr: String,
    },

    /// meson could not be spawned
    #[error("Failed to run meson: {error}")]
    SpawnFailed { error: String },

    /// meson is not installed
    #[error("meson not found on PATH")]
    ToolNotFound,

    /// The introspection output could not be decoded
    #[error("Unexpected install introspection output for '{package}': {error}")]
    BadIntrospection { package: String, error: String },

    /// An installed file fell outside its install prefix
    #[error("Installed file '{path}' is outside prefix '{prefix}'")]
    OutsidePrefix { path: PathBuf, prefix: PathBuf },
}

/// Artifact staging errors
#[derive(Error, Debug)]
pub enum StageError {
    /// Walking the output tree failed
    #[error("Failed to walk '{path}': {error}")]
    WalkFailed { path: PathBuf, error: String },

    /// Archive assembly failed
    #[error("Failed to assemble archive '{path}': {error}")]
    ArchiveFailed { path: PathBuf, error: String },
}

/// Bundle download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The remote responded 404; fetch/roll/wait flows branch on this
    #[error("Missing bundle at {url}")]
    BundleNotFound { url: String },

    /// Any other network failure; always fatal
    #[error("Network error for '{url}': {error}")]
    NetworkError { url: String, error: String },

    /// IO error while persisting the download
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// The archive could not be extracted
    #[error("Failed to extract '{path}': {error}")]
    ExtractFailed { path: PathBuf, error: String },
}

/// Remote publish errors
#[derive(Error, Debug)]
pub enum PublishError {
    /// An external publish tool exited non-zero
    #[error("{tool} failed: {output}")]
    ToolFailed { tool: String, output: String },

    /// An external publish tool could not be spawned
    #[error("Failed to run {tool}: {error}")]
    SpawnFailed { tool: String, error: String },

    /// The post-processing script is missing
    #[error("Post-processing script not found: {path}")]
    PostScriptNotFound { path: PathBuf },

    /// Credentials required by the maintenance workflow are missing
    #[error("Missing credential: {variable}")]
    MissingCredential { variable: String },

    /// The remote API answered with an unexpected shape
    #[error("Unexpected response from {url}: {error}")]
    UnexpectedResponse { url: String, error: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to copy file
    #[error("Failed to copy '{from}' to '{to}': {error}")]
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },

    /// Failed to rename
    #[error("Failed to rename '{from}' to '{to}': {error}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
}

/// Top-level depforge error type
#[derive(Error, Debug)]
pub enum DepforgeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Git error
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Build error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Staging error
    #[error("Staging error: {0}")]
    Stage(#[from] StageError),

    /// Download error
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Publish error
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}

impl DepforgeError {
    /// Whether this error is the distinguishable bundle-not-found condition
    pub fn is_bundle_not_found(&self) -> bool {
        matches!(
            self,
            DepforgeError::Download(DownloadError::BundleNotFound { .. })
        )
    }
}
