//! Remote locations for published bundles

/// Public bundle download URL template
pub const BUNDLE_URL: &str = "https://build.depforge.dev/deps/{version}/{filename}";

/// S3 bundle location template, used by the publish flow
pub const BUNDLE_S3_URL: &str = "s3://build.depforge.dev/deps/{version}/{filename}";

/// GitHub organization whose packages the bump workflow tracks
pub const UPSTREAM_ORG_URL: &str = "https://github.com/depforge-project/";

/// GitHub API endpoint for commit queries
pub const GITHUB_API: &str = "https://api.github.com";

/// Expand a `{version}`/`{filename}` URL template
pub fn expand(template: &str, version: &str, filename: &str) -> String {
    template
        .replace("{version}", version)
        .replace("{filename}", filename)
}
