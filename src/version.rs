//! Build identification.
//!
//! `build.rs` stamps the git commit and build time via vergen. huginn uses
//! them in two places: the `huginn version` command, and the `User-Agent`
//! sent to metadata endpoints so provider logs can tell builds apart.
//! Builds from a source tarball have no git metadata and report the
//! package version alone.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Abbreviated commit the binary was built from, if known.
pub fn git_commit() -> Option<&'static str> {
    let sha = option_env!("VERGEN_GIT_SHA").filter(|sha| !sha.is_empty())?;
    Some(&sha[..sha.len().min(7)])
}

/// Whether the working tree had uncommitted changes at build time.
pub fn git_dirty() -> bool {
    option_env!("VERGEN_GIT_DIRTY") == Some("true")
}

/// RFC 3339 build timestamp, if recorded.
pub fn build_timestamp() -> Option<&'static str> {
    option_env!("VERGEN_BUILD_TIMESTAMP")
}

/// `0.1.0`, `0.1.0+abc1234` or `0.1.0+abc1234.dirty`.
pub fn version_string() -> String {
    match git_commit() {
        Some(sha) if git_dirty() => format!("{PKG_VERSION}+{sha}.dirty"),
        Some(sha) => format!("{PKG_VERSION}+{sha}"),
        None => PKG_VERSION.to_string(),
    }
}

/// Default `User-Agent` for HTTP fetchers.
pub(crate) fn user_agent() -> String {
    format!("huginn/{}", version_string())
}
