//! Version information.

/// Version line printed by `--version`, with the fixture format it reads.
pub const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (fixture format 1)");

/// Get the version string.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
