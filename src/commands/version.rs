//! Command: print version information.

/// Version string embedded at build time, or the crate version for dev builds.
#[must_use]
pub fn version() -> &'static str {
    option_env!("LOCALDEPLOY_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the localdeploy version to stdout.
pub fn run() {
    println!("localdeploy {}", version());
}
