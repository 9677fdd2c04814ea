//! Command: print version information.

/// Version string: `NETREPAIR_VERSION` from the build, else the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("NETREPAIR_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the netrepair version to stdout.
pub fn run() {
    println!("netrepair {}", version());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
