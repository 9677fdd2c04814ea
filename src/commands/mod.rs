//! Subcommand handlers and their shared setup.
pub mod completions;
pub mod edit;
pub mod panel;
pub mod render;
pub mod schema;
pub mod validate;
pub mod version;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::cli::{DEFAULT_ROOT, GlobalOpts, SourceOpts};
use crate::exec::Executor;
use crate::logging::Logger;
use crate::settings::Settings;
use crate::systemd::discovery::{generate_dump, parse_directory};
use crate::systemd::model::ConfigTree;
use crate::systemd::parser::parse_dump;

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Validated settings.
    pub settings: Settings,
}

impl CommandSetup {
    /// Load settings from `--config` or the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be read, parsed or
    /// validated.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        let settings = Settings::load(global.config.as_deref())?;
        log.debug(&format!(
            "settings: {} unit suffixes, {}s verify timeout, {} workers",
            settings.verify.unit_suffixes.len(),
            settings.verify.timeout_secs,
            settings.verify.max_workers
        ));
        Ok(Self { settings })
    }
}

/// Root named by `--root`, or [`DEFAULT_ROOT`].
#[must_use]
pub fn source_root(source: &SourceOpts) -> PathBuf {
    source
        .root
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
}

/// Build a tree from a saved dump, a `cat-config` dump, or a directory scan.
///
/// # Errors
///
/// Returns an error if the input cannot be read, generated or parsed.
pub fn load_tree(
    source: &SourceOpts,
    settings: &Settings,
    executor: &dyn Executor,
    log: &Logger,
) -> Result<ConfigTree> {
    let tree = if let Some(path) = &source.dump {
        read_dump(path)?
    } else {
        let root = source_root(source);
        if source.cat_config {
            let dump = generate_dump(
                executor,
                &root,
                &settings.dump.suffixes,
                settings.dump.cat_config_timeout(),
            )?;
            parse_dump(&dump).context("failed to parse cat-config output")?
        } else {
            parse_directory(&root, &settings.dump.suffixes)?
        }
    };
    log.debug(&format!("loaded {} files", tree.len()));
    Ok(tree)
}

fn read_dump(path: &Path) -> Result<ConfigTree> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dump: {}", path.display()))?;
    parse_dump(&text).with_context(|| format!("failed to parse dump: {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::ExecResult;
    use std::time::Duration;

    #[derive(Debug)]
    struct NoTools;

    impl Executor for NoTools {
        fn run_with_timeout(&self, program: &str, _: &[&str], _: Duration) -> Result<ExecResult> {
            anyhow::bail!("unexpected call to {program}")
        }

        fn which(&self, _: &str) -> bool {
            false
        }
    }

    #[test]
    fn loads_saved_dump() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dump.txt");
        std::fs::write(&path, "# FILE: /etc/a.conf\n[A]\nB=1\n").unwrap();
        let source = SourceOpts {
            dump: Some(path),
            ..SourceOpts::default()
        };
        let tree = load_tree(&source, &Settings::default(), &NoTools, &Logger::new("test")).unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn malformed_dump_names_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dump.txt");
        std::fs::write(&path, "Key=before-any-file\n").unwrap();
        let source = SourceOpts {
            dump: Some(path),
            ..SourceOpts::default()
        };
        let err = load_tree(&source, &Settings::default(), &NoTools, &Logger::new("test")).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("failed to parse dump"));
        assert!(text.contains("line 1"));
    }

    #[test]
    fn scans_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("resolved.conf"), "[Resolve]\nDNS=1.1.1.1\n").unwrap();
        let source = SourceOpts {
            root: Some(tmp.path().to_path_buf()),
            ..SourceOpts::default()
        };
        let tree = load_tree(&source, &Settings::default(), &NoTools, &Logger::new("test")).unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn cat_config_without_tool_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let source = SourceOpts {
            root: Some(tmp.path().to_path_buf()),
            cat_config: true,
            ..SourceOpts::default()
        };
        let err = load_tree(&source, &Settings::default(), &NoTools, &Logger::new("test")).unwrap_err();
        assert!(err.to_string().contains("not available"));
    }

    #[test]
    fn default_root_is_etc_systemd() {
        assert_eq!(source_root(&SourceOpts::default()), PathBuf::from("/etc/systemd"));
    }
}
