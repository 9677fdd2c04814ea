//! User settings loaded from TOML.
//!
//! Looked up at `--config <path>` or `$XDG_CONFIG_HOME/netrepair/config.toml`
//! (default `~/.config/netrepair/config.toml`). A missing default file yields
//! [`Settings::default`]; unknown keys are rejected.
//!
//! ```toml
//! [verify]
//! timeout_secs = 15
//! max_workers = 4
//!
//! [lint]
//! empty_dns_policy = "warn"
//! ```
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// All settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Unit verification.
    pub verify: VerifySettings,
    /// Resolver linting.
    pub lint: LintSettings,
    /// Dump discovery and generation.
    pub dump: DumpSettings,
    /// Drop-in editing.
    pub edit: EditSettings,
}

/// `[verify]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifySettings {
    /// Tools that must all be on `PATH` before any file is verified.
    pub tools: Vec<String>,
    /// File name suffixes that mark unit-like files.
    pub unit_suffixes: Vec<String>,
    /// Per-file timeout for `systemd-analyze verify`.
    pub timeout_secs: u64,
    /// Verify files concurrently.
    pub parallel: bool,
    /// Upper bound on concurrent verifications.
    pub max_workers: usize,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            tools: strings(&["systemctl", "systemd-analyze"]),
            unit_suffixes: strings(&[
                ".service",
                ".socket",
                ".target",
                ".path",
                ".timer",
                ".mount",
                ".automount",
                ".slice",
                ".scope",
                ".link",
                ".network",
            ]),
            timeout_secs: 15,
            parallel: true,
            max_workers: 4,
        }
    }
}

impl VerifySettings {
    /// Timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What to do when no `DNS=`/`FallbackDNS=` value is configured anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyDnsPolicy {
    /// Warn only if a probe lookup fails.
    #[default]
    Probe,
    /// Always warn.
    Warn,
    /// Never warn.
    Ignore,
}

/// `[lint]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintSettings {
    /// File name of the resolver configuration.
    pub resolver_file: String,
    /// Empty nameserver policy.
    pub empty_dns_policy: EmptyDnsPolicy,
    /// Host looked up by the `probe` policy.
    pub probe_host: String,
}

impl Default for LintSettings {
    fn default() -> Self {
        Self {
            resolver_file: "resolved.conf".to_string(),
            empty_dns_policy: EmptyDnsPolicy::Probe,
            probe_host: "example.com".to_string(),
        }
    }
}

/// `[dump]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DumpSettings {
    /// Suffixes of files included in a directory scan.
    pub suffixes: Vec<String>,
    /// Timeout for `systemd-analyze cat-config`.
    pub cat_config_timeout_secs: u64,
}

impl Default for DumpSettings {
    fn default() -> Self {
        Self {
            suffixes: strings(&[".conf"]),
            cat_config_timeout_secs: 30,
        }
    }
}

impl DumpSettings {
    /// Timeout as a [`Duration`].
    #[must_use]
    pub const fn cat_config_timeout(&self) -> Duration {
        Duration::from_secs(self.cat_config_timeout_secs)
    }
}

/// `[edit]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditSettings {
    /// File name of the drop-in written by edits.
    pub dropin_name: String,
}

impl Default for EditSettings {
    fn default() -> Self {
        Self {
            dropin_name: "99-netrepair.conf".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// Load and deserialize a TOML file, returning defaults when it is missing.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return toml::from_str("").context("Failed to create empty config");
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
}

/// Default settings location.
#[must_use]
pub fn default_path() -> PathBuf {
    let config_home = std::env::var("XDG_CONFIG_HOME").map_or_else(
        |_| {
            std::env::var("HOME")
                .map_or_else(|_| PathBuf::from("."), PathBuf::from)
                .join(".config")
        },
        PathBuf::from,
    );
    config_home.join("netrepair").join("config.toml")
}

impl Settings {
    /// Load settings from `explicit`, or from [`default_path`] when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file does not exist, a file cannot be
    /// parsed, or a value is out of range.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let settings: Self = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                load_config(path)?
            }
            None => load_config(&default_path())?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.verify.max_workers == 0 {
            bail!("verify.max_workers must be at least 1");
        }
        if self.verify.timeout_secs == 0 {
            bail!("verify.timeout_secs must be at least 1");
        }
        if self.dump.cat_config_timeout_secs == 0 {
            bail!("dump.cat_config_timeout_secs must be at least 1");
        }
        if self.edit.dropin_name.is_empty()
            || self.edit.dropin_name.contains('/')
            || !self.edit.dropin_name.ends_with(".conf")
        {
            bail!(
                "edit.dropin_name must be a plain file name ending in .conf, got '{}'",
                self.edit.dropin_name
            );
        }
        Ok(())
    }
}
