//! Structured logger with per-check summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::STAGE_TARGET;
use super::types::{CheckEntry, CheckStatus, Log};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with summary collection.
///
/// All messages are also written to `$XDG_CACHE_HOME/netrepair/<command>.log`
/// by the [`FileLayer`](super::subscriber::FileLayer), regardless of the
/// verbose flag.
#[derive(Debug)]
pub struct Logger {
    checks: Mutex<Vec<CheckEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// Stores the log file path for display in the run summary. The file
    /// itself is created by [`init_subscriber`](super::subscriber::init_subscriber).
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            checks: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    /// Return the log file path, if available.
    #[cfg(test)]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded checks (test-only).
    #[cfg(test)]
    pub(crate) fn check_entries(&self) -> Vec<CheckEntry> {
        self.checks.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Record a check result for the summary.
    pub fn record_check(&self, name: &str, status: CheckStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.checks.lock() {
            guard.push(CheckEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the number of failed checks.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.checks.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|c| c.status == CheckStatus::Failed)
                .count()
        })
    }

    /// Print the summary of all recorded checks.
    ///
    /// Failed and skipped checks are listed on the console; passing ones only
    /// reach the console with `--verbose`, since a full unit tree produces
    /// hundreds of them. All of them reach the log file.
    pub fn print_summary(&self) {
        let Ok(checks) = self.checks.lock().map(|guard| guard.clone()) else {
            return;
        };
        if checks.is_empty() {
            return;
        }

        self.stage("Summary");

        let count = |status: CheckStatus| checks.iter().filter(|c| c.status == status).count();
        let (ok, skipped, failed) = (
            count(CheckStatus::Ok),
            count(CheckStatus::Skipped),
            count(CheckStatus::Failed),
        );

        for check in &checks {
            let suffix = check
                .message
                .as_deref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            match check.status {
                CheckStatus::Ok => self.debug(&format!("✓ {}{suffix}", check.name)),
                CheckStatus::Skipped => self.info(&format!("\x1b[33m○ {}{suffix}\x1b[0m", check.name)),
                CheckStatus::Failed => self.info(&format!("\x1b[31m✗ {}{suffix}\x1b[0m", check.name)),
            }
        }

        self.info(&format!(
            "{} checks: \x1b[32m{ok} ok\x1b[0m, \x1b[33m{skipped} skipped\x1b[0m, \x1b[31m{failed} failed\x1b[0m",
            checks.len()
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error);

    fn record_check(&self, name: &str, status: CheckStatus, message: Option<&str>) {
        self.record_check(name, status, message);
    }
}
