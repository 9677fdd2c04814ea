//! Unit file verification through `systemd-analyze verify`.
//!
//! The verifier owns no parsing logic: it enumerates unit-like files, asks
//! the external tool about each one, and trusts its exit status.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{DiscoveryError, VerifyError};
use crate::exec::Executor;
use crate::settings::VerifySettings;

use super::discovery::collect_files;

/// Tool invoked once per file.
pub const VERIFY_TOOL: &str = "systemd-analyze";

/// Why a file failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The tool exited non-zero.
    ExitCode(i32),
    /// The tool was killed by a signal.
    Terminated,
    /// The tool exceeded its timeout and was killed.
    Timeout,
    /// The tool could not be started.
    SpawnFailed(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitCode(code) => write!(f, "exit code {code}"),
            Self::Terminated => f.write_str("terminated by signal"),
            Self::Timeout => f.write_str("timeout"),
            Self::SpawnFailed(detail) => write!(f, "failed to start: {detail}"),
        }
    }
}

/// Result of verifying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVerification {
    /// Verified file.
    pub path: PathBuf,
    /// `true` when the tool exited zero.
    pub passed: bool,
    /// Captured stdout and stderr, verbatim.
    pub output: String,
    /// Set when `passed` is `false`.
    pub reason: Option<FailureReason>,
}

impl FileVerification {
    /// Short explanation for a failure: trimmed output, else the reason.
    #[must_use]
    pub fn detail(&self) -> String {
        let output = self.output.trim();
        match &self.reason {
            Some(FailureReason::Timeout) => "timeout".to_string(),
            _ if !output.is_empty() => output.to_string(),
            Some(reason) => reason.to_string(),
            None => String::new(),
        }
    }
}

/// How a verification pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Required tools are missing; no file was checked.
    ToolingUnavailable {
        /// Tools not found on `PATH`.
        missing: Vec<String>,
    },
    /// The root holds no unit-like file.
    NoUnitFiles {
        /// Scanned root.
        root: PathBuf,
    },
    /// Files were checked; results are in discovery order.
    Verified(Vec<FileVerification>),
}

/// Outcome of a pass plus whether it was cut short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// How the pass ended.
    pub outcome: VerifyOutcome,
    /// Number of unit-like files discovered.
    pub discovered: usize,
    /// `true` if cancellation stopped the pass before every file was checked.
    pub cancelled: bool,
}

impl VerifyReport {
    /// Results for the files that were checked.
    #[must_use]
    pub fn results(&self) -> &[FileVerification] {
        match &self.outcome {
            VerifyOutcome::Verified(results) => results,
            _ => &[],
        }
    }

    /// Number of files that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results().iter().filter(|r| !r.passed).count()
    }

    /// `true` only for a complete pass over at least one file with no failure.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        matches!(self.outcome, VerifyOutcome::Verified(_)) && !self.cancelled && self.failed() == 0
    }

    /// The missing-tooling error, when the pass could not start.
    #[must_use]
    pub fn tooling_error(&self) -> Option<VerifyError> {
        match &self.outcome {
            VerifyOutcome::ToolingUnavailable { missing } => Some(VerifyError::ToolingUnavailable {
                missing: missing.clone(),
            }),
            _ => None,
        }
    }
}

/// Runs `systemd-analyze verify` over unit-like files.
pub struct UnitVerifier<'a> {
    executor: &'a dyn Executor,
    settings: &'a VerifySettings,
    cancel: Arc<AtomicBool>,
}

impl fmt::Debug for UnitVerifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitVerifier")
            .field("executor", &self.executor)
            .field("settings", self.settings)
            .field("cancelled", &self.cancel.load(Ordering::SeqCst))
            .finish()
    }
}

impl<'a> UnitVerifier<'a> {
    /// Create a verifier with its own cancel flag.
    #[must_use]
    pub fn new(executor: &'a dyn Executor, settings: &'a VerifySettings) -> Self {
        Self {
            executor,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share `flag` as the cancel flag; once set, no new invocation starts.
    #[must_use]
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Check that every configured tool is on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::ToolingUnavailable`] listing the missing tools.
    pub fn check_tooling(&self) -> Result<(), VerifyError> {
        let missing: Vec<String> = self
            .settings
            .tools
            .iter()
            .filter(|tool| !self.executor.which(tool))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(VerifyError::ToolingUnavailable { missing })
        }
    }

    /// Discover unit-like files under `root` and verify each one.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Io`] if the tree cannot be scanned.
    pub fn verify_tree(&self, root: &Path) -> Result<VerifyReport, DiscoveryError> {
        let files = collect_files(root, &self.settings.unit_suffixes)?;
        let discovered = files.len();

        if let Err(VerifyError::ToolingUnavailable { missing }) = self.check_tooling() {
            tracing::warn!(missing = %missing.join(", "), "verification tooling unavailable");
            return Ok(VerifyReport {
                outcome: VerifyOutcome::ToolingUnavailable { missing },
                discovered,
                cancelled: false,
            });
        }

        if files.is_empty() {
            tracing::debug!(root = %root.display(), "no unit files found");
            return Ok(VerifyReport {
                outcome: VerifyOutcome::NoUnitFiles {
                    root: root.to_path_buf(),
                },
                discovered,
                cancelled: false,
            });
        }

        let results = self.verify_files(&files);
        let cancelled = results.len() < discovered;
        Ok(VerifyReport {
            outcome: VerifyOutcome::Verified(results),
            discovered,
            cancelled,
        })
    }

    /// Verify `files`, returning results in input order.
    ///
    /// Files skipped because of cancellation are absent from the result.
    #[must_use]
    pub fn verify_files(&self, files: &[PathBuf]) -> Vec<FileVerification> {
        if self.settings.parallel && files.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.settings.max_workers)
                .build()
            {
                Ok(pool) => return pool.install(|| self.verify_parallel(files)),
                Err(e) => tracing::debug!("falling back to sequential verification: {e}"),
            }
        }
        files.iter().filter_map(|path| self.verify_one(path)).collect()
    }

    /// Verify concurrently; workers append `(index, result)` under a lock that
    /// is never held across a tool invocation, then results are put back in
    /// input order.
    fn verify_parallel(&self, files: &[PathBuf]) -> Vec<FileVerification> {
        use rayon::prelude::*;
        let collected = Mutex::new(Vec::with_capacity(files.len()));
        files.par_iter().enumerate().for_each(|(index, path)| {
            if let Some(result) = self.verify_one(path) {
                collected
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push((index, result));
            }
        });
        let mut collected = collected
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        collected.sort_by_key(|(index, _)| *index);
        collected.into_iter().map(|(_, result)| result).collect()
    }

    fn verify_one(&self, path: &Path) -> Option<FileVerification> {
        if self.cancel.load(Ordering::SeqCst) {
            return None;
        }
        let path_arg = path.to_string_lossy();
        let run = self.executor.run_with_timeout(
            VERIFY_TOOL,
            &["verify", path_arg.as_ref()],
            self.settings.timeout(),
        );
        let verification = match run {
            Ok(result) => {
                let reason = if result.timed_out {
                    Some(FailureReason::Timeout)
                } else if result.success {
                    None
                } else {
                    Some(result.code.map_or(FailureReason::Terminated, FailureReason::ExitCode))
                };
                FileVerification {
                    path: path.to_path_buf(),
                    passed: reason.is_none(),
                    output: format!("{}{}", result.stdout, result.stderr),
                    reason,
                }
            }
            Err(e) => FileVerification {
                path: path.to_path_buf(),
                passed: false,
                output: String::new(),
                reason: Some(FailureReason::SpawnFailed(format!("{e:#}"))),
            },
        };
        tracing::debug!(
            path = %path.display(),
            passed = verification.passed,
            "verified unit file"
        );
        Some(verification)
    }
}
