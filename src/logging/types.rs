//! Core logging types: check entries, status, and the [`Log`] trait.

/// Result of one check, kept for the run summary.
#[derive(Debug, Clone)]
pub struct CheckEntry {
    /// What was checked, usually a file path or option key.
    pub name: String,
    /// Final status of the check.
    pub status: CheckStatus,
    /// Optional detail (skip reason, failure message).
    pub message: Option<String>,
}

/// Status of a completed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// The check passed.
    Ok,
    /// The check could not run (tooling missing, cancelled, nothing to check).
    Skipped,
    /// The check ran and failed.
    Failed,
}

/// Abstraction over logging backends.
///
/// Report code logs through this trait so tests can capture output without
/// installing a global subscriber.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Record a check result for the summary.
    fn record_check(&self, name: &str, status: CheckStatus, message: Option<&str>);
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn check_status_equality() {
        assert_eq!(CheckStatus::Ok, CheckStatus::Ok);
        assert_ne!(CheckStatus::Ok, CheckStatus::Failed);
        assert_ne!(CheckStatus::Skipped, CheckStatus::Failed);
    }

    #[test]
    fn check_entry_clone() {
        let entry = CheckEntry {
            name: "/etc/systemd/system/foo.service".to_string(),
            status: CheckStatus::Failed,
            message: Some("exit 1".to_string()),
        };
        let cloned = entry.clone();
        assert_eq!(cloned.name, entry.name);
        assert_eq!(cloned.status, entry.status);
        assert_eq!(cloned.message, entry.message);
    }
}
