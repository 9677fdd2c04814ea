//! systemd configuration engine.
//!
//! Text or a live directory is parsed into a [`model::ConfigTree`], which the
//! rest of the engine reads without mutating:
//!
//! - [`parser`] / [`render`]: dump text in and out
//! - [`schema`]: structured document in and out
//! - [`resolver`]: `resolved.conf` lint rules
//! - [`verify`]: `systemd-analyze verify` over unit files
//! - [`edit`]: drop-in planning and the edit session
//! - [`discovery`]: directory scans and `cat-config` dumps
pub mod discovery;
pub mod edit;
pub mod model;
pub mod parser;
pub mod render;
pub mod resolver;
pub mod schema;
pub mod verify;

use resolver::LintReport;
use verify::{VerifyOutcome, VerifyReport};

/// Overall verdict of a validation run.
///
/// Fails when tooling is missing, any finding is an error, a file failed
/// verification, the pass was cancelled, or no unit file was found while the
/// linter reported warnings or errors.
#[must_use]
pub fn validation_passed(lint: &LintReport, verify: &VerifyReport) -> bool {
    if !lint.passed() || verify.cancelled {
        return false;
    }
    match &verify.outcome {
        VerifyOutcome::ToolingUnavailable { .. } => false,
        VerifyOutcome::NoUnitFiles { .. } => !lint.has_issues(),
        VerifyOutcome::Verified(_) => verify.failed() == 0,
    }
}
