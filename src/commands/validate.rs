//! Command: lint resolver settings and verify unit files.
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, ValidateOpts};
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{CheckStatus, Log, Logger};
use crate::settings::Settings;
use crate::systemd::discovery::collect_files;
use crate::systemd::model::ConfigTree;
use crate::systemd::parser::parse_file_body;
use crate::systemd::resolver::{Finding, LintReport, NameserverProbe, ResolverLinter, Severity, SystemProbe};
use crate::systemd::validation_passed;
use crate::systemd::verify::{UnitVerifier, VerifyOutcome, VerifyReport};

/// Results of one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRun {
    /// Resolver lint findings.
    pub lint: LintReport,
    /// Unit verification results.
    pub verify: VerifyReport,
}

impl ValidationRun {
    /// `true` when the process should exit zero.
    #[must_use]
    pub fn passed(&self) -> bool {
        validation_passed(&self.lint, &self.verify)
    }
}

/// Run the validate command.
///
/// # Errors
///
/// Returns an error if settings or the scanned tree cannot be loaded, or if
/// validation did not pass.
pub fn run(global: &GlobalOpts, opts: &ValidateOpts, log: &Logger, cancel: Arc<AtomicBool>) -> Result<()> {
    let setup = super::CommandSetup::init(global, log)?;
    let run = run_with(&setup.settings, opts, log, &SystemExecutor, &SystemProbe, cancel)?;

    log.print_summary();

    if !run.passed() {
        anyhow::bail!("validation failed");
    }
    Ok(())
}

/// Run both passes with injected capabilities, recording one check per
/// lint pass and per verified file.
///
/// # Errors
///
/// Returns an error if a resolver file under `opts.root` cannot be found or
/// read. A resolver file that does not parse becomes an error finding.
pub fn run_with(
    settings: &Settings,
    opts: &ValidateOpts,
    log: &Logger,
    executor: &dyn Executor,
    probe: &dyn NameserverProbe,
    cancel: Arc<AtomicBool>,
) -> Result<ValidationRun> {
    let mut verify_settings = settings.verify.clone();
    verify_settings.parallel &= opts.parallel;
    if let Some(secs) = opts.timeout {
        verify_settings.timeout_secs = secs;
    }

    log.stage("Linting resolver configuration");
    let lint = lint_resolver_files(&ResolverLinter::new(&settings.lint, probe), &opts.root)?;
    report_lint(&lint, &settings.lint.resolver_file, log);

    log.stage("Verifying unit files");
    let verify = UnitVerifier::new(executor, &verify_settings)
        .with_cancel(cancel)
        .verify_tree(&opts.root)?;
    report_verify(&verify, log);

    Ok(ValidationRun { lint, verify })
}

/// Parse and lint only the resolver file and its drop-ins under `root`.
///
/// Other configuration files are left to unit verification.
fn lint_resolver_files(linter: &ResolverLinter<'_>, root: &Path) -> Result<LintReport> {
    let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let candidates = collect_files(&root, &[".conf".to_string()])
        .with_context(|| format!("failed to scan {}", root.display()))?;

    let mut scanned = Vec::new();
    let mut parsed = Vec::new();
    let mut broken = Vec::new();
    for path in candidates.into_iter().filter(|p| linter.is_resolver_path(p)) {
        let body =
            std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path.to_string_lossy().into_owned();
        match parse_file_body(&name, &body) {
            Ok(file) => parsed.push(file),
            Err(err) => {
                tracing::debug!(path = %name, line = err.line, "resolver file does not parse");
                broken.push(Finding::parse_failure(&name, &err));
            }
        }
        scanned.push(name);
    }

    let mut report = linter.lint(&ConfigTree::new(parsed));
    report.files = scanned;
    broken.append(&mut report.findings);
    report.findings = broken;
    Ok(report)
}

fn report_lint(lint: &LintReport, resolver_file: &str, log: &dyn Log) {
    if lint.files.is_empty() {
        log.info(&format!("no {resolver_file} found"));
        log.record_check("resolver lint", CheckStatus::Skipped, Some("no resolver configuration"));
        return;
    }

    for finding in &lint.findings {
        let line = finding.to_string();
        match finding.severity {
            Severity::Error => log.error(&line),
            Severity::Warning => log.warn(&line),
            Severity::Info => log.info(&line),
            Severity::Ok => log.debug(&line),
        }
    }

    let summary = lint.summary();
    let detail = format!(
        "{} ok, {} info, {} warnings, {} errors",
        summary.ok, summary.info, summary.warning, summary.error
    );
    let status = if lint.passed() {
        CheckStatus::Ok
    } else {
        CheckStatus::Failed
    };
    log.record_check("resolver lint", status, Some(&detail));
}

fn report_verify(verify: &VerifyReport, log: &dyn Log) {
    match &verify.outcome {
        VerifyOutcome::ToolingUnavailable { missing } => {
            let missing = missing.join(", ");
            log.error(&format!("verification tooling unavailable: {missing}"));
            log.record_check("unit verification", CheckStatus::Failed, Some(&format!("missing {missing}")));
        }
        VerifyOutcome::NoUnitFiles { root } => {
            log.warn(&format!("no unit files found under {}", root.display()));
            log.record_check("unit verification", CheckStatus::Skipped, Some("no unit files found"));
        }
        VerifyOutcome::Verified(results) => {
            for result in results {
                let name = result.path.display().to_string();
                if result.passed {
                    log.record_check(&name, CheckStatus::Ok, None);
                } else {
                    let detail = result.detail();
                    log.error(&format!("{name}: {detail}"));
                    log.record_check(&name, CheckStatus::Failed, Some(&detail));
                }
            }
        }
    }
    if verify.cancelled {
        log.warn(&format!(
            "verification cancelled after {} of {} files",
            verify.results().len(),
            verify.discovered
        ));
        log.record_check("unit verification", CheckStatus::Failed, Some("cancelled"));
    }
}
