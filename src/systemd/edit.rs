//! Drop-in planning and the interactive edit session.
//!
//! Edits never touch the source file. [`plan_edit`] computes a minimal
//! override snippet for `<file>.d/<dropin_name>` after checking that the
//! target directory is safe to write into; [`execute_plan`] performs the
//! write once the caller has confirmed it.
use std::path::{Path, PathBuf};

use crate::error::{EditError, UnsafeReason};
use crate::operations::{FileSystemOps, PathInfo};

use super::model::{ConfigFile, ConfigTree, IMPLICIT_SECTION};

/// A requested change to one option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    /// Path of the file holding the option.
    pub file: String,
    /// Section name; empty for the implicit section.
    pub section: String,
    /// Option key.
    pub key: String,
    /// Value to write.
    pub value: String,
    /// Override directory; defaults to `<file>.d`.
    pub dropin_dir: Option<PathBuf>,
}

/// A computed, not yet executed, drop-in write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropInPlan {
    /// Directory the drop-in lives in.
    pub target_dir: PathBuf,
    /// Full path of the drop-in file.
    pub target_path: PathBuf,
    /// File contents: the section header and the single changed line.
    pub content: String,
    /// `true` if a drop-in already exists at `target_path`.
    pub would_overwrite: bool,
    /// File the edited option was read from.
    pub source_file: String,
    /// Section of the edited option.
    pub section: String,
    /// Edited key.
    pub key: String,
    /// Value before the edit; `None` when only a commented default existed.
    pub previous_value: Option<String>,
}

impl DropInPlan {
    /// Human-readable preview shown before confirmation.
    #[must_use]
    pub fn preview(&self) -> String {
        let action = if self.would_overwrite { "overwrite" } else { "create" };
        let previous = self.previous_value.as_deref().unwrap_or("(default)");
        format!(
            "{action} {} (was {}={previous})\n\n{}",
            self.target_path.display(),
            self.key,
            self.content
        )
    }
}

/// Default override directory for `file`: the file path with `.d` appended.
#[must_use]
pub fn default_dropin_dir(file: &str) -> PathBuf {
    PathBuf::from(format!("{file}.d"))
}

/// Drop-in body overriding `key` in `section`.
#[must_use]
pub fn dropin_content(section: &str, key: &str, value: &str) -> String {
    if section == IMPLICIT_SECTION {
        format!("{key}={value}\n")
    } else {
        format!("[{section}]\n{key}={value}\n")
    }
}

/// Compute a drop-in plan for `request` without writing anything.
///
/// # Errors
///
/// - [`EditError::NotFound`] if the file, section or option is not in `tree`
/// - [`EditError::InvalidValue`] if the value spans more than one line
/// - [`EditError::UnsafeTarget`] if the target directory, its nearest existing
///   ancestor, or an existing drop-in fails a safety check
/// - [`EditError::Io`] if a path cannot be inspected
pub fn plan_edit(
    tree: &ConfigTree,
    request: &EditRequest,
    fs: &dyn FileSystemOps,
    dropin_name: &str,
) -> Result<DropInPlan, EditError> {
    let file = tree.file(&request.file).ok_or_else(|| EditError::NotFound {
        what: "file",
        name: request.file.clone(),
    })?;
    if !file.has_section(&request.section) {
        return Err(EditError::NotFound {
            what: "section",
            name: section_label(&request.section).to_string(),
        });
    }
    let option = file
        .find_option(&request.section, &request.key)
        .ok_or_else(|| EditError::NotFound {
            what: "option",
            name: request.key.clone(),
        })?;
    if request.value.contains(['\n', '\r']) {
        return Err(EditError::InvalidValue {
            key: request.key.clone(),
            reason: "value must be a single line".to_string(),
        });
    }

    let target_dir = request
        .dropin_dir
        .clone()
        .unwrap_or_else(|| default_dropin_dir(&file.path));
    check_target_dir(fs, &target_dir)?;

    let target_path = target_dir.join(dropin_name);
    let existing = inspect(fs, &target_path)?;
    if existing.is_some_and(|info| info.is_symlink) {
        return Err(EditError::UnsafeTarget {
            path: target_path,
            reason: UnsafeReason::Symlink,
        });
    }

    tracing::debug!(
        target = %target_path.display(),
        key = %request.key,
        "planned drop-in"
    );
    Ok(DropInPlan {
        target_dir,
        content: dropin_content(&request.section, &request.key, &request.value),
        would_overwrite: existing.is_some(),
        target_path,
        source_file: file.path.clone(),
        section: request.section.clone(),
        key: request.key.clone(),
        previous_value: option.is_active.then(|| option.value.clone()),
    })
}

/// Write a confirmed plan, creating the target directory if needed.
///
/// The directory and the drop-in path are checked again immediately before
/// writing.
///
/// # Errors
///
/// Returns [`EditError::UnsafeTarget`] if the directory became unsafe or the
/// drop-in path is now a symlink, or
/// [`EditError::Io`] if creating or writing fails.
pub fn execute_plan(plan: &DropInPlan, fs: &dyn FileSystemOps) -> Result<(), EditError> {
    let exists = check_target_dir(fs, &plan.target_dir)?;
    if exists && inspect(fs, &plan.target_path)?.is_some_and(|info| info.is_symlink) {
        return Err(EditError::UnsafeTarget {
            path: plan.target_path.clone(),
            reason: UnsafeReason::Symlink,
        });
    }
    if !exists {
        fs.create_dir_all(&plan.target_dir)
            .map_err(|source| EditError::Io {
                op: "create directory",
                path: plan.target_dir.clone(),
                source,
            })?;
    }
    fs.write(&plan.target_path, &plan.content)
        .map_err(|source| EditError::Io {
            op: "write",
            path: plan.target_path.clone(),
            source,
        })?;
    tracing::info!(path = %plan.target_path.display(), "wrote drop-in");
    Ok(())
}

/// Check `dir` (or, when missing, its nearest existing ancestor).
///
/// Returns whether `dir` itself exists.
fn check_target_dir(fs: &dyn FileSystemOps, dir: &Path) -> Result<bool, EditError> {
    if let Some(info) = inspect(fs, dir)? {
        ensure_safe_dir(dir, info)?;
        return Ok(true);
    }
    for ancestor in dir.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        if let Some(info) = inspect(fs, ancestor)? {
            ensure_safe_dir(ancestor, info)?;
            break;
        }
    }
    Ok(false)
}

fn ensure_safe_dir(path: &Path, info: PathInfo) -> Result<(), EditError> {
    let reason = if info.is_symlink {
        UnsafeReason::Symlink
    } else if !info.is_dir {
        UnsafeReason::NotADirectory
    } else if info.is_world_writable() {
        UnsafeReason::WorldWritable
    } else {
        return Ok(());
    };
    Err(EditError::UnsafeTarget {
        path: path.to_path_buf(),
        reason,
    })
}

fn inspect(fs: &dyn FileSystemOps, path: &Path) -> Result<Option<PathInfo>, EditError> {
    fs.inspect(path).map_err(|source| EditError::Io {
        op: "inspect",
        path: path.to_path_buf(),
        source,
    })
}

/// `err` followed by each of its causes, joined with `": "`.
fn describe_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        cause = inner.source();
    }
    text
}

/// Display name of a section; the implicit section has none.
#[must_use]
pub fn section_label(name: &str) -> &str {
    if name == IMPLICIT_SECTION {
        "(no section)"
    } else {
        name
    }
}

/// Distinct section names of `file`, in order of first appearance.
#[must_use]
pub fn section_choices(file: &ConfigFile) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for section in &file.sections {
        if !names.contains(&section.name) {
            names.push(section.name.clone());
        }
    }
    names
}

/// A key offered for editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChoice {
    /// Option key.
    pub key: String,
    /// Active value, or the commented default when nothing is active.
    pub value: String,
    /// `true` when only a commented default exists.
    pub is_default: bool,
}

impl std::fmt::Display for KeyChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_default {
            write!(f, "{}={} (default)", self.key, self.value)
        } else {
            write!(f, "{}={}", self.key, self.value)
        }
    }
}

/// Keys of `section` in `file`, one entry per key, active values first
/// taking precedence over commented defaults.
#[must_use]
pub fn key_choices(file: &ConfigFile, section: &str) -> Vec<KeyChoice> {
    let mut keys: Vec<&str> = Vec::new();
    for option in file.sections_named(section).flat_map(|s| s.options.iter()) {
        if !keys.contains(&option.key.as_str()) {
            keys.push(&option.key);
        }
    }
    keys.into_iter()
        .filter_map(|key| {
            file.find_option(section, key).map(|o| KeyChoice {
                key: o.key.clone(),
                value: o.value.clone(),
                is_default: !o.is_active,
            })
        })
        .collect()
}

/// Where an [`EditSession`] stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditState {
    /// Waiting for a file, section, key and value.
    Selecting,
    /// A plan is computed and shown for confirmation.
    Previewing(DropInPlan),
    /// The user accepted the plan.
    Confirmed(DropInPlan),
    /// The user backed out; nothing was written.
    Cancelled,
    /// The drop-in was written to this path.
    Written(PathBuf),
    /// The write failed with this message.
    Failed(String),
}

impl EditState {
    /// Short name used in transition errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Selecting => "selecting",
            Self::Previewing(_) => "previewing",
            Self::Confirmed(_) => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Written(_) => "written",
            Self::Failed(_) => "failed",
        }
    }

    /// `true` once the session can make no further progress.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Written(_) | Self::Failed(_))
    }
}

/// Select → preview → confirm → write, as explicit transitions.
///
/// A planning error leaves the session in [`EditState::Selecting`] so a
/// different option can be picked.
pub struct EditSession<'a> {
    tree: &'a ConfigTree,
    fs: &'a dyn FileSystemOps,
    dropin_name: &'a str,
    dropin_dir: Option<PathBuf>,
    state: EditState,
}

impl std::fmt::Debug for EditSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("files", &self.tree.len())
            .field("dropin_name", &self.dropin_name)
            .field("dropin_dir", &self.dropin_dir)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a> EditSession<'a> {
    /// Start a session over `tree`.
    #[must_use]
    pub const fn new(tree: &'a ConfigTree, fs: &'a dyn FileSystemOps, dropin_name: &'a str) -> Self {
        Self {
            tree,
            fs,
            dropin_name,
            dropin_dir: None,
            state: EditState::Selecting,
        }
    }

    /// Write into `dir` instead of `<file>.d`.
    #[must_use]
    pub fn with_dropin_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dropin_dir = dir;
        self
    }

    /// Tree being edited.
    #[must_use]
    pub const fn tree(&self) -> &'a ConfigTree {
        self.tree
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &EditState {
        &self.state
    }

    /// Plan an edit and move to [`EditState::Previewing`].
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidTransition`] outside `Selecting`, or any
    /// [`plan_edit`] error (the session stays in `Selecting`).
    pub fn select(&mut self, file: &str, section: &str, key: &str, value: &str) -> Result<DropInPlan, EditError> {
        self.expect_state("select", matches!(self.state, EditState::Selecting))?;
        let request = EditRequest {
            file: file.to_string(),
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            dropin_dir: self.dropin_dir.clone(),
        };
        let plan = plan_edit(self.tree, &request, self.fs, self.dropin_name)?;
        self.state = EditState::Previewing(plan.clone());
        Ok(plan)
    }

    /// Return from the preview to selection.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidTransition`] outside `Previewing`.
    pub fn back(&mut self) -> Result<(), EditError> {
        self.expect_state("go back", matches!(self.state, EditState::Previewing(_)))?;
        self.state = EditState::Selecting;
        Ok(())
    }

    /// Accept the previewed plan.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidTransition`] outside `Previewing`.
    pub fn confirm(&mut self) -> Result<(), EditError> {
        match std::mem::replace(&mut self.state, EditState::Selecting) {
            EditState::Previewing(plan) => {
                self.state = EditState::Confirmed(plan);
                Ok(())
            }
            other => {
                let state = other.name();
                self.state = other;
                Err(EditError::InvalidTransition {
                    action: "confirm",
                    state,
                })
            }
        }
    }

    /// Abandon the session.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidTransition`] once the session is terminal
    /// or already confirmed.
    pub fn cancel(&mut self) -> Result<(), EditError> {
        self.expect_state(
            "cancel",
            matches!(self.state, EditState::Selecting | EditState::Previewing(_)),
        )?;
        self.state = EditState::Cancelled;
        Ok(())
    }

    /// Execute the confirmed plan, ending in `Written` or `Failed`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidTransition`] outside `Confirmed`, or the
    /// [`execute_plan`] error after moving to `Failed`.
    pub fn write(&mut self) -> Result<PathBuf, EditError> {
        let plan = match std::mem::replace(&mut self.state, EditState::Selecting) {
            EditState::Confirmed(plan) => plan,
            other => {
                let state = other.name();
                self.state = other;
                return Err(EditError::InvalidTransition {
                    action: "write",
                    state,
                });
            }
        };
        match execute_plan(&plan, self.fs) {
            Ok(()) => {
                self.state = EditState::Written(plan.target_path.clone());
                Ok(plan.target_path)
            }
            Err(e) => {
                self.state = EditState::Failed(describe_chain(&e));
                Err(e)
            }
        }
    }

    fn expect_state(&self, action: &'static str, allowed: bool) -> Result<(), EditError> {
        if allowed {
            Ok(())
        } else {
            Err(EditError::InvalidTransition {
                action,
                state: self.state.name(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::operations::{MockFileSystemOps, SystemFileSystemOps};
    use crate::systemd::parser::parse_dump;

    const CONF: &str = "/etc/systemd/resolved.conf";
    const DIR: &str = "/etc/systemd/resolved.conf.d";
    const NAME: &str = "99-netrepair.conf";

    fn tree() -> ConfigTree {
        parse_dump(
            "# FILE: /etc/systemd/resolved.conf\n\
             [Resolve]\n\
             DNS=1.1.1.1\n\
             #DNSSEC=no\n\
             #LLMNR=yes\n",
        )
        .unwrap()
    }

    fn request(key: &str, value: &str) -> EditRequest {
        EditRequest {
            file: CONF.to_string(),
            section: "Resolve".to_string(),
            key: key.to_string(),
            value: value.to_string(),
            dropin_dir: None,
        }
    }

    fn safe_fs() -> MockFileSystemOps {
        MockFileSystemOps::new().with_path(DIR, PathInfo::dir(0o755))
    }

    #[test]
    fn plan_targets_adjacent_dot_d_directory() {
        let fs = safe_fs();
        let plan = plan_edit(&tree(), &request("DNS", "9.9.9.9"), &fs, NAME).unwrap();
        assert_eq!(plan.target_dir, PathBuf::from(DIR));
        assert!(plan.target_dir.to_string_lossy().ends_with(".d"));
        assert_eq!(plan.target_path, PathBuf::from(DIR).join(NAME));
        assert_eq!(plan.content, "[Resolve]\nDNS=9.9.9.9\n");
        assert_eq!(plan.previous_value.as_deref(), Some("1.1.1.1"));
        assert!(!plan.would_overwrite);
        assert_eq!(fs.mutation_count(), 0);
    }

    #[test]
    fn commented_default_is_editable() {
        let plan = plan_edit(&tree(), &request("DNSSEC", "yes"), &safe_fs(), NAME).unwrap();
        assert_eq!(plan.content, "[Resolve]\nDNSSEC=yes\n");
        assert_eq!(plan.previous_value, None);
    }

    #[test]
    fn existing_dropin_is_overwritten() {
        let fs = safe_fs().with_path(PathBuf::from(DIR).join(NAME), PathInfo::file(0o644));
        let plan = plan_edit(&tree(), &request("DNS", "9.9.9.9"), &fs, NAME).unwrap();
        assert!(plan.would_overwrite);
    }

    #[test]
    fn symlinked_directory_is_refused() {
        let fs = MockFileSystemOps::new().with_path(DIR, PathInfo::symlink());
        let err = plan_edit(&tree(), &request("DNS", "9.9.9.9"), &fs, NAME).unwrap_err();
        assert!(matches!(
            err,
            EditError::UnsafeTarget {
                reason: UnsafeReason::Symlink,
                ..
            }
        ));
        assert_eq!(fs.mutation_count(), 0);
    }

    #[test]
    fn world_writable_directory_is_refused() {
        let fs = MockFileSystemOps::new().with_path(DIR, PathInfo::dir(0o777));
        let err = plan_edit(&tree(), &request("DNS", "9.9.9.9"), &fs, NAME).unwrap_err();
        assert!(matches!(
            err,
            EditError::UnsafeTarget {
                reason: UnsafeReason::WorldWritable,
                ..
            }
        ));
        assert_eq!(fs.mutation_count(), 0);
    }

    #[test]
    fn file_in_place_of_directory_is_refused() {
        let fs = MockFileSystemOps::new().with_path(DIR, PathInfo::file(0o644));
        let err = plan_edit(&tree(), &request("DNS", "9.9.9.9"), &fs, NAME).unwrap_err();
        assert!(matches!(
            err,
            EditError::UnsafeTarget {
                reason: UnsafeReason::NotADirectory,
                ..
            }
        ));
    }

    #[test]
    fn missing_directory_checks_nearest_ancestor() {
        let fs = MockFileSystemOps::new().with_path("/etc/systemd", PathInfo::dir(0o777));
        let err = plan_edit(&tree(), &request("DNS", "9.9.9.9"), &fs, NAME).unwrap_err();
        assert!(matches!(
            err,
            EditError::UnsafeTarget { ref path, reason: UnsafeReason::WorldWritable }
                if path == Path::new("/etc/systemd")
        ));

        let fs = MockFileSystemOps::new().with_path("/etc/systemd", PathInfo::dir(0o755));
        assert!(plan_edit(&tree(), &request("DNS", "9.9.9.9"), &fs, NAME).is_ok());
    }

    #[test]
    fn symlinked_dropin_file_is_refused() {
        let fs = safe_fs().with_path(PathBuf::from(DIR).join(NAME), PathInfo::symlink());
        let err = plan_edit(&tree(), &request("DNS", "9.9.9.9"), &fs, NAME).unwrap_err();
        assert!(matches!(err, EditError::UnsafeTarget { .. }));
    }

    #[test]
    fn unknown_selection_is_not_found() {
        let fs = safe_fs();
        let mut req = request("DNS", "x");
        req.file = "/etc/systemd/nope.conf".to_string();
        assert!(matches!(
            plan_edit(&tree(), &req, &fs, NAME),
            Err(EditError::NotFound { what: "file", .. })
        ));

        let mut req = request("DNS", "x");
        req.section = "Journal".to_string();
        assert!(matches!(
            plan_edit(&tree(), &req, &fs, NAME),
            Err(EditError::NotFound { what: "section", .. })
        ));

        assert!(matches!(
            plan_edit(&tree(), &request("Domains", "x"), &fs, NAME),
            Err(EditError::NotFound { what: "option", .. })
        ));
    }

    #[test]
    fn multi_line_value_is_rejected() {
        let err = plan_edit(&tree(), &request("DNS", "1.1.1.1\n[Evil]"), &safe_fs(), NAME).unwrap_err();
        assert!(matches!(err, EditError::InvalidValue { .. }));
    }

    #[test]
    fn implicit_section_has_no_header() {
        let tree = parse_dump("# FILE: /etc/x.conf\nA=1\n").unwrap();
        let req = EditRequest {
            file: "/etc/x.conf".to_string(),
            section: String::new(),
            key: "A".to_string(),
            value: "2".to_string(),
            dropin_dir: None,
        };
        let fs = MockFileSystemOps::new().with_path("/etc", PathInfo::dir(0o755));
        let plan = plan_edit(&tree, &req, &fs, NAME).unwrap();
        assert_eq!(plan.content, "A=2\n");
        assert_eq!(plan.target_dir, PathBuf::from("/etc/x.conf.d"));
    }

    #[test]
    fn execute_creates_missing_directory_then_writes() {
        let fs = MockFileSystemOps::new().with_path("/etc/systemd", PathInfo::dir(0o755));
        let plan = plan_edit(&tree(), &request("DNS", "9.9.9.9"), &fs, NAME).unwrap();
        execute_plan(&plan, &fs).unwrap();
        assert_eq!(fs.created(), vec![PathBuf::from(DIR)]);
        assert_eq!(
            fs.written(),
            vec![(PathBuf::from(DIR).join(NAME), "[Resolve]\nDNS=9.9.9.9\n".to_string())]
        );
    }

    #[test]
    fn dropin_swapped_for_symlink_after_planning_is_refused() {
        let plan = plan_edit(&tree(), &request("DNS", "9.9.9.9"), &safe_fs(), NAME).unwrap();
        let target = PathBuf::from(DIR).join(NAME);
        let fs = safe_fs().with_path(target.clone(), PathInfo::symlink());
        let err = execute_plan(&plan, &fs).unwrap_err();
        assert!(matches!(
            err,
            EditError::UnsafeTarget { ref path, reason: UnsafeReason::Symlink } if *path == target
        ));
        assert!(fs.written().is_empty());
        assert_eq!(fs.mutation_count(), 0);
    }

    #[test]
    fn write_failure_is_surfaced() {
        let fs = safe_fs().failing_writes();
        let plan = plan_edit(&tree(), &request("DNS", "9.9.9.9"), &fs, NAME).unwrap();
        let err = execute_plan(&plan, &fs).unwrap_err();
        assert!(matches!(err, EditError::Io { op: "write", .. }));
    }

    #[test]
    fn key_choices_prefer_active_and_mark_defaults() {
        let tree = tree();
        let file = tree.file(CONF).unwrap();
        let choices = key_choices(file, "Resolve");
        let shown: Vec<String> = choices.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["DNS=1.1.1.1", "DNSSEC=no (default)", "LLMNR=yes (default)"]);
        assert_eq!(section_choices(file), vec!["Resolve"]);
    }

    #[test]
    fn session_happy_path() {
        let tree = tree();
        let fs = safe_fs();
        let mut session = EditSession::new(&tree, &fs, NAME);
        let plan = session.select(CONF, "Resolve", "DNS", "9.9.9.9").unwrap();
        assert!(plan.preview().contains("DNS=9.9.9.9"));
        session.confirm().unwrap();
        let written = session.write().unwrap();
        assert_eq!(written, PathBuf::from(DIR).join(NAME));
        assert_eq!(session.state(), &EditState::Written(written));
        assert!(session.state().is_terminal());
    }

    #[test]
    fn session_cancel_writes_nothing() {
        let tree = tree();
        let fs = safe_fs();
        let mut session = EditSession::new(&tree, &fs, NAME);
        session.select(CONF, "Resolve", "DNS", "9.9.9.9").unwrap();
        session.cancel().unwrap();
        assert_eq!(session.state(), &EditState::Cancelled);
        assert!(matches!(
            session.write(),
            Err(EditError::InvalidTransition {
                action: "write",
                state: "cancelled"
            })
        ));
        assert_eq!(fs.mutation_count(), 0);
    }

    #[test]
    fn session_rejects_out_of_order_transitions() {
        let tree = tree();
        let fs = safe_fs();
        let mut session = EditSession::new(&tree, &fs, NAME);
        assert!(matches!(
            session.confirm(),
            Err(EditError::InvalidTransition { action: "confirm", .. })
        ));
        assert_eq!(session.state(), &EditState::Selecting);
        session.select(CONF, "Resolve", "DNS", "9.9.9.9").unwrap();
        assert!(session.select(CONF, "Resolve", "DNS", "8.8.8.8").is_err());
        session.back().unwrap();
        session.select(CONF, "Resolve", "DNS", "8.8.8.8").unwrap();
        session.confirm().unwrap();
        assert!(session.cancel().is_err());
    }

    #[test]
    fn session_planning_error_stays_selecting() {
        let tree = tree();
        let fs = safe_fs();
        let mut session = EditSession::new(&tree, &fs, NAME);
        assert!(session.select(CONF, "Resolve", "Nope", "1").is_err());
        assert_eq!(session.state(), &EditState::Selecting);
    }

    #[test]
    fn session_write_failure_ends_failed() {
        let tree = tree();
        let fs = safe_fs().failing_writes();
        let mut session = EditSession::new(&tree, &fs, NAME);
        session.select(CONF, "Resolve", "DNS", "9.9.9.9").unwrap();
        session.confirm().unwrap();
        assert!(session.write().is_err());
        assert!(matches!(session.state(), EditState::Failed(_)));
        if let EditState::Failed(message) = session.state() {
            assert!(message.starts_with("failed to write "), "{message}");
            assert_eq!(message.matches("permission denied").count(), 1, "{message}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn real_filesystem_symlink_and_world_writable() {
        use std::os::unix::fs::PermissionsExt as _;
        let tmp = tempfile::tempdir().unwrap();
        let conf = tmp.path().join("resolved.conf");
        let conf_str = conf.to_string_lossy().into_owned();
        let tree = parse_dump(&format!("# FILE: {conf_str}\n[Resolve]\nDNS=1.1.1.1\n")).unwrap();
        let mut req = request("DNS", "9.9.9.9");
        req.file = conf_str;

        let real = tmp.path().join("elsewhere");
        std::fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, tmp.path().join("resolved.conf.d")).unwrap();
        let err = plan_edit(&tree, &req, &SystemFileSystemOps, NAME).unwrap_err();
        assert!(matches!(err, EditError::UnsafeTarget { .. }));
        assert_eq!(std::fs::read_dir(&real).unwrap().count(), 0);

        let open = tmp.path().join("open.d");
        std::fs::create_dir(&open).unwrap();
        std::fs::set_permissions(&open, std::fs::Permissions::from_mode(0o777)).unwrap();
        req.dropin_dir = Some(open.clone());
        let err = plan_edit(&tree, &req, &SystemFileSystemOps, NAME).unwrap_err();
        assert!(matches!(
            err,
            EditError::UnsafeTarget {
                reason: UnsafeReason::WorldWritable,
                ..
            }
        ));
        assert_eq!(std::fs::read_dir(&open).unwrap().count(), 0);
    }
}
