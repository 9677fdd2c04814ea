//! Finding configuration on a live filesystem.
//!
//! Either scan a directory and parse each file directly
//! ([`parse_directory`]), or ask `systemd-analyze cat-config` for a stacked
//! dump ([`generate_dump`]).
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DiscoveryError;
use crate::exec::Executor;

use super::model::ConfigTree;
use super::parser::{header_path, parse_file_body};

/// Tool that produces stacked dumps.
pub const DUMP_TOOL: &str = "systemd-analyze";

/// Recursively list regular files under `root` whose names end with one of
/// `suffixes`, sorted lexicographically.
///
/// Symlinks to files are included (systemd uses them for `.wants/`
/// entries); symlinked directories are not descended into. A missing root
/// yields an empty list.
///
/// # Errors
///
/// Returns [`DiscoveryError::Io`] if a directory cannot be read.
pub fn collect_files(root: &Path, suffixes: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut found = Vec::new();
    if root.is_dir() {
        walk(root, suffixes, &mut found)?;
    }
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, suffixes: &[String], found: &mut Vec<PathBuf>) -> Result<(), DiscoveryError> {
    let io_err = |source| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(io_err)?;
        if file_type.is_dir() {
            walk(&path, suffixes, found)?;
        } else if (file_type.is_file() || (file_type.is_symlink() && path.is_file()))
            && has_suffix(&path, suffixes)
        {
            found.push(path);
        }
    }
    Ok(())
}

fn has_suffix(path: &Path, suffixes: &[String]) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| suffixes.iter().any(|s| name.ends_with(s.as_str())))
}

/// Canonical absolute form of `root` when it exists.
fn canonical_root(root: &Path) -> PathBuf {
    dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}

/// Scan `root` and parse every matching file into one tree.
///
/// Files appear in sorted path order; each file's line numbers refer to
/// that file.
///
/// # Errors
///
/// Returns [`DiscoveryError::Io`] when a file cannot be read and
/// [`DiscoveryError::Parse`] when one does not parse.
pub fn parse_directory(root: &Path, suffixes: &[String]) -> Result<ConfigTree, DiscoveryError> {
    let root = canonical_root(root);
    let mut files = Vec::new();
    for path in collect_files(&root, suffixes)? {
        let body = std::fs::read_to_string(&path).map_err(|source| DiscoveryError::Io {
            path: path.clone(),
            source,
        })?;
        let file = parse_file_body(&path.to_string_lossy(), &body).map_err(|source| {
            DiscoveryError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        files.push(file);
    }
    tracing::debug!(root = %root.display(), files = files.len(), "scanned configuration directory");
    Ok(ConfigTree::new(files))
}

/// Produce a stacked dump of every matching file under `root` with
/// `systemd-analyze cat-config`.
///
/// A file printed more than once (a main file and, again, as the drop-in of
/// another argument) is kept only at its first appearance.
///
/// # Errors
///
/// Returns [`DiscoveryError::ToolingUnavailable`] if the tool is missing,
/// [`DiscoveryError::NoFiles`] if nothing matches, and
/// [`DiscoveryError::ToolFailed`] on spawn failure, timeout or non-zero exit.
pub fn generate_dump(
    executor: &dyn Executor,
    root: &Path,
    suffixes: &[String],
    timeout: Duration,
) -> Result<String, DiscoveryError> {
    if !executor.which(DUMP_TOOL) {
        return Err(DiscoveryError::ToolingUnavailable(DUMP_TOOL.to_string()));
    }
    let root = canonical_root(root);
    let files = collect_files(&root, suffixes)?;
    if files.is_empty() {
        return Err(DiscoveryError::NoFiles(root));
    }

    let paths: Vec<String> = files.iter().map(|p| p.to_string_lossy().into_owned()).collect();
    let mut args = vec!["cat-config"];
    args.extend(paths.iter().map(String::as_str));

    let failed = |detail: String| DiscoveryError::ToolFailed {
        tool: DUMP_TOOL.to_string(),
        detail,
    };
    let result = executor
        .run_with_timeout(DUMP_TOOL, &args, timeout)
        .map_err(|e| failed(format!("{e:#}")))?;
    if result.timed_out {
        return Err(failed(format!("timed out after {}s", timeout.as_secs())));
    }
    if !result.success {
        let output = result.combined_output();
        let detail = if output.is_empty() {
            format!("exit code {}", result.code.unwrap_or(-1))
        } else {
            output
        };
        return Err(failed(detail));
    }
    Ok(dedupe_files(&result.stdout))
}

/// Drop every repeated file block from a dump, keeping the first.
#[must_use]
pub fn dedupe_files(dump: &str) -> String {
    let mut seen = HashSet::new();
    let mut keep = true;
    let mut out = String::with_capacity(dump.len());
    for line in dump.lines() {
        if let Some(path) = header_path(line) {
            keep = seen.insert(path.to_string());
        }
        if keep {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
