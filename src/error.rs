//! Domain-specific error types for the configuration engine.
//!
//! Engine modules return typed errors built with [`thiserror`]; command
//! handlers at the CLI boundary convert them to [`anyhow::Error`] via the
//! standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! EngineError
//! ├── Parse(ParseError)        : malformed dump line
//! ├── Schema(SchemaError)      : schema document rejected
//! ├── Edit(EditError)          : unsafe target, not found, I/O
//! ├── Verify(VerifyError)      : verification tooling missing
//! └── Discovery(DiscoveryError): directory scan / dump generation
//! ```
//!
//! Validation findings are not errors: they are accumulated
//! as data in a [`LintReport`](crate::systemd::resolver::LintReport).

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Dump text could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A schema document could not be turned back into a tree.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// An edit could not be planned or written.
    #[error("Edit error: {0}")]
    Edit(#[from] EditError),

    /// Unit verification could not run.
    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),

    /// A directory scan or dump generation failed.
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

/// Why a dump line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// An option or section header appeared before any file header.
    OutsideFile,
    /// The line matches none of the recognised line shapes.
    Malformed,
    /// `Key=Value` line whose key is not identifier-shaped.
    InvalidKey(String),
    /// `[]` with nothing inside.
    EmptySectionName,
    /// The same file path was introduced twice.
    DuplicateFile(String),
    /// A `\` continuation with no following line.
    UnterminatedContinuation,
    /// A second active value for a key within one file's section.
    DuplicateActive {
        /// Section name (empty for the implicit section).
        section: String,
        /// Option key.
        key: String,
        /// Line of the first active occurrence.
        first_line: usize,
    },
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutsideFile => write!(f, "content before any file header"),
            Self::Malformed => write!(f, "unrecognised line"),
            Self::InvalidKey(key) => write!(f, "invalid option key '{key}'"),
            Self::EmptySectionName => write!(f, "empty section name"),
            Self::DuplicateFile(path) => write!(f, "file '{path}' appears more than once"),
            Self::UnterminatedContinuation => write!(f, "line continuation at end of input"),
            Self::DuplicateActive {
                section,
                key,
                first_line,
            } => write!(
                f,
                "second active value for '{key}' in [{section}] (first set at line {first_line})"
            ),
        }
    }
}

/// A malformed line in dump text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}: {raw:?}")]
pub struct ParseError {
    /// 1-based line number within the parsed input.
    pub line: usize,
    /// The offending line, untrimmed.
    pub raw: String,
    /// What was wrong with it.
    pub reason: ParseErrorKind,
}

/// Errors raised while rebuilding a tree from a schema document.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The document is not valid JSON or does not match the schema shape.
    #[error("invalid schema document: {0}")]
    Decode(#[from] serde_json::Error),

    /// The document declares a version this build does not understand.
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u32),

    /// An option's source is not the file it is listed under.
    #[error("option '{key}' in {file} references foreign source '{source_file}'")]
    ForeignSource {
        /// File the option is listed under.
        file: String,
        /// Option key.
        key: String,
        /// The source path given for the option.
        source_file: String,
    },

    /// The same file path is listed twice.
    #[error("file '{0}' is listed more than once")]
    DuplicateFile(String),

    /// A file path cannot be written as a dump header.
    #[error("invalid file path {0:?}")]
    InvalidPath(String),

    /// A section name cannot be written as a `[Section]` header.
    #[error("{file}: invalid section name {name:?}")]
    InvalidSectionName {
        /// File holding the section.
        file: String,
        /// The rejected name.
        name: String,
    },

    /// The header-less section is empty or not the first of its file.
    #[error("{0}: the unnamed section must be first and non-empty")]
    MisplacedImplicitSection(String),

    /// An option key is not identifier-shaped.
    #[error("{file}: invalid option key {key:?}")]
    InvalidKey {
        /// File holding the option.
        file: String,
        /// The rejected key.
        key: String,
    },

    /// An option value cannot be written on one `Key=Value` line.
    #[error("{file}: invalid value for '{key}': {reason}")]
    InvalidValue {
        /// File holding the option.
        file: String,
        /// Option key.
        key: String,
        /// What is wrong with the value.
        reason: &'static str,
    },

    /// A key has two active values in one section of one file.
    #[error("{file}: second active value for '{key}' in [{section}]")]
    DuplicateActive {
        /// File holding the section.
        file: String,
        /// Section name.
        section: String,
        /// Option key.
        key: String,
    },
}

/// Why a drop-in target directory was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafeReason {
    /// The path is a symbolic link.
    Symlink,
    /// Permission bits allow writes by "other".
    WorldWritable,
    /// The path exists but is not a directory.
    NotADirectory,
}

impl std::fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symlink => write!(f, "is a symbolic link"),
            Self::WorldWritable => write!(f, "is world-writable"),
            Self::NotADirectory => write!(f, "is not a directory"),
        }
    }
}

/// Errors that arise while planning or writing a drop-in.
#[derive(Error, Debug)]
pub enum EditError {
    /// The drop-in target failed a safety check.
    #[error("refusing to write under {}: target {reason}", .path.display())]
    UnsafeTarget {
        /// The offending path.
        path: PathBuf,
        /// Which check failed.
        reason: UnsafeReason,
    },

    /// The selected file, section or option does not exist in the tree.
    #[error("{what} not found: {name}")]
    NotFound {
        /// `"file"`, `"section"` or `"option"`.
        what: &'static str,
        /// The name that was looked up.
        name: String,
    },

    /// The new value cannot be written as a single `Key=Value` line.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Option key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The edit session was driven out of order.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        /// Attempted action.
        action: &'static str,
        /// Current session state name.
        state: &'static str,
    },

    /// A filesystem operation failed.
    #[error("failed to {op} {}", .path.display())]
    Io {
        /// Operation that failed (e.g. `"write"`).
        op: &'static str,
        /// Path the operation targeted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors that stop a verification pass before any file is checked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Required external tools are not on `PATH`.
    #[error("verification tooling unavailable: {}", .missing.join(", "))]
    ToolingUnavailable {
        /// Names of the tools that could not be found.
        missing: Vec<String>,
    },
}

/// Errors raised while scanning a directory or producing a dump.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// A file or directory could not be read.
    #[error("failed to read {}", .path.display())]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A scanned file did not parse.
    #[error("failed to parse {}", .path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Parse failure within that file.
        source: ParseError,
    },

    /// No candidate files exist under the root.
    #[error("no files found under {}", .0.display())]
    NoFiles(PathBuf),

    /// The dump tool is missing.
    #[error("{0} not available")]
    ToolingUnavailable(String),

    /// The dump tool ran but failed.
    #[error("{tool} failed: {detail}")]
    ToolFailed {
        /// Tool that was invoked.
        tool: String,
        /// Trimmed stderr, stdout, or exit code.
        detail: String,
    },
}
