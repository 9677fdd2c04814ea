//! Parser for `systemd-analyze cat-config` style dumps.
//!
//! Grammar, one line at a time:
//!
//! ```text
//! # /etc/systemd/resolved.conf      file header (also "#/path", "# FILE: path")
//! [Resolve]                         section header
//! #DNS=                             commented default  -> inactive option
//! DNS=1.1.1.1                       active option
//! # prose, ####### banners, blank    ignored, context kept
//! ```
//!
//! Anything else is a [`ParseError`]; unrecognised input is never dropped.
use std::collections::HashMap;

use crate::error::{ParseError, ParseErrorKind};

use super::model::{ConfigFile, ConfigOption, ConfigSection, ConfigTree, IMPLICIT_SECTION};

/// Marker used by generated dumps in front of the file path.
pub const FILE_MARKER: &str = "# FILE: ";

/// Shape of a single input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Comment,
    FileHeader(&'a str),
    Section(&'a str),
    Option {
        key: &'a str,
        value: &'a str,
        active: bool,
    },
    Invalid(ParseErrorKind),
}

/// Parse a full dump into a [`ConfigTree`].
///
/// Files appear in the order their headers appear in `text`.
///
/// # Examples
///
/// ```
/// use netrepair_cli::systemd::parser::parse_dump;
///
/// let tree = parse_dump("# /etc/systemd/resolved.conf\n[Resolve]\n#DNS=\nDNS=9.9.9.9\n").unwrap();
/// let file = tree.file("/etc/systemd/resolved.conf").unwrap();
/// assert_eq!(file.active_value("Resolve", "DNS"), Some("9.9.9.9"));
/// ```
///
/// # Errors
///
/// Returns a [`ParseError`] naming the first line that matches no
/// recognised shape, introduces an option before any file header, repeats a
/// file header, or sets a second active value for a key in the same section.
pub fn parse_dump(text: &str) -> Result<ConfigTree, ParseError> {
    let mut files: Vec<ConfigFile> = Vec::new();
    let mut current: Option<FileState> = None;
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    while let Some((number, raw)) = lines.next() {
        match classify(raw, true) {
            Line::Blank | Line::Comment => {}
            Line::FileHeader(path) => {
                if let Some(state) = current.take() {
                    files.push(state.finish());
                }
                if files.iter().any(|f| f.path == path) {
                    return Err(error(number, raw, ParseErrorKind::DuplicateFile(path.to_string())));
                }
                current = Some(FileState::new(path));
            }
            Line::Section(name) => match current.as_mut() {
                Some(state) => state.open_section(name),
                None => return Err(error(number, raw, ParseErrorKind::OutsideFile)),
            },
            Line::Option { key, value, active } => {
                let Some(state) = current.as_mut() else {
                    return Err(error(number, raw, ParseErrorKind::OutsideFile));
                };
                let value = if active {
                    join_continuation(value, &mut lines).map_err(|kind| error(number, raw, kind))?
                } else {
                    value.to_string()
                };
                state.push(key, value, active, number, raw)?;
            }
            Line::Invalid(kind) => return Err(error(number, raw, kind)),
        }
    }

    if let Some(state) = current.take() {
        files.push(state.finish());
    }

    tracing::debug!(files = files.len(), "parsed configuration dump");
    Ok(ConfigTree::new(files))
}

/// Parse the raw contents of a single file read from disk.
///
/// Header-shaped comments (`# /path`) are plain comments here, and line
/// numbers are relative to `body`.
///
/// # Errors
///
/// Returns a [`ParseError`] for the first malformed line.
pub fn parse_file_body(path: &str, body: &str) -> Result<ConfigFile, ParseError> {
    let mut state = FileState::new(path);
    let mut lines = body.lines().enumerate().map(|(i, l)| (i + 1, l));

    while let Some((number, raw)) = lines.next() {
        match classify(raw, false) {
            Line::Blank | Line::Comment | Line::FileHeader(_) => {}
            Line::Section(name) => state.open_section(name),
            Line::Option { key, value, active } => {
                let value = if active {
                    join_continuation(value, &mut lines).map_err(|kind| error(number, raw, kind))?
                } else {
                    value.to_string()
                };
                state.push(key, value, active, number, raw)?;
            }
            Line::Invalid(kind) => return Err(error(number, raw, kind)),
        }
    }

    Ok(state.finish())
}

/// `true` for keys made of ASCII letters, digits and `_`, not starting with a digit.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Extract the path from a file header line, if `line` is one.
#[must_use]
pub fn header_path(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix(FILE_MARKER) {
        let path = rest.trim();
        return (!path.is_empty()).then_some(path);
    }
    let candidate = line.strip_prefix('#')?.trim();
    (candidate.starts_with('/') && !candidate.contains(char::is_whitespace)).then_some(candidate)
}

fn classify(raw: &str, headers: bool) -> Line<'_> {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Blank;
    }

    if line.starts_with('#') || line.starts_with(';') {
        if headers && let Some(path) = header_path(line) {
            return Line::FileHeader(path);
        }
        let candidate = line.trim_start_matches(['#', ';']).trim();
        return match split_option(candidate) {
            Some((key, value)) if is_valid_key(key) => Line::Option {
                key,
                value,
                active: false,
            },
            _ => Line::Comment,
        };
    }

    if let Some(inner) = line.strip_prefix('[') {
        return match inner.strip_suffix(']').map(str::trim) {
            Some("") => Line::Invalid(ParseErrorKind::EmptySectionName),
            Some(name) => Line::Section(name),
            None => Line::Invalid(ParseErrorKind::Malformed),
        };
    }

    match split_option(line) {
        Some((key, value)) if is_valid_key(key) => Line::Option {
            key,
            value,
            active: true,
        },
        Some((key, _)) => Line::Invalid(ParseErrorKind::InvalidKey(key.to_string())),
        None => Line::Invalid(ParseErrorKind::Malformed),
    }
}

fn split_option(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Fold `Key=a \` + `b` continuation lines into `a b`.
///
/// A continuation still open at the end of input is rejected, so an active
/// value never ends in `\`.
fn join_continuation<'a, I>(first: &str, lines: &mut I) -> Result<String, ParseErrorKind>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let mut value = first.to_string();
    while let Some(stripped) = value.strip_suffix('\\') {
        value = stripped.trim_end().to_string();
        let Some((_, next)) = lines.next() else {
            return Err(ParseErrorKind::UnterminatedContinuation);
        };
        let next = next.trim();
        if !next.is_empty() {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(next);
        }
    }
    Ok(value)
}

fn error(line: usize, raw: &str, reason: ParseErrorKind) -> ParseError {
    ParseError {
        line,
        raw: raw.to_string(),
        reason,
    }
}

/// Parse state for the file currently being filled.
struct FileState {
    file: ConfigFile,
    section: ConfigSection,
    /// `(section, key)` → line of the active occurrence.
    active: HashMap<(String, String), usize>,
}

impl FileState {
    fn new(path: &str) -> Self {
        Self {
            file: ConfigFile::new(path),
            section: ConfigSection::new(IMPLICIT_SECTION),
            active: HashMap::new(),
        }
    }

    fn open_section(&mut self, name: &str) {
        let previous = std::mem::replace(&mut self.section, ConfigSection::new(name));
        self.keep(previous);
    }

    fn push(
        &mut self,
        key: &str,
        value: String,
        active: bool,
        line: usize,
        raw: &str,
    ) -> Result<(), ParseError> {
        if active {
            let slot = (self.section.name.clone(), key.to_string());
            if let Some(&first_line) = self.active.get(&slot) {
                return Err(error(
                    line,
                    raw,
                    ParseErrorKind::DuplicateActive {
                        section: slot.0,
                        key: slot.1,
                        first_line,
                    },
                ));
            }
            self.active.insert(slot, line);
        }
        self.section.options.push(ConfigOption {
            key: key.to_string(),
            value,
            is_active: active,
            source_file: self.file.path.clone(),
            line_number: line,
        });
        Ok(())
    }

    /// Keep named sections even when empty; drop an empty implicit one.
    fn keep(&mut self, section: ConfigSection) {
        if !section.is_implicit() || !section.options.is_empty() {
            self.file.sections.push(section);
        }
    }

    fn finish(mut self) -> ConfigFile {
        let last = std::mem::replace(&mut self.section, ConfigSection::new(IMPLICIT_SECTION));
        self.keep(last);
        self.file
    }
}
