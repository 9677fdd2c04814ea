//! Structured, serialisable mirror of a [`ConfigTree`].
//!
//! The schema document keeps every field of the model (including line
//! numbers), so `tree_from_schema(&render_schema(&tree))` reproduces `tree`
//! exactly. Order is carried by arrays: file → section → option occurrence.
//!
//! ```json
//! {
//!   "version": 1,
//!   "files": [{
//!     "path": "/etc/systemd/resolved.conf",
//!     "sections": [{
//!       "name": "Resolve",
//!       "options": [
//!         { "key": "DNS", "value": "", "active": false,
//!           "source": "/etc/systemd/resolved.conf", "line": 3 }
//!       ]
//!     }]
//!   }]
//! }
//! ```
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

use super::model::{ConfigFile, ConfigOption, ConfigSection, ConfigTree, IMPLICIT_SECTION};
use super::parser::is_valid_key;

/// Version written by [`render_schema`] and accepted by [`tree_from_schema`].
pub const SCHEMA_VERSION: u32 = 1;

/// Top-level schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    /// Document format version.
    pub version: u32,
    /// Files in discovery order.
    pub files: Vec<FileEntry>,
}

/// One file of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    /// File path.
    pub path: String,
    /// Sections in order of appearance.
    #[serde(default)]
    pub sections: Vec<SectionEntry>,
}

/// One section of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionEntry {
    /// Section name; empty for the implicit header-less section.
    pub name: String,
    /// Option occurrences in order.
    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

/// One option occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionEntry {
    /// Option key.
    pub key: String,
    /// Raw value.
    pub value: String,
    /// Whether the line is in effect.
    pub active: bool,
    /// File that contributed the line.
    pub source: String,
    /// 1-based source line.
    pub line: usize,
}

/// Convert a tree into its schema document.
#[must_use]
pub fn render_schema(tree: &ConfigTree) -> SchemaDocument {
    SchemaDocument {
        version: SCHEMA_VERSION,
        files: tree
            .files
            .iter()
            .map(|file| FileEntry {
                path: file.path.clone(),
                sections: file
                    .sections
                    .iter()
                    .map(|section| SectionEntry {
                        name: section.name.clone(),
                        options: section
                            .options
                            .iter()
                            .map(|o| OptionEntry {
                                key: o.key.clone(),
                                value: o.value.clone(),
                                active: o.is_active,
                                source: o.source_file.clone(),
                                line: o.line_number,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Rebuild a tree from a schema document.
///
/// The document must describe a tree the dump parser could have produced,
/// so that [`render_dump`](super::render::render_dump) of the result parses
/// back to it.
///
/// # Errors
///
/// Returns [`SchemaError`] when the version is unknown, a file path repeats,
/// or a file breaks one of the rules checked by [`check_file`].
pub fn tree_from_schema(doc: &SchemaDocument) -> Result<ConfigTree, SchemaError> {
    if doc.version != SCHEMA_VERSION {
        return Err(SchemaError::UnsupportedVersion(doc.version));
    }

    let mut files: Vec<ConfigFile> = Vec::with_capacity(doc.files.len());
    for entry in &doc.files {
        if files.iter().any(|f| f.path == entry.path) {
            return Err(SchemaError::DuplicateFile(entry.path.clone()));
        }
        check_file(entry)?;
        files.push(ConfigFile {
            path: entry.path.clone(),
            sections: entry
                .sections
                .iter()
                .map(|section| ConfigSection {
                    name: section.name.clone(),
                    options: section
                        .options
                        .iter()
                        .map(|o| ConfigOption {
                            key: o.key.clone(),
                            value: o.value.clone(),
                            is_active: o.active,
                            source_file: o.source.clone(),
                            line_number: o.line,
                        })
                        .collect(),
                })
                .collect(),
        });
    }
    Ok(ConfigTree::new(files))
}

/// Check one file entry against the dump grammar:
///
/// - the path is non-empty, single-line and has no surrounding whitespace
/// - the unnamed section, if present, is first and holds options
/// - named sections are single-line and trimmed
/// - keys are identifier-shaped and every option's source is its own file
/// - values are single-line and trimmed; active ones do not end in `\`
/// - at most one active value per (section, key)
///
/// # Errors
///
/// Returns the [`SchemaError`] for the first rule broken.
pub fn check_file(entry: &FileEntry) -> Result<(), SchemaError> {
    let file = &entry.path;
    if !is_single_trimmed_line(file) || file.is_empty() {
        return Err(SchemaError::InvalidPath(file.clone()));
    }

    let mut active: HashSet<(&str, &str)> = HashSet::new();
    for (index, section) in entry.sections.iter().enumerate() {
        if section.name == IMPLICIT_SECTION {
            if index > 0 || section.options.is_empty() {
                return Err(SchemaError::MisplacedImplicitSection(file.clone()));
            }
        } else if !is_single_trimmed_line(&section.name) {
            return Err(SchemaError::InvalidSectionName {
                file: file.clone(),
                name: section.name.clone(),
            });
        }

        for option in &section.options {
            if !is_valid_key(&option.key) {
                return Err(SchemaError::InvalidKey {
                    file: file.clone(),
                    key: option.key.clone(),
                });
            }
            if option.source != *file {
                return Err(SchemaError::ForeignSource {
                    file: file.clone(),
                    key: option.key.clone(),
                    source_file: option.source.clone(),
                });
            }
            let invalid = |reason| SchemaError::InvalidValue {
                file: file.clone(),
                key: option.key.clone(),
                reason,
            };
            if !is_single_trimmed_line(&option.value) {
                return Err(invalid("value must be one line without surrounding whitespace"));
            }
            if option.active {
                if option.value.ends_with('\\') {
                    return Err(invalid("active value must not end in a line continuation"));
                }
                if !active.insert((section.name.as_str(), option.key.as_str())) {
                    return Err(SchemaError::DuplicateActive {
                        file: file.clone(),
                        section: section.name.clone(),
                        key: option.key.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn is_single_trimmed_line(text: &str) -> bool {
    !text.contains(['\n', '\r']) && text.trim() == text
}

/// Serialise a document as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`SchemaError::Decode`] if serialisation fails.
pub fn to_json(doc: &SchemaDocument) -> Result<String, SchemaError> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Parse a JSON schema document.
///
/// # Errors
///
/// Returns [`SchemaError::Decode`] for malformed JSON or unknown fields.
pub fn from_json(text: &str) -> Result<SchemaDocument, SchemaError> {
    Ok(serde_json::from_str(text)?)
}
