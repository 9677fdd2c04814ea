//! In-memory model of stacked systemd configuration.
//!
//! A [`ConfigTree`] owns every [`ConfigFile`] discovered in one parse pass.
//! Options are kept as an ordered list of occurrences rather than a
//! key → value map, so commented defaults and active overrides for the same
//! key survive side by side and can be rendered back faithfully.

/// Name of the section that collects options appearing before any
/// `[Section]` header in a file.
pub const IMPLICIT_SECTION: &str = "";

/// Root aggregate for one parse or discovery pass.
///
/// Immutable once built: edits produce a separate
/// [`DropInPlan`](super::edit::DropInPlan) instead of mutating the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    /// Files in discovery order.
    pub files: Vec<ConfigFile>,
}

/// One configuration file and the sections it contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// Filesystem path; unique within a tree.
    pub path: String,
    /// Sections in order of appearance.
    pub sections: Vec<ConfigSection>,
}

/// A `[Name]` block, or the implicit block before the first header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSection {
    /// Header text without brackets; [`IMPLICIT_SECTION`] when absent.
    pub name: String,
    /// Option occurrences in order of appearance.
    pub options: Vec<ConfigOption>,
}

/// One `Key=Value` occurrence, active or shown as a commented default.
#[derive(Debug, Clone)]
pub struct ConfigOption {
    /// Key, case preserved.
    pub key: String,
    /// Raw value; an empty string is an explicit "unset".
    pub value: String,
    /// `true` for an uncommented line that is in effect.
    pub is_active: bool,
    /// Path of the [`ConfigFile`] that contributed this line.
    pub source_file: String,
    /// 1-based line in the parsed input.
    pub line_number: usize,
}

impl ConfigOption {
    /// Build an active (uncommented) option.
    #[must_use]
    pub fn active(
        key: impl Into<String>,
        value: impl Into<String>,
        source_file: impl Into<String>,
        line_number: usize,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_active: true,
            source_file: source_file.into(),
            line_number,
        }
    }

    /// Build a commented-out default.
    #[must_use]
    pub fn commented(
        key: impl Into<String>,
        value: impl Into<String>,
        source_file: impl Into<String>,
        line_number: usize,
    ) -> Self {
        Self {
            is_active: false,
            ..Self::active(key, value, source_file, line_number)
        }
    }
}

// Line numbers are diagnostic positions: a rendered dump lays lines out
// differently from the text it was parsed from, so they are not part of an
// option's identity.
impl PartialEq for ConfigOption {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.value == other.value
            && self.is_active == other.is_active
            && self.source_file == other.source_file
    }
}

impl Eq for ConfigOption {}

impl ConfigSection {
    /// Create an empty section.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
        }
    }

    /// `true` for the header-less section at the top of a file.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        self.name == IMPLICIT_SECTION
    }

    /// The active occurrence of `key`, if any.
    #[must_use]
    pub fn active(&self, key: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|o| o.is_active && o.key == key)
    }

    /// All active options in order.
    pub fn active_options(&self) -> impl Iterator<Item = &ConfigOption> {
        self.options.iter().filter(|o| o.is_active)
    }
}

impl ConfigFile {
    /// Create a file with no sections.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sections: Vec::new(),
        }
    }

    /// Final path component, e.g. `resolved.conf`.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        std::path::Path::new(&self.path)
            .file_name()
            .and_then(|n| n.to_str())
    }

    /// Sections carrying `name`, in order (a header may repeat).
    pub fn sections_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a ConfigSection> {
        self.sections.iter().filter(move |s| s.name == name)
    }

    /// `true` if at least one section is called `name`.
    #[must_use]
    pub fn has_section(&self, name: &str) -> bool {
        self.sections_named(name).next().is_some()
    }

    /// The option an edit of `section`/`key` refers to: the active occurrence
    /// when there is one, otherwise the last commented default.
    #[must_use]
    pub fn find_option(&self, section: &str, key: &str) -> Option<&ConfigOption> {
        let mut fallback = None;
        for option in self
            .sections_named(section)
            .flat_map(|s| s.options.iter())
            .filter(|o| o.key == key)
        {
            if option.is_active {
                return Some(option);
            }
            fallback = Some(option);
        }
        fallback
    }

    /// Active value of `key` in `section`.
    #[must_use]
    pub fn active_value(&self, section: &str, key: &str) -> Option<&str> {
        self.sections_named(section)
            .find_map(|s| s.active(key))
            .map(|o| o.value.as_str())
    }

    /// `true` when the file contributes no active option at all.
    #[must_use]
    pub fn has_no_active_settings(&self) -> bool {
        self.sections.iter().all(|s| s.active_options().next().is_none())
    }
}

impl ConfigTree {
    /// Wrap an ordered list of files.
    #[must_use]
    pub const fn new(files: Vec<ConfigFile>) -> Self {
        Self { files }
    }

    /// Look a file up by its exact path.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&ConfigFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Number of files.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.files.len()
    }

    /// `true` when no files were discovered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Every option in the tree with the file and section that hold it.
    pub fn options(&self) -> impl Iterator<Item = (&ConfigFile, &ConfigSection, &ConfigOption)> {
        self.files.iter().flat_map(|file| {
            file.sections
                .iter()
                .flat_map(move |section| section.options.iter().map(move |o| (file, section, o)))
        })
    }

    /// Options whose `source_file` does not name a file of this tree.
    ///
    /// Empty for every tree produced by the parser or by
    /// [`tree_from_schema`](super::schema::tree_from_schema).
    #[must_use]
    pub fn dangling_sources(&self) -> Vec<&ConfigOption> {
        self.options()
            .map(|(_, _, option)| option)
            .filter(|o| self.file(&o.source_file).is_none())
            .collect()
    }
}
