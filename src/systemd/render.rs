//! Text renderers for a [`ConfigTree`].
//!
//! [`render_dump`] is the inverse of [`parse_dump`](super::parser::parse_dump):
//! for every tree the parser can produce,
//! `parse_dump(&render_dump(&tree)) == Ok(tree)`.
use std::fmt::Write as _;

use super::model::{ConfigFile, ConfigTree};
use super::parser::FILE_MARKER;

/// Render `tree` in `systemd-analyze cat-config` layout.
///
/// Commented defaults are written as `#Key=Value`, active options as
/// `Key=Value`, each in its original position.
///
/// # Examples
///
/// ```
/// use netrepair_cli::systemd::parser::parse_dump;
/// use netrepair_cli::systemd::render::render_dump;
///
/// let text = "# /etc/systemd/system.conf\n\n[Manager]\nLogLevel=info\n#LogLevel=debug\n";
/// let tree = parse_dump(text).unwrap();
/// assert_eq!(render_dump(&tree), text);
/// ```
#[must_use]
pub fn render_dump(tree: &ConfigTree) -> String {
    let mut out = String::new();
    for (index, file) in tree.files.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        render_file(&mut out, file);
    }
    out
}

fn render_file(out: &mut String, file: &ConfigFile) {
    out.push_str(&file_header(&file.path));
    out.push('\n');
    for section in &file.sections {
        if !section.is_implicit() {
            let _ = write!(out, "\n[{}]\n", section.name);
        }
        for option in &section.options {
            let marker = if option.is_active { "" } else { "#" };
            let _ = writeln!(out, "{marker}{}={}", option.key, option.value);
        }
    }
}

/// Header line introducing `path` in a dump.
///
/// Absolute paths without whitespace use the bare `# /path` form emitted by
/// `systemd-analyze`; anything else falls back to the explicit marker.
#[must_use]
pub fn file_header(path: &str) -> String {
    if path.starts_with('/') && !path.contains(char::is_whitespace) {
        format!("# {path}")
    } else {
        format!("{FILE_MARKER}{path}")
    }
}

/// Render a per-file summary of active settings for terminal display.
///
/// Files without any active option are listed with `No active settings`.
#[must_use]
pub fn render_panel(tree: &ConfigTree) -> String {
    let mut out = String::new();
    for file in &tree.files {
        let _ = writeln!(out, "{}", file.path);
        if file.has_no_active_settings() {
            out.push_str("  No active settings\n");
            continue;
        }
        for section in &file.sections {
            let mut active = section.active_options().peekable();
            if active.peek().is_none() {
                continue;
            }
            if !section.is_implicit() {
                let _ = writeln!(out, "  [{}]", section.name);
            }
            for option in active {
                let _ = writeln!(out, "    {}={}", option.key, option.value);
            }
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::systemd::model::{ConfigOption, ConfigSection};
    use crate::systemd::parser::parse_dump;

    #[test]
    fn renders_active_and_commented_lines() {
        let path = "/etc/systemd/system.conf";
        let tree = ConfigTree::new(vec![ConfigFile {
            path: path.to_string(),
            sections: vec![ConfigSection {
                name: "Manager".to_string(),
                options: vec![
                    ConfigOption::active("LogLevel", "info", path, 2),
                    ConfigOption::commented("LogLevel", "debug", path, 3),
                ],
            }],
        }]);
        let text = render_dump(&tree);
        assert_eq!(text, "# /etc/systemd/system.conf\n\n[Manager]\nLogLevel=info\n#LogLevel=debug\n");
    }

    #[test]
    fn implicit_section_has_no_header() {
        let tree = parse_dump("# /etc/default/env\nA=1\n[Named]\nB=2\n").unwrap();
        assert_eq!(render_dump(&tree), "# /etc/default/env\nA=1\n\n[Named]\nB=2\n");
    }

    #[test]
    fn files_are_separated_by_blank_line() {
        let tree = parse_dump("# /etc/a.conf\n[A]\nX=1\n# /etc/b.conf\n[B]\nY=\n").unwrap();
        assert_eq!(
            render_dump(&tree),
            "# /etc/a.conf\n\n[A]\nX=1\n\n# /etc/b.conf\n\n[B]\nY=\n"
        );
    }

    #[test]
    fn unusual_paths_use_explicit_marker() {
        assert_eq!(file_header("/etc/a.conf"), "# /etc/a.conf");
        assert_eq!(file_header("relative.conf"), "# FILE: relative.conf");
        assert_eq!(file_header("/etc/with space.conf"), "# FILE: /etc/with space.conf");
    }

    #[test]
    fn rendered_dump_parses_back_to_same_tree() {
        let dump = "# /etc/systemd/resolved.conf\n########\n# prose\n[Resolve]\n#DNS=\nDNS=1.1.1.1 8.8.8.8\n\
                    #DNSSEC=no\n[Empty]\n# FILE: conf.d/x y.conf\nTop=1\n[Resolve]\nLLMNR=no\n";
        let tree = parse_dump(dump).unwrap();
        let again = parse_dump(&render_dump(&tree)).unwrap();
        assert_eq!(again, tree);
    }

    #[test]
    fn empty_tree_renders_empty_string() {
        assert_eq!(render_dump(&ConfigTree::default()), "");
    }

    #[test]
    fn panel_lists_only_active_settings() {
        let tree = parse_dump(
            "# /etc/systemd/logind.conf\n[Login]\n#HandlePowerKey=poweroff\n\
             # /etc/systemd/resolved.conf\n[Resolve]\n#DNS=\nDNS=1.1.1.1\n",
        )
        .unwrap();
        assert_eq!(
            render_panel(&tree),
            "/etc/systemd/logind.conf\n  No active settings\n\
             /etc/systemd/resolved.conf\n  [Resolve]\n    DNS=1.1.1.1\n"
        );
    }
}
