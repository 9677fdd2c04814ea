//! Log file location, escape stripping and timestamps.
use std::fs;
use std::path::PathBuf;

/// Remove terminal escape sequences from `s`.
///
/// A CSI sequence (`ESC [` ... final byte in `@`..=`~`) is dropped whole; a
/// lone `ESC` swallows the character after it.
pub(super) fn strip_ansi(s: &str) -> String {
    enum State {
        Text,
        Escape,
        Csi,
    }

    let mut state = State::Text;
    s.chars()
        .filter(|&c| {
            let (next, keep) = match state {
                State::Text if c == '\x1b' => (State::Escape, false),
                State::Text => (State::Text, true),
                State::Escape if c == '[' => (State::Csi, false),
                State::Escape => (State::Text, false),
                State::Csi if ('@'..='~').contains(&c) => (State::Text, false),
                State::Csi => (State::Csi, false),
            };
            state = next;
            keep
        })
        .collect()
}

/// `$XDG_CACHE_HOME/netrepair`, falling back to `~/.cache/netrepair`.
///
/// The directory is created on first use; `None` if that fails.
pub(super) fn cache_dir() -> Option<PathBuf> {
    let base = match std::env::var_os("XDG_CACHE_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::var_os("HOME")
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
            .join(".cache"),
    };
    let dir = base.join("netrepair");
    fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Log file for one subcommand, e.g. `~/.cache/netrepair/validate.log`.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join(command).with_extension("log"))
}

/// Format the current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format the current UTC time as `HH:MM:SS`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::TEST_ENV_MUTEX;

    #[test]
    fn strip_ansi_removes_colors() {
        assert_eq!(strip_ansi("\x1b[31mERROR\x1b[0m hello"), "ERROR hello");
        assert_eq!(strip_ansi("no codes here"), "no codes here");
        assert_eq!(
            strip_ansi("\x1b[1;34m==>\x1b[0m \x1b[1mstage\x1b[0m"),
            "==> stage"
        );
    }

    #[test]
    fn strip_ansi_handles_csi_sequences() {
        assert_eq!(strip_ansi("\x1b[2;5Htext"), "text");
        assert_eq!(strip_ansi("\x1b[Kworld"), "world");
        assert_eq!(strip_ansi("\x1bMtext"), "text");
    }

    #[test]
    fn strip_ansi_empty_string() {
        assert_eq!(strip_ansi(""), "");
    }

    #[test]
    #[allow(unsafe_code)]
    fn log_file_lives_under_xdg_cache_home() {
        let tmp = tempfile::tempdir().unwrap();
        let _lock = TEST_ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // SAFETY: Protected by TEST_ENV_MUTEX.
        unsafe {
            std::env::set_var("XDG_CACHE_HOME", tmp.path());
        }
        let path = log_file_path("validate");
        // SAFETY: Protected by TEST_ENV_MUTEX.
        unsafe {
            std::env::remove_var("XDG_CACHE_HOME");
        }
        assert_eq!(
            path,
            Some(tmp.path().join("netrepair").join("validate.log"))
        );
        assert!(tmp.path().join("netrepair").is_dir());
    }

    #[test]
    fn format_utc_time_has_correct_format() {
        let s = format_utc_time();
        assert_eq!(s.len(), 8, "HH:MM:SS should be 8 chars");
        assert_eq!(&s[2..3], ":");
        assert_eq!(&s[5..6], ":");
    }

    #[test]
    fn format_utc_datetime_has_correct_format() {
        let s = format_utc_datetime();
        assert_eq!(s.len(), 19, "YYYY-MM-DD HH:MM:SS should be 19 chars");
        assert_eq!(&s[4..5], "-");
        assert_eq!(&s[10..11], " ");
    }
}
