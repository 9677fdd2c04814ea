//! Command: override one option through a drop-in file.
//!
//! With `--file/--key/--value` the edit is planned directly and written only
//! with `--yes`. Otherwise the user picks a file, section and key from menus,
//! enters a value, previews the drop-in and confirms.
use anyhow::{Context as _, Result};
use dialoguer::{Confirm, Input, Select};

use crate::cli::{EditOpts, GlobalOpts};
use crate::error::EditError;
use crate::exec::SystemExecutor;
use crate::logging::Logger;
use crate::operations::SystemFileSystemOps;
use crate::systemd::edit::{EditSession, EditState, key_choices, section_choices, section_label};

/// User interaction needed by the interactive edit flow.
pub trait Prompt {
    /// Pick one of `items`; `None` means the user backed out.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal interaction fails.
    fn select(&mut self, title: &str, items: &[String]) -> Result<Option<usize>>;

    /// Ask for a line of text, pre-filled with `initial`.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal interaction fails.
    fn input(&mut self, title: &str, initial: &str) -> Result<String>;

    /// Ask a yes/no question; the default is no.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal interaction fails.
    fn confirm(&mut self, title: &str) -> Result<bool>;
}

/// [`Prompt`] backed by the terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn select(&mut self, title: &str, items: &[String]) -> Result<Option<usize>> {
        Select::new()
            .with_prompt(format!("{title} (Esc or q to quit)"))
            .items(items)
            .default(0)
            .interact_opt()
            .context("Failed to show menu")
    }

    fn input(&mut self, title: &str, initial: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(title)
            .with_initial_text(initial)
            .allow_empty(true)
            .interact_text()
            .context("Failed to read value")
    }

    fn confirm(&mut self, title: &str) -> Result<bool> {
        Confirm::new()
            .with_prompt(title)
            .default(false)
            .interact()
            .context("Failed to read confirmation")
    }
}

/// Run the edit command.
///
/// # Errors
///
/// Returns an error if the tree cannot be loaded, the edit is refused, or the
/// drop-in cannot be written.
pub fn run(global: &GlobalOpts, opts: &EditOpts, log: &Logger) -> Result<()> {
    let setup = super::CommandSetup::init(global, log)?;
    let tree = super::load_tree(&opts.source, &setup.settings, &SystemExecutor, log)?;
    let fs = SystemFileSystemOps;
    let mut session = EditSession::new(&tree, &fs, &setup.settings.edit.dropin_name)
        .with_dropin_dir(opts.dropin_dir.clone());

    let state = if opts.file.is_some() {
        run_direct(&mut session, opts, log)?
    } else {
        run_interactive(&mut session, &mut TerminalPrompt, log)?
    };
    report(&state, log);
    Ok(())
}

/// Plan the edit named by the command-line flags and write it if `--yes`.
///
/// # Errors
///
/// Returns an error if a flag is missing or planning or writing fails.
pub fn run_direct(session: &mut EditSession<'_>, opts: &EditOpts, log: &Logger) -> Result<EditState> {
    let (Some(file), Some(key), Some(value)) = (&opts.file, &opts.key, &opts.value) else {
        anyhow::bail!("--file, --key and --value are required together");
    };
    let section = opts.section.as_deref().unwrap_or_default();
    let plan = session.select(file, section, key, value)?;
    println!("{}", plan.preview());

    if opts.yes {
        session.confirm()?;
        session.write()?;
    } else {
        log.info("dry run: pass --yes to write the drop-in");
        session.cancel()?;
    }
    Ok(session.state().clone())
}

/// Drive `session` through menus until the edit is written or abandoned.
///
/// Invalid values are reported and the selection restarts; an unsafe target
/// ends the session with an error.
///
/// # Errors
///
/// Returns an error if prompting fails, the target is unsafe, or the write
/// fails.
pub fn run_interactive(
    session: &mut EditSession<'_>,
    prompt: &mut dyn Prompt,
    log: &Logger,
) -> Result<EditState> {
    let tree = session.tree();
    if tree.is_empty() {
        log.warn("no configuration files to edit");
        session.cancel()?;
        return Ok(session.state().clone());
    }

    loop {
        let paths: Vec<String> = tree.files.iter().map(|f| f.path.clone()).collect();
        let Some(file) = prompt
            .select("Configuration file", &paths)?
            .and_then(|i| tree.files.get(i))
        else {
            session.cancel()?;
            return Ok(session.state().clone());
        };

        let sections = section_choices(file);
        let labels: Vec<String> = sections.iter().map(|s| section_label(s).to_string()).collect();
        let Some(section) = prompt.select("Section", &labels)?.and_then(|i| sections.get(i)) else {
            continue;
        };

        let keys = key_choices(file, section);
        if keys.is_empty() {
            log.warn(&format!("no options in [{}]", section_label(section)));
            continue;
        }
        let shown: Vec<String> = keys.iter().map(ToString::to_string).collect();
        let Some(choice) = prompt.select("Option", &shown)?.and_then(|i| keys.get(i)) else {
            continue;
        };

        let value = prompt.input(&format!("New value for {}", choice.key), &choice.value)?;
        let plan = match session.select(&file.path, section, &choice.key, &value) {
            Ok(plan) => plan,
            Err(e @ (EditError::InvalidValue { .. } | EditError::NotFound { .. })) => {
                log.warn(&e.to_string());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        println!("{}", plan.preview());
        if prompt.confirm("Write this drop-in?")? {
            session.confirm()?;
            session.write()?;
        } else {
            session.cancel()?;
        }
        return Ok(session.state().clone());
    }
}

fn report(state: &EditState, log: &Logger) {
    match state {
        EditState::Written(path) => {
            log.info(&format!("wrote {}", path.display()));
            log.info("run `systemctl daemon-reload` or restart the service to apply");
        }
        EditState::Cancelled => log.info("no changes written"),
        other => log.debug(&format!("edit ended while {}", other.name())),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::operations::{MockFileSystemOps, PathInfo};
    use crate::systemd::parser::parse_dump;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    const NAME: &str = "99-netrepair.conf";

    /// Scripted answers, consumed in order.
    #[derive(Debug, Default)]
    struct ScriptedPrompt {
        selections: VecDeque<Option<usize>>,
        inputs: VecDeque<String>,
        confirms: VecDeque<bool>,
        menus: Vec<Vec<String>>,
    }

    impl Prompt for ScriptedPrompt {
        fn select(&mut self, _: &str, items: &[String]) -> Result<Option<usize>> {
            self.menus.push(items.to_vec());
            Ok(self.selections.pop_front().flatten())
        }

        fn input(&mut self, _: &str, _: &str) -> Result<String> {
            self.inputs.pop_front().context("no scripted input")
        }

        fn confirm(&mut self, _: &str) -> Result<bool> {
            self.confirms.pop_front().context("no scripted confirmation")
        }
    }

    fn tree() -> crate::systemd::model::ConfigTree {
        parse_dump(
            "# /etc/systemd/journald.conf\n\n[Journal]\nStorage=auto\n\
             \n# /etc/systemd/resolved.conf\n\n[Resolve]\nDNS=1.1.1.1\n#DNSSEC=no\n",
        )
        .unwrap()
    }

    fn fs() -> MockFileSystemOps {
        MockFileSystemOps::new().with_path("/etc/systemd", PathInfo::dir(0o755))
    }

    #[test]
    fn interactive_pick_and_confirm_writes_dropin() {
        let tree = tree();
        let fs = fs();
        let mut session = EditSession::new(&tree, &fs, NAME);
        let mut prompt = ScriptedPrompt {
            selections: VecDeque::from([Some(1), Some(0), Some(1)]),
            inputs: VecDeque::from(["yes".to_string()]),
            confirms: VecDeque::from([true]),
            ..ScriptedPrompt::default()
        };
        let state = run_interactive(&mut session, &mut prompt, &Logger::new("test")).unwrap();
        let target = PathBuf::from("/etc/systemd/resolved.conf.d").join(NAME);
        assert_eq!(state, EditState::Written(target.clone()));
        assert_eq!(fs.written(), vec![(target, "[Resolve]\nDNSSEC=yes\n".to_string())]);
        assert_eq!(prompt.menus[2], vec!["DNS=1.1.1.1", "DNSSEC=no (default)"]);
    }

    #[test]
    fn interactive_decline_writes_nothing() {
        let tree = tree();
        let fs = fs();
        let mut session = EditSession::new(&tree, &fs, NAME);
        let mut prompt = ScriptedPrompt {
            selections: VecDeque::from([Some(0), Some(0), Some(0)]),
            inputs: VecDeque::from(["volatile".to_string()]),
            confirms: VecDeque::from([false]),
            ..ScriptedPrompt::default()
        };
        let state = run_interactive(&mut session, &mut prompt, &Logger::new("test")).unwrap();
        assert_eq!(state, EditState::Cancelled);
        assert_eq!(fs.mutation_count(), 0);
    }

    #[test]
    fn interactive_quit_at_first_menu_cancels() {
        let tree = tree();
        let fs = fs();
        let mut session = EditSession::new(&tree, &fs, NAME);
        let mut prompt = ScriptedPrompt {
            selections: VecDeque::from([None]),
            ..ScriptedPrompt::default()
        };
        let state = run_interactive(&mut session, &mut prompt, &Logger::new("test")).unwrap();
        assert_eq!(state, EditState::Cancelled);
    }

    #[test]
    fn interactive_invalid_value_restarts_selection() {
        let tree = tree();
        let fs = fs();
        let mut session = EditSession::new(&tree, &fs, NAME);
        let mut prompt = ScriptedPrompt {
            selections: VecDeque::from([Some(0), Some(0), Some(0), None]),
            inputs: VecDeque::from(["a\nb".to_string()]),
            ..ScriptedPrompt::default()
        };
        let state = run_interactive(&mut session, &mut prompt, &Logger::new("test")).unwrap();
        assert_eq!(state, EditState::Cancelled);
        assert_eq!(prompt.menus.len(), 4);
    }

    #[test]
    fn interactive_unsafe_target_is_fatal() {
        let tree = tree();
        let fs = MockFileSystemOps::new().with_path("/etc/systemd/journald.conf.d", PathInfo::symlink());
        let mut session = EditSession::new(&tree, &fs, NAME);
        let mut prompt = ScriptedPrompt {
            selections: VecDeque::from([Some(0), Some(0), Some(0)]),
            inputs: VecDeque::from(["volatile".to_string()]),
            ..ScriptedPrompt::default()
        };
        let err = run_interactive(&mut session, &mut prompt, &Logger::new("test")).unwrap_err();
        assert!(err.to_string().contains("symbolic link"));
        assert_eq!(fs.mutation_count(), 0);
    }

    fn direct_opts(yes: bool) -> EditOpts {
        EditOpts {
            source: crate::cli::SourceOpts::default(),
            dropin_dir: None,
            file: Some("/etc/systemd/resolved.conf".to_string()),
            section: Some("Resolve".to_string()),
            key: Some("DNS".to_string()),
            value: Some("9.9.9.9".to_string()),
            yes,
        }
    }

    #[test]
    fn direct_without_yes_is_a_dry_run() {
        let tree = tree();
        let fs = fs();
        let mut session = EditSession::new(&tree, &fs, NAME);
        let state = run_direct(&mut session, &direct_opts(false), &Logger::new("test")).unwrap();
        assert_eq!(state, EditState::Cancelled);
        assert_eq!(fs.mutation_count(), 0);
    }

    #[test]
    fn direct_with_yes_writes() {
        let tree = tree();
        let fs = fs();
        let mut session = EditSession::new(&tree, &fs, NAME);
        let state = run_direct(&mut session, &direct_opts(true), &Logger::new("test")).unwrap();
        assert!(matches!(state, EditState::Written(_)));
        assert_eq!(fs.written()[0].1, "[Resolve]\nDNS=9.9.9.9\n");
    }
}
