//! Command: show active settings per file.
use anyhow::Result;

use crate::cli::{GlobalOpts, SourceOpts};
use crate::exec::SystemExecutor;
use crate::logging::Logger;
use crate::systemd::render::render_panel;

/// Run the panel command.
///
/// # Errors
///
/// Returns an error if settings or the configuration tree cannot be loaded.
pub fn run(global: &GlobalOpts, opts: &SourceOpts, log: &Logger) -> Result<()> {
    let setup = super::CommandSetup::init(global, log)?;
    let tree = super::load_tree(opts, &setup.settings, &SystemExecutor, log)?;
    if tree.is_empty() {
        log.warn(&format!(
            "no configuration found under {}",
            super::source_root(opts).display()
        ));
        return Ok(());
    }
    print!("{}", render_panel(&tree));
    Ok(())
}
