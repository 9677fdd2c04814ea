//! Command: emit the configuration as a schema document.
use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, SchemaOpts};
use crate::exec::SystemExecutor;
use crate::logging::Logger;
use crate::systemd::schema::{render_schema, to_json};

/// Run the schema command.
///
/// # Errors
///
/// Returns an error if the tree cannot be loaded or the output cannot be
/// written.
pub fn run(global: &GlobalOpts, opts: &SchemaOpts, log: &Logger) -> Result<()> {
    let setup = super::CommandSetup::init(global, log)?;
    let tree = super::load_tree(&opts.source, &setup.settings, &SystemExecutor, log)?;
    let json = to_json(&render_schema(&tree))?;

    match &opts.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            log.info(&format!("wrote {} files to {}", tree.len(), path.display()));
        }
        None => println!("{json}"),
    }
    Ok(())
}
