//! Command: generate shell completions.
use std::io::Write;

use clap::CommandFactory as _;

use crate::cli::{Cli, CompletionsOpts};

/// Write completions for `opts.shell` to `out`.
pub fn write_completions(opts: &CompletionsOpts, out: &mut dyn Write) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(opts.shell, &mut command, name, out);
}

/// Print completions to stdout.
pub fn run(opts: &CompletionsOpts) {
    write_completions(opts, &mut std::io::stdout());
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn bash_completions_name_subcommands() {
        let mut out = Vec::new();
        write_completions(
            &CompletionsOpts {
                shell: clap_complete::Shell::Bash,
            },
            &mut out,
        );
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("netrepair"));
        assert!(script.contains("validate"));
    }
}
