//! `netrepair` binary: parse arguments, install the Ctrl+C flag and dispatch
//! to the selected command.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;

use netrepair_cli::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    logging::init_subscriber(args.verbose, args.command.name());
    let log = logging::Logger::new(args.command.name());

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        log.debug(&format!("Ctrl+C handler not installed: {e}"));
    }

    match args.command {
        cli::Command::Validate(opts) => commands::validate::run(&args.global, &opts, &log, cancel),
        cli::Command::Panel(opts) => commands::panel::run(&args.global, &opts, &log),
        cli::Command::Schema(opts) => commands::schema::run(&args.global, &opts, &log),
        cli::Command::Render(opts) => commands::render::run(&opts.schema),
        cli::Command::Edit(opts) => commands::edit::run(&args.global, &opts, &log),
        cli::Command::Completions(opts) => {
            commands::completions::run(&opts);
            Ok(())
        }
        cli::Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
