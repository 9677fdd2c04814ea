//! systemd configuration introspection engine.
//!
//! Discovers effective systemd configuration, parses stacked
//! `systemd-analyze cat-config` dumps into a structured model, lints
//! `systemd-resolved` settings, verifies unit files, renders the model back
//! to dump text or a JSON schema document, and writes single-option
//! overrides as drop-in files after checking the target directory is safe.
//!
//! The public API is organised into four layers:
//!
//! - **[`systemd`]**: the engine (parser, model, linter, verifier, renderers, edit planner)
//! - **[`exec`]** / **[`operations`]**: injectable process and filesystem capabilities
//! - **[`settings`]**: TOML settings
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod exec;
pub mod logging;
pub mod operations;
pub mod settings;
pub mod systemd;
