//! Command-line front end for stockroom tables.
//!
//! The `stockroom` binary is a thin wrapper around [`run`]; everything it
//! prints goes through the writer passed in, which keeps the commands
//! testable without a subprocess.
//!
//! # Commands
//!
//! - `inspect <file> [--kind products|users] [--slots] [--json]`
//! - `products list|get|add|update|delete|category|search`
//! - `users get|add|delete|set-password`

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod cli;
pub mod commands;
pub mod inspect;

pub use cli::{Cli, Command};

use anyhow::Result;
use std::io::Write;

/// Run one parsed command, writing its output to `out`.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    match &cli.command {
        Command::Inspect(args) => {
            let report = inspect::inspect(args)?;
            if args.json {
                serde_json::to_writer_pretty(&mut *out, &report)?;
                writeln!(out)?;
                Ok(())
            } else {
                inspect::render(&report, out)
            }
        }
        Command::Products(command) => {
            let config = cli.catalog_config();
            config.validate()?;
            commands::products(&config, command, out)
        }
        Command::Users(command) => {
            let config = cli.catalog_config();
            config.validate()?;
            commands::users(&config, command, out)
        }
    }
}
