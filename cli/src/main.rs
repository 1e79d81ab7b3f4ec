//! Armada CLI - launch and supervise fleets of coding-agent VMs

#![cfg_attr(test, allow(clippy::expect_used))]

use clap::Parser;

mod app;
mod cli;
mod command_runner;
mod commands;
mod error;
mod fleet;
mod layout;
mod output;
mod plan;
mod provider;
mod remote;
mod retry;
mod taskstore;

use cli::Cli;
use error::{exit, exit_code_for};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version requests are not usage errors.
            let code = match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    exit::SUCCESS
                }
                _ => exit::USAGE,
            };
            let _ = err.print();
            std::process::exit(i32::from(code));
        }
    };

    // Interrupts must leave the storage VM well-formed: every write it takes
    // is atomic-per-file, so cancelling in-flight work here is safe.
    tokio::select! {
        result = cli.run() => match result {
            Ok(outcome) => std::process::exit(i32::from(outcome.exit_code())),
            Err(err) => {
                eprintln!("Error: {err:#}");
                std::process::exit(i32::from(exit_code_for(&err)));
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted");
            std::process::exit(130);
        }
    }
}
