//! CLI argument parsing with clap derive.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags};
use crate::commands;
use crate::error::Outcome;

/// Launch and supervise fleets of coding-agent VMs
#[derive(Parser)]
#[command(
    name = "armada",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Skip interactive confirmation prompts (also set by `CI` or `ARMADA_YES` env vars)
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Launch a new voyage from a plan directory
    Sail(commands::sail::SailArgs),

    /// Show derived voyage and fleet state
    Status(commands::status::StatusArgs),

    /// List the task set
    Tasks(commands::tasks::TasksArgs),

    /// Read or follow ship logs
    Logs(commands::logs::LogsArgs),

    /// Return claimed tasks to the pool
    #[command(name = "reset-task")]
    ResetTask(commands::reset::ResetTaskArgs),

    /// Add ships to an existing voyage
    Resume(commands::resume::ResumeArgs),

    /// Open an interactive shell on a ship
    Shell(commands::shell::ShellArgs),

    /// Destroy the ships, keep the storage
    Abandon(commands::abandon::AbandonArgs),

    /// Destroy a fleet's VMs
    Sink(commands::sink::SinkArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails; the caller maps error kinds
    /// onto exit codes.
    pub async fn run(self) -> Result<Outcome> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            command,
        } = self;
        let no_color = no_color || std::env::var("NO_COLOR").is_ok();

        let app = AppContext::new(&AppFlags {
            no_color,
            quiet,
            json,
            yes,
        })?;

        match command {
            Command::Sail(args) => commands::sail::run(&args, &app).await,
            Command::Status(args) => commands::status::run(&args, &app).await,
            Command::Tasks(args) => commands::tasks::run(&args, &app).await,
            Command::Logs(args) => commands::logs::run(&args, &app).await,
            Command::ResetTask(args) => commands::reset::run(&args, &app).await,
            Command::Resume(args) => commands::resume::run(&args, &app).await,
            Command::Shell(args) => commands::shell::run(&args, &app).await,
            Command::Abandon(args) => commands::abandon::run(&args, &app).await,
            Command::Sink(args) => commands::sink::run(&args, &app).await,
            Command::Version => commands::version::run(&app),
        }
    }
}
