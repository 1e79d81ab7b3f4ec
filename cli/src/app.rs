//! Application context — unified state passed to every command handler.
//!
//! Constructed once in `Cli::run()`. All persistent voyage state lives on
//! the storage VM; the context only carries process-lifetime things:
//! environment configuration, the provider backend, and output settings.

use anyhow::Result;

use armada_common::Config;

use crate::command_runner::TokioCommandRunner;
use crate::output::Console;
use crate::provider::MultipassProvider;
use crate::remote::MultipassExec;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub no_color: bool,
    pub quiet: bool,
    pub json: bool,
    /// Skip interactive prompts (also set by `CI` / `ARMADA_YES` env vars).
    pub yes: bool,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal console (colors, quiet mode).
    pub console: Console,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Environment configuration (provider, defaults, staleness policy).
    pub config: Config,
    /// VM backend.
    pub provider: MultipassProvider<TokioCommandRunner>,
    /// Exec channel to named VMs.
    pub remote: MultipassExec<TokioCommandRunner>,
    /// When `true`, skip interactive prompts and use defaults.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error when the environment configuration is invalid
    /// (unknown `PROVIDER`, non-numeric thresholds).
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("ARMADA_YES").is_ok();
        let non_interactive = flags.yes || ci_env;

        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        let config = Config::from_env()?;

        Ok(Self {
            console: Console::new(flags.no_color, flags.quiet || flags.json),
            mode,
            config,
            provider: MultipassProvider::new(TokioCommandRunner),
            remote: MultipassExec::new(TokioCommandRunner),
            non_interactive,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes`, or `ARMADA_YES`),
    /// returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
