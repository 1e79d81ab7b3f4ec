//! Terminal output: the console, its palette, and fleet progress narration.
//!
//! Commands print through [`Console`] only. Quiet mode drops everything
//! except errors, and JSON mode constructs the console quiet so machine
//! output stays clean. Rendering of derived voyage state lives here too,
//! next to the styling it depends on.

pub mod palette;
pub mod progress;

use std::fmt::Display;

use console::Term;
use owo_colors::OwoColorize as _;

pub use palette::Palette;

use armada_common::{ShipState, VoyageState, VoyageStatus};

use crate::fleet::Reporter;

/// Human-readable label for a derived ship state.
#[must_use]
pub fn ship_state_label(state: ShipState) -> &'static str {
    match state {
        ShipState::Working => "working",
        ShipState::Stale => "stale",
        ShipState::Idle => "idle",
        ShipState::Unknown => "unknown",
    }
}

/// Terminal console used by every command for human-readable output.
pub struct Console {
    palette: Palette,
    quiet: bool,
    tty: bool,
}

impl Console {
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let tty = Term::stdout().is_term();
        let colored = tty && !no_color && std::env::var("NO_COLOR").is_err();
        Self {
            palette: if colored {
                Palette::colored()
            } else {
                Palette::plain()
            },
            quiet,
            tty,
        }
    }

    /// Spinners only make sense on a live terminal.
    #[must_use]
    pub fn wants_spinners(&self) -> bool {
        self.tty && !self.quiet
    }

    /// Confirmation of something that happened.
    pub fn ok(&self, msg: &str) {
        if !self.quiet {
            println!("{} {msg}", "ok".style(self.palette.ok));
        }
    }

    /// Something went sideways but the command carries on.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("{} {msg}", "warn".style(self.palette.warning));
        }
    }

    /// Hard failure. Never suppressed, always stderr.
    pub fn error(&self, msg: &str) {
        eprintln!("{} {msg}", "error".style(self.palette.danger));
    }

    /// Neutral guidance: next actions, hints.
    pub fn note(&self, msg: &str) {
        if !self.quiet {
            println!("{} {msg}", "note".style(self.palette.muted));
        }
    }

    /// Title for a block of fields.
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n{}", title.style(self.palette.heading));
        }
    }

    /// One `name: value` line under a section.
    pub fn field(&self, name: &str, value: impl Display) {
        if !self.quiet {
            println!("  {}: {value}", name.style(self.palette.muted));
        }
    }

    pub fn blank(&self) {
        if !self.quiet {
            println!();
        }
    }

    /// Render a derived voyage status block, ships and faults included.
    pub fn voyage_status(&self, voyage_id: &str, status: &VoyageStatus) {
        self.section(&format!("voyage {voyage_id}"));
        self.field("state", status.state.as_str());
        self.field(
            "tasks",
            format!(
                "{}/{} complete ({} pending, {} in progress, {} stale)",
                status.counts.complete,
                status.counts.total,
                status.counts.pending,
                status.counts.in_progress,
                status.counts.stale,
            ),
        );

        if status.ships.is_empty() {
            self.field("ships", "none observed");
        } else {
            for ship in &status.ships {
                self.field(
                    &ship.id,
                    format!(
                        "{}, {} completed",
                        ship_state_label(ship.state),
                        ship.completed_count
                    ),
                );
            }
        }

        for fault in &status.faults {
            self.warn(&format!("task {}: {}", fault.task_id, fault.detail));
        }

        self.blank();
        match status.state {
            VoyageState::Stalled => {
                self.note(&format!("Run: armada reset-task {voyage_id} --all-stale"));
            }
            VoyageState::Planning => {
                self.note("Task set is empty; agents are waiting for a plan.");
            }
            VoyageState::Running | VoyageState::Complete => {}
        }
    }
}

/// Fleet operations narrate through the [`Reporter`] port; the console is
/// its plain-text implementation (the spinner one lives in [`progress`]).
impl Reporter for Console {
    fn step(&self, message: &str) {
        self.note(message);
    }

    fn success(&self, message: &str) {
        self.ok(message);
    }

    fn warn(&self, message: &str) {
        Console::warn(self, message);
    }
}
