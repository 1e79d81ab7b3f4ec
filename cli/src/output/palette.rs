//! Console color assignments.

use owo_colors::Style;

/// Style for each class of console output.
///
/// Resolved once when the console is built — either `colored` or `plain` —
/// so no call site ever re-checks the terminal.
#[derive(Clone)]
pub struct Palette {
    /// Completed actions (`ok` tag).
    pub ok: Style,
    /// Recoverable trouble (`warn` tag).
    pub warning: Style,
    /// Hard failures (`error` tag).
    pub danger: Style,
    /// Secondary text: field names, hints.
    pub muted: Style,
    /// Section titles.
    pub heading: Style,
}

impl Palette {
    /// Styles for a color-capable terminal.
    #[must_use]
    pub fn colored() -> Self {
        Self {
            ok: Style::new().green().bold(),
            warning: Style::new().yellow().bold(),
            danger: Style::new().red().bold(),
            muted: Style::new().dimmed(),
            heading: Style::new().bold().underline(),
        }
    }

    /// Pass-through styles for pipes and `NO_COLOR`.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            ok: Style::new(),
            warning: Style::new(),
            danger: Style::new(),
            muted: Style::new(),
            heading: Style::new(),
        }
    }
}
