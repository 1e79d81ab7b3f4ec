//! Spinner narration for long fleet operations.

use std::cell::RefCell;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::fleet::Reporter;

/// Reporter that narrates fleet phases as a single rolling spinner.
///
/// Each `step` replaces the previous spinner; `success` and `warn` resolve
/// the active one in place. Only constructed when stdout is a live
/// terminal.
#[derive(Default)]
pub struct SpinnerReporter {
    active: RefCell<Option<ProgressBar>>,
}

impl SpinnerReporter {
    fn resolve(&self, mark: &str, message: &str) {
        match self.active.borrow_mut().take() {
            Some(spinner) => spinner.finish_with_message(format!("{mark} {message}")),
            None => println!("{mark} {message}"),
        }
    }
}

#[allow(clippy::expect_used)] // spinner template is a compile-time constant
impl Reporter for SpinnerReporter {
    fn step(&self, message: &str) {
        if let Some(previous) = self.active.borrow_mut().take() {
            previous.finish_and_clear();
        }
        let spinner = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner:.blue} {wide_msg}").expect("static template"),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        *self.active.borrow_mut() = Some(spinner);
    }

    fn success(&self, message: &str) {
        self.resolve("✓", message);
    }

    fn warn(&self, message: &str) {
        self.resolve("⚠", message);
    }
}
