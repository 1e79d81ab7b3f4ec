//! `armada version` — print the CLI version.

use anyhow::Result;

use crate::app::AppContext;
use crate::error::Outcome;

/// Run `armada version`.
pub fn run(app: &AppContext) -> Result<Outcome> {
    if app.is_json() {
        println!(
            "{}",
            serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })
        );
    } else {
        println!("armada {}", env!("CARGO_PKG_VERSION"));
    }
    Ok(Outcome::Clean)
}
