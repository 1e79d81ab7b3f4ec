//! `armada abandon <voyage_id>` — destroy the ships, keep the storage.
//!
//! The task files and artifacts survive, so the voyage can be re-crewed
//! later with `resume`.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::error::Outcome;
use crate::fleet;
use crate::provider::Provider;

#[derive(Args)]
pub struct AbandonArgs {
    /// Voyage whose ships to destroy
    pub voyage_id: String,
}

/// Run `armada abandon`. Idempotent: destroying already-gone ships is fine.
pub async fn run(args: &AbandonArgs, app: &AppContext) -> Result<Outcome> {
    let (voyage_id, _storage) =
        fleet::resolve_voyage(&app.provider, Some(&args.voyage_id)).await?;

    let ships = fleet::list_ship_vms(&app.provider, &voyage_id).await?;
    if ships.is_empty() {
        app.console.note("no ship VMs found");
    }
    for ship in &ships {
        app.provider.destroy(&ship.name).await?;
        app.console.ok(&format!("destroyed {}", ship.name));
    }

    if app.is_json() {
        let destroyed: Vec<&str> = ships.iter().map(|s| s.name.as_str()).collect();
        println!("{}", serde_json::json!({ "destroyed": destroyed }));
    } else {
        app.console.note(&format!(
            "storage preserved. Run: armada resume {voyage_id} to re-crew"
        ));
    }
    Ok(Outcome::Clean)
}
