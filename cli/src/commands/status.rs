//! `armada status [<voyage_id>]` — derive and present fleet state.

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use armada_common::derive;

use crate::app::AppContext;
use crate::error::Outcome;
use crate::fleet;
use crate::taskstore::TaskStore;

#[derive(Args)]
pub struct StatusArgs {
    /// Voyage to inspect; defaults to the single active voyage
    pub voyage_id: Option<String>,
}

/// Run `armada status`.
///
/// # Errors
///
/// Returns an error when no (or more than one) voyage matches, or when the
/// storage VM cannot be reached. Task-file data faults never fail status.
pub async fn run(args: &StatusArgs, app: &AppContext) -> Result<Outcome> {
    let (voyage_id, storage) =
        fleet::resolve_voyage(&app.provider, args.voyage_id.as_deref()).await?;
    let voyage = fleet::load_descriptor(&app.remote, &storage.name, &voyage_id).await?;

    let store = TaskStore::new(&app.remote, storage.name.clone(), &voyage);
    let listing = store.list_tasks().await?;
    for skipped in &listing.skipped {
        app.console.warn(&format!("skipping {skipped}"));
    }

    let status = derive(&listing.tasks, Utc::now(), app.config.stale_threshold);

    if app.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "voyage": voyage,
                "status": status,
                "unparseable_tasks": listing.skipped.len(),
            })
        );
    } else {
        app.console.voyage_status(&voyage.id, &status);
    }

    Ok(Outcome::Clean)
}
