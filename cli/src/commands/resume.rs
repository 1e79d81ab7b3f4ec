//! `armada resume <voyage_id> [--ships=K]` — add ships to a voyage.
//!
//! Indices are monotonic: the next ship gets one past the highest index ever
//! observed, whether that ship is alive, dead, or only remembered by task
//! metadata.

use anyhow::Result;
use clap::Args;
use futures_util::future::join_all;

use crate::app::AppContext;
use crate::error::Outcome;
use crate::fleet::bootstrap::{bootstrap_ship, ShipFailure};
use crate::fleet::{self, Reporter};
use crate::taskstore::TaskStore;

#[derive(Args)]
pub struct ResumeArgs {
    /// Voyage to extend
    pub voyage_id: String,

    /// How many ships to add
    #[arg(long, default_value_t = 1)]
    pub ships: u32,
}

/// Run `armada resume`.
pub async fn run(args: &ResumeArgs, app: &AppContext) -> Result<Outcome> {
    let (voyage_id, storage) = fleet::resolve_voyage(&app.provider, Some(&args.voyage_id)).await?;
    let voyage = fleet::load_descriptor(&app.remote, &storage.name, &voyage_id).await?;

    let vms = fleet::list_ship_vms(&app.provider, &voyage_id).await?;
    let store = TaskStore::new(&app.remote, storage.name.clone(), &voyage);
    let listing = store.list_tasks().await?;
    let next = fleet::next_ship_index(&voyage, &vms, &listing.tasks);

    let indices: Vec<u32> = (next..next + args.ships).collect();
    app.console.step(&format!(
        "bootstrapping {} ship(s) starting at index {next}",
        args.ships
    ));

    let launches = join_all(indices.iter().map(|&index| {
        let voyage = &voyage;
        let storage = &storage;
        async move {
            (
                index,
                bootstrap_ship(&app.provider, &app.remote, voyage, storage, index).await,
            )
        }
    }))
    .await;

    let mut failures: Vec<ShipFailure> = Vec::new();
    let mut launched = Vec::new();
    for (index, result) in launches {
        match result {
            Ok(()) => {
                launched.push(index);
                app.console.ok(&format!("ship-{index} underway"));
            }
            Err(err) => {
                app.console.warn(&format!("ship-{index} failed: {err:#}"));
                failures.push(ShipFailure {
                    index,
                    error: format!("{err:#}"),
                });
            }
        }
    }

    if app.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "voyage_id": voyage_id,
                "ships_launched": launched,
                "ship_failures": failures.iter().map(|f| f.index).collect::<Vec<_>>(),
            })
        );
    }

    Ok(if failures.is_empty() {
        Outcome::Clean
    } else {
        Outcome::Partial
    })
}
