//! `armada reset-task <voyage_id> (<task_id> | --all-stale)` — return
//! claimed tasks to the pool.

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use armada_common::derive::stale_task_ids;

use crate::app::AppContext;
use crate::error::Outcome;
use crate::fleet;
use crate::taskstore::TaskStore;

#[derive(Args)]
pub struct ResetTaskArgs {
    /// Voyage owning the task
    pub voyage_id: String,

    /// Task to reset
    #[arg(required_unless_present = "all_stale", conflicts_with = "all_stale")]
    pub task_id: Option<String>,

    /// Reset every task whose claim has gone stale
    #[arg(long)]
    pub all_stale: bool,
}

/// Run `armada reset-task`.
///
/// Resetting is an unconditional overwrite; its safety comes from the
/// staleness policy, not from coordination with the (presumed dead) ship.
/// Re-running is a no-op.
pub async fn run(args: &ResetTaskArgs, app: &AppContext) -> Result<Outcome> {
    let (voyage_id, storage) = fleet::resolve_voyage(&app.provider, Some(&args.voyage_id)).await?;
    let voyage = fleet::load_descriptor(&app.remote, &storage.name, &voyage_id).await?;
    let store = TaskStore::new(&app.remote, storage.name.clone(), &voyage);

    if args.all_stale {
        let listing = store.list_tasks().await?;
        let stale = stale_task_ids(&listing.tasks, Utc::now(), app.config.stale_threshold);
        if stale.is_empty() {
            app.console.note("no stale tasks");
        }
        for task_id in &stale {
            store.reset_task(task_id).await?;
            app.console.ok(&format!("reset {task_id}"));
        }
        if app.is_json() {
            println!("{}", serde_json::json!({ "reset": stale }));
        }
        return Ok(Outcome::Clean);
    }

    // required_unless_present guarantees the id is set here.
    if let Some(task_id) = &args.task_id {
        let task = store.reset_task(task_id).await?;
        app.console
            .ok(&format!("reset {} to {}", task.id, task.status.as_str()));
        if app.is_json() {
            println!("{}", serde_json::json!({ "reset": [task.id] }));
        }
    }

    Ok(Outcome::Clean)
}
