//! `armada sink (<voyage_id> [--include-storage] | --all) [--force]` —
//! destroy a fleet's VMs.
//!
//! Idempotent by construction: destroy tolerates absence, so re-running
//! after a partial failure finishes the job and exits clean.

use anyhow::Result;
use clap::Args;

use armada_common::voyage::storage_name;
use armada_common::VOYAGE_PREFIX;

use crate::app::AppContext;
use crate::error::Outcome;
use crate::fleet;
use crate::provider::Provider;

#[derive(Args)]
pub struct SinkArgs {
    /// Voyage to sink
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub voyage_id: Option<String>,

    /// Destroy every voyage's VMs, storage included
    #[arg(long)]
    pub all: bool,

    /// Also destroy this voyage's storage VM
    #[arg(long)]
    pub include_storage: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub force: bool,
}

/// Run `armada sink`.
pub async fn run(args: &SinkArgs, app: &AppContext) -> Result<Outcome> {
    // Collect the target list before prompting so the operator sees what
    // would go away. Discovery is by name alone; no voyage state is needed,
    // which is what makes sinking a half-launched voyage possible.
    let targets: Vec<String> = if args.all {
        app.provider
            .list(&format!("{VOYAGE_PREFIX}-"))
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect()
    } else {
        // required_unless_present guarantees the id is set here.
        let voyage_id = args.voyage_id.as_deref().unwrap_or_default();
        let mut names: Vec<String> = fleet::list_ship_vms(&app.provider, voyage_id)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect();
        if args.include_storage {
            let storage = storage_name(voyage_id);
            if app.provider.get(&storage).await?.is_some() {
                names.push(storage);
            }
        }
        names
    };

    if targets.is_empty() {
        app.console.note("no matching VMs");
        if app.is_json() {
            println!("{}", serde_json::json!({ "destroyed": [] }));
        }
        return Ok(Outcome::Clean);
    }

    // `--force`, `--yes`, or a CI/ARMADA_YES environment all skip the
    // prompt; an interactive operator must confirm.
    if !args.force && !app.non_interactive {
        let prompt = format!("Destroy {} VM(s) ({})?", targets.len(), targets.join(", "));
        if !app.confirm(&prompt, false)? {
            app.console.note("cancelled");
            return Ok(Outcome::Clean);
        }
    }

    for name in &targets {
        app.provider.destroy(name).await?;
        app.console.ok(&format!("destroyed {name}"));
    }

    if app.is_json() {
        println!("{}", serde_json::json!({ "destroyed": targets }));
    }
    Ok(Outcome::Clean)
}
