//! `armada shell <voyage_id> <ship>` — interactive shell on a ship VM.

use anyhow::Result;
use clap::Args;

use armada_common::voyage::parse_ship_id;

use crate::app::AppContext;
use crate::error::{FleetError, Outcome};
use crate::provider::Provider;
use crate::remote::RemoteExec;

#[derive(Args)]
pub struct ShellArgs {
    /// Voyage the ship belongs to
    pub voyage_id: String,

    /// Ship to connect to (accepts `ship-2` or `2`)
    pub ship: String,
}

/// Run `armada shell`.
pub async fn run(args: &ShellArgs, app: &AppContext) -> Result<Outcome> {
    let index = parse_ship_id(&args.ship)
        .or_else(|| args.ship.parse().ok())
        .ok_or_else(|| FleetError::NotFound {
            what: format!("ship {} (expected ship-<index>)", args.ship),
        })?;
    let vm_name = format!("{}-ship-{index}", args.voyage_id);

    if app.provider.get(&vm_name).await?.is_none() {
        return Err(FleetError::NotFound {
            what: format!("ship VM {vm_name}"),
        }
        .into());
    }

    app.console.note(&format!("connecting to {vm_name}"));
    let _status = app.remote.interactive(&vm_name).await?;
    Ok(Outcome::Clean)
}
