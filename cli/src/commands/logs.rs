//! `armada logs <voyage_id> [--ship=S] [--follow] [--grep=P] [--tail=N]`.
//!
//! Logs live on the storage VM under the shared voyage root; filtering runs
//! server-side so only matching lines cross the wire.

use anyhow::Result;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use armada_common::voyage::parse_ship_id;

use crate::app::AppContext;
use crate::error::{FleetError, Outcome};
use crate::fleet;
use crate::layout;
use crate::remote::{shell_quote, RemoteExec};

#[derive(Args)]
pub struct LogsArgs {
    /// Voyage whose logs to read
    pub voyage_id: String,

    /// Only this ship's log (accepts `ship-2` or `2`)
    #[arg(long)]
    pub ship: Option<String>,

    /// Follow log output (like tail -f)
    #[arg(short, long)]
    pub follow: bool,

    /// Only lines matching this pattern (applied on the storage VM)
    #[arg(long)]
    pub grep: Option<String>,

    /// Number of trailing lines per log
    #[arg(long, default_value_t = 100)]
    pub tail: u32,
}

/// Parse `--ship` into an index, accepting `ship-2` and bare `2`.
fn ship_index(arg: &str) -> Option<u32> {
    parse_ship_id(arg).or_else(|| arg.parse().ok())
}

fn build_command(args: &LogsArgs, voyage_id: &str) -> Result<String> {
    let target = match &args.ship {
        Some(ship) => {
            let index = ship_index(ship).ok_or_else(|| FleetError::NotFound {
                what: format!("ship {ship} (expected ship-<index>)"),
            })?;
            shell_quote(&layout::ship_log_path(voyage_id, index))
        }
        None => format!("{}/*.log", layout::logs_dir(voyage_id)),
    };

    let follow_flag = if args.follow { " -F" } else { "" };
    let mut command = format!("tail -n {}{} {}", args.tail, follow_flag, target);
    if let Some(pattern) = &args.grep {
        // --line-buffered keeps follow mode streaming line by line.
        command.push_str(&format!(
            " | grep --line-buffered -h -e {}",
            shell_quote(pattern)
        ));
    }
    Ok(command)
}

/// Run `armada logs`.
pub async fn run(args: &LogsArgs, app: &AppContext) -> Result<Outcome> {
    let (voyage_id, storage) = fleet::resolve_voyage(&app.provider, Some(&args.voyage_id)).await?;
    let command = build_command(args, &voyage_id)?;

    if args.follow {
        // Stream until the operator interrupts; no timeout on this channel.
        let mut child = app.remote.stream(&storage.name, &command)?;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                println!("{line}");
            }
        }
        let _ = child.wait().await;
        return Ok(Outcome::Clean);
    }

    let result = app.remote.run(&storage.name, &command).await?;
    // grep exits 1 on zero matches; missing logs just mean no ship wrote yet.
    if !result.success() && result.stderr.contains("No such file") {
        app.console.note("no ship logs yet");
        return Ok(Outcome::Clean);
    }
    print!("{}", result.stdout);
    Ok(Outcome::Clean)
}
