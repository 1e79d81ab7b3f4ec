//! `armada tasks <voyage_id> [--status=X]` — list the task set.

use anyhow::Result;
use clap::{Args, ValueEnum};

use armada_common::TaskStatus;

use crate::app::AppContext;
use crate::error::Outcome;
use crate::fleet;
use crate::taskstore::TaskStore;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StatusFilter {
    Pending,
    InProgress,
    Complete,
}

impl From<StatusFilter> for TaskStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Pending => Self::Pending,
            StatusFilter::InProgress => Self::InProgress,
            StatusFilter::Complete => Self::Complete,
        }
    }
}

#[derive(Args)]
pub struct TasksArgs {
    /// Voyage whose task set to list
    pub voyage_id: String,

    /// Only show tasks with this status
    #[arg(long, value_enum)]
    pub status: Option<StatusFilter>,
}

/// Run `armada tasks`.
pub async fn run(args: &TasksArgs, app: &AppContext) -> Result<Outcome> {
    let (voyage_id, storage) = fleet::resolve_voyage(&app.provider, Some(&args.voyage_id)).await?;
    let voyage = fleet::load_descriptor(&app.remote, &storage.name, &voyage_id).await?;

    let store = TaskStore::new(&app.remote, storage.name.clone(), &voyage);
    let listing = store.list_tasks().await?;
    for skipped in &listing.skipped {
        app.console.warn(&format!("skipping {skipped}"));
    }

    let wanted: Option<TaskStatus> = args.status.map(Into::into);
    let tasks: Vec<_> = listing
        .tasks
        .iter()
        .filter(|t| wanted.is_none_or(|w| t.status == w))
        .collect();

    if app.is_json() {
        println!("{}", serde_json::json!({ "voyage_id": voyage_id, "tasks": tasks }));
        return Ok(Outcome::Clean);
    }

    if tasks.is_empty() {
        app.console.note("no matching tasks");
        return Ok(Outcome::Clean);
    }

    app.console.section(&format!("tasks for {voyage_id}"));
    for task in tasks {
        let holder = task
            .metadata
            .assignee
            .as_deref()
            .or(task.metadata.completed_by.as_deref())
            .unwrap_or("-");
        app.console.field(
            &task.id,
            format!("{:<12} {:<8} {}", task.status.as_str(), holder, task.title),
        );
    }
    app.console.blank();

    Ok(Outcome::Clean)
}
