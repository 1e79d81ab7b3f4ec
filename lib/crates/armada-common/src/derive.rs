//! Status derivation — a pure function from a task set to fleet state.
//!
//! There is no coordinator and no per-ship record anywhere: everything the
//! operator sees about a voyage is derived here from the task files alone.
//! The deriver must therefore cope with partial truth — agents crash
//! mid-claim, clocks skew, foreign writers leave fields we did not expect —
//! and still return a usable answer. Tasks that violate the data-model
//! invariants are reported as faults, never as panics or errors.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::task::{Task, TaskStatus};

/// Derived state of one ship, observed through task metadata.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShipState {
    /// Holds at least one fresh `in_progress` task.
    Working,
    /// Every `in_progress` task it holds has gone stale.
    Stale,
    /// Has completed work and holds nothing in progress.
    Idle,
    /// Observed only through historic or invalid fields.
    Unknown,
}

/// Derived state of the voyage as a whole.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoyageState {
    /// Task set is empty — the plan has not been seeded yet.
    Planning,
    Running,
    /// Pending work exists but every active claim has gone stale.
    Stalled,
    Complete,
}

impl VoyageState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Running => "running",
            Self::Stalled => "stalled",
            Self::Complete => "complete",
        }
    }
}

/// One ship's derived status.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShipStatus {
    pub id: String,
    pub state: ShipState,
    /// Tasks whose `completed_by` equals this ship.
    pub completed_count: usize,
}

/// A task that violates a data-model invariant.
///
/// Faulted tasks are excluded from the voyage-state decision and from
/// staleness counting; their ships surface as [`ShipState::Unknown`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DataFault {
    pub task_id: String,
    pub detail: String,
}

/// Aggregate task counts over the (non-faulted) set.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub complete: usize,
    pub stale: usize,
}

/// Full derived voyage status.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VoyageStatus {
    pub state: VoyageState,
    pub counts: TaskCounts,
    pub ships: Vec<ShipStatus>,
    pub faults: Vec<DataFault>,
}

/// Is this task's claim older than the threshold?
///
/// A `claimed_at` in the future (clock skew between ships) yields a negative
/// age and is never stale.
#[must_use]
pub fn is_stale(task: &Task, now: DateTime<Utc>, threshold: Duration) -> bool {
    task.status == TaskStatus::InProgress
        && task
            .metadata
            .claimed_at
            .is_some_and(|claimed| now.signed_duration_since(claimed) > threshold)
}

/// Claimability predicate used by ship agents: `pending`, and every blocker
/// is `complete`.
#[must_use]
pub fn is_claimable(task: &Task, tasks: &[Task]) -> bool {
    if task.status != TaskStatus::Pending {
        return false;
    }
    task.blocked_by.iter().all(|blocker| {
        tasks
            .iter()
            .any(|t| t.id == *blocker && t.status == TaskStatus::Complete)
    })
}

/// Check one task against the invariants of the task data model.
fn fault_for(task: &Task, ids: &HashSet<&str>) -> Option<String> {
    match task.status {
        TaskStatus::InProgress => {
            if task.metadata.assignee.is_none() || task.metadata.claimed_at.is_none() {
                return Some("in_progress without assignee/claimed_at".to_string());
            }
            if !task.blocked_by.is_empty() {
                let incomplete: Vec<&str> = task
                    .blocked_by
                    .iter()
                    .filter(|b| !ids.contains(b.as_str()))
                    .map(String::as_str)
                    .collect();
                if !incomplete.is_empty() {
                    return Some(format!(
                        "blocked_by references missing tasks: {}",
                        incomplete.join(", ")
                    ));
                }
            }
            None
        }
        TaskStatus::Complete => {
            if task.metadata.completed_by.is_none() || task.metadata.completed_at.is_none() {
                return Some("complete without completed_by/completed_at".to_string());
            }
            None
        }
        TaskStatus::Pending => task
            .blocked_by
            .iter()
            .find(|b| !ids.contains(b.as_str()))
            .map(|missing| format!("blocked_by references missing task: {missing}")),
    }
}

/// Invariant 4: an `in_progress` task whose blockers are not all complete is
/// a data fault, not a race.
fn blocked_in_progress(task: &Task, tasks: &[Task]) -> bool {
    task.status == TaskStatus::InProgress
        && task.blocked_by.iter().any(|blocker| {
            tasks
                .iter()
                .any(|t| t.id == *blocker && t.status != TaskStatus::Complete)
        })
}

/// Derive voyage, ship, and staleness state from a task set.
///
/// Deterministic and side-effect free: depends only on its inputs. Ships are
/// returned sorted by id; every ship id appearing anywhere in the set's
/// metadata appears in the result.
#[must_use]
pub fn derive(tasks: &[Task], now: DateTime<Utc>, stale_threshold: Duration) -> VoyageStatus {
    let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();

    let mut faults = Vec::new();
    let mut sound = Vec::with_capacity(tasks.len());
    for task in tasks {
        let fault = fault_for(task, &ids).or_else(|| {
            blocked_in_progress(task, tasks)
                .then(|| "in_progress while blockers are incomplete".to_string())
        });
        match fault {
            Some(detail) => faults.push(DataFault {
                task_id: task.id.clone(),
                detail,
            }),
            None => sound.push(task),
        }
    }

    let mut counts = TaskCounts {
        total: tasks.len(),
        ..TaskCounts::default()
    };
    for task in &sound {
        match task.status {
            TaskStatus::Pending => counts.pending += 1,
            TaskStatus::InProgress => {
                counts.in_progress += 1;
                if is_stale(task, now, stale_threshold) {
                    counts.stale += 1;
                }
            }
            TaskStatus::Complete => counts.complete += 1,
        }
    }

    // Every ship id observed anywhere in metadata gets an entry, including
    // ships seen only on faulted tasks.
    let mut ships: BTreeMap<String, (bool, bool, usize)> = BTreeMap::new();
    for task in tasks {
        for id in [&task.metadata.assignee, &task.metadata.completed_by]
            .into_iter()
            .flatten()
        {
            ships.entry(id.clone()).or_default();
        }
    }
    for task in &sound {
        if task.status == TaskStatus::InProgress {
            if let Some(assignee) = &task.metadata.assignee {
                let entry = ships.entry(assignee.clone()).or_default();
                if is_stale(task, now, stale_threshold) {
                    entry.1 = true;
                } else {
                    entry.0 = true;
                }
            }
        }
        if let Some(by) = &task.metadata.completed_by {
            ships.entry(by.clone()).or_default().2 += 1;
        }
    }

    let ships = ships
        .into_iter()
        .map(|(id, (fresh, stale, completed_count))| {
            let state = if fresh {
                ShipState::Working
            } else if stale {
                ShipState::Stale
            } else if completed_count > 0 {
                ShipState::Idle
            } else {
                ShipState::Unknown
            };
            ShipStatus {
                id,
                state,
                completed_count,
            }
        })
        .collect();

    let state = if tasks.is_empty() {
        VoyageState::Planning
    } else if faults.is_empty() && counts.complete == counts.total {
        VoyageState::Complete
    } else if counts.pending > 0 && counts.in_progress > 0 && counts.stale == counts.in_progress {
        VoyageState::Stalled
    } else {
        VoyageState::Running
    };

    VoyageStatus {
        state,
        counts,
        ships,
        faults,
    }
}

/// Ids of every stale task in the set. Used by `reset-task --all-stale`.
#[must_use]
pub fn stale_task_ids(tasks: &[Task], now: DateTime<Utc>, threshold: Duration) -> Vec<String> {
    tasks
        .iter()
        .filter(|t| is_stale(t, now, threshold))
        .map(|t| t.id.clone())
        .collect()
}
