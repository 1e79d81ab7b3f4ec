//! Task records — one JSON file per task in the voyage's task set.
//!
//! Task files are written by the control plane and by ship agents; fields
//! this version does not know about must survive a read-modify-write cycle,
//! so both [`Task`] and [`TaskMetadata`] carry a flattened catch-all map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
}

impl TaskStatus {
    /// Display string, matching the wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
        }
    }
}

/// Claim and completion bookkeeping written by ship agents.
///
/// All fields are optional: a freshly published task has none of them, and
/// agents from different versions may write fields we do not model.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TaskMetadata {
    /// Ship currently holding the task (`ship-<index>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// When the current claim was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    /// Ship that completed the task. Kept after reset as history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    /// When the task reached `complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Voyage id stamped at publish time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voyage: Option<String>,
    /// Fields written by other (possibly newer) writers, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One task file in the voyage's task set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Stable identifier, unique within the voyage; also the file stem.
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Ids of tasks that must be `complete` before this one is claimable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
    /// Reverse edges of `blocked_by` across the set. Informational.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "TaskMetadata::is_empty")]
    pub metadata: TaskMetadata,
    /// Top-level fields from other writers, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TaskMetadata {
    /// True when no field (known or foreign) is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignee.is_none()
            && self.claimed_at.is_none()
            && self.completed_by.is_none()
            && self.completed_at.is_none()
            && self.voyage.is_none()
            && self.extra.is_empty()
    }
}

/// A task file that could not be understood.
#[derive(Debug, Error)]
pub enum TaskParseError {
    #[error("task file {file} is not valid JSON: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("task file {file} has empty id")]
    EmptyId { file: String },
}

impl Task {
    /// Parse a task from raw file bytes.
    pub fn parse(file: &str, bytes: &[u8]) -> Result<Self, TaskParseError> {
        let task: Self = serde_json::from_slice(bytes).map_err(|source| TaskParseError::Json {
            file: file.to_string(),
            source,
        })?;
        if task.id.trim().is_empty() {
            return Err(TaskParseError::EmptyId {
                file: file.to_string(),
            });
        }
        Ok(task)
    }

    /// Serialize to the canonical on-disk form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Return this task to the claimable pool.
    ///
    /// Clears `status` back to `pending` and drops the active claim.
    /// Completion history (`completed_by`, `completed_at`) is preserved.
    /// Idempotent: resetting an unclaimed pending task changes nothing.
    pub fn reset(&mut self) {
        self.status = TaskStatus::Pending;
        self.metadata.assignee = None;
        self.metadata.claimed_at = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn minimal_json() -> &'static str {
        r#"{"id":"A","title":"first","description":"do the thing","status":"pending"}"#
    }

    #[test]
    fn parse_minimal_task() {
        let task = Task::parse("A.json", minimal_json().as_bytes()).expect("parse");
        assert_eq!(task.id, "A");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.blocked_by.is_empty());
        assert!(task.metadata.is_empty());
        assert!(task.created.is_none());
    }

    #[test]
    fn parse_rejects_empty_id() {
        let err = Task::parse("x.json", br#"{"id":"  "}"#).expect_err("empty id");
        assert!(err.to_string().contains("empty id"));
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = Task::parse("x.json", b"not json at all").expect_err("garbage");
        assert!(err.to_string().contains("x.json"));
    }

    #[test]
    fn status_serde_round_trip() {
        let variants = [
            (TaskStatus::Pending, "\"pending\""),
            (TaskStatus::InProgress, "\"in_progress\""),
            (TaskStatus::Complete, "\"complete\""),
        ];
        for (variant, expected_json) in &variants {
            let json = serde_json::to_string(variant).unwrap();
            assert_eq!(&json, expected_json);
            let back: TaskStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(&back, variant);
        }
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let json = r#"{
            "id": "B",
            "status": "in_progress",
            "priority": 7,
            "metadata": {
                "assignee": "ship-0",
                "claimed_at": "2026-03-01T10:00:00Z",
                "agent_version": "2.1"
            }
        }"#;
        let task = Task::parse("B.json", json.as_bytes()).expect("parse");
        assert_eq!(task.extra.get("priority"), Some(&serde_json::json!(7)));
        assert_eq!(
            task.metadata.extra.get("agent_version"),
            Some(&serde_json::json!("2.1"))
        );

        let out = task.to_json().expect("serialize");
        let back = Task::parse("B.json", out.as_bytes()).expect("reparse");
        assert_eq!(back, task);
    }

    #[test]
    fn full_round_trip_preserves_all_fields() {
        let json = r#"{
            "id": "C",
            "title": "t",
            "description": "d",
            "status": "complete",
            "blocked_by": ["A", "B"],
            "blocks": ["D"],
            "created": "2026-03-01T09:00:00Z",
            "updated": "2026-03-01T11:00:00Z",
            "metadata": {
                "assignee": "ship-1",
                "claimed_at": "2026-03-01T10:00:00Z",
                "completed_by": "ship-1",
                "completed_at": "2026-03-01T11:00:00Z",
                "voyage": "vyg-0011223344"
            }
        }"#;
        let task = Task::parse("C.json", json.as_bytes()).expect("parse");
        let back = Task::parse("C.json", task.to_json().expect("ser").as_bytes()).expect("reparse");
        assert_eq!(back, task);
    }

    #[test]
    fn reset_clears_claim_keeps_history() {
        let json = r#"{
            "id": "D",
            "status": "in_progress",
            "metadata": {
                "assignee": "ship-2",
                "claimed_at": "2026-03-01T10:00:00Z",
                "completed_by": "ship-0",
                "completed_at": "2026-02-28T10:00:00Z"
            }
        }"#;
        let mut task = Task::parse("D.json", json.as_bytes()).expect("parse");
        task.reset();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.metadata.assignee.is_none());
        assert!(task.metadata.claimed_at.is_none());
        assert_eq!(task.metadata.completed_by.as_deref(), Some("ship-0"));
        assert!(task.metadata.completed_at.is_some());
    }

    #[test]
    fn reset_is_idempotent() {
        let mut task = Task::parse("A.json", minimal_json().as_bytes()).expect("parse");
        task.metadata.assignee = Some("ship-3".into());
        task.metadata.claimed_at = Some(Utc::now());
        task.status = TaskStatus::InProgress;

        task.reset();
        let once = task.clone();
        task.reset();
        assert_eq!(task, once);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_status() -> impl Strategy<Value = TaskStatus> {
            prop_oneof![
                Just(TaskStatus::Pending),
                Just(TaskStatus::InProgress),
                Just(TaskStatus::Complete),
            ]
        }

        prop_compose! {
            fn arb_task()(
                id in "[a-z][a-z0-9-]{0,12}",
                title in ".{0,20}",
                status in arb_status(),
                blocked_by in proptest::collection::vec("[a-z]{1,4}", 0..3),
                assignee in proptest::option::of("ship-[0-9]{1,2}"),
                extra_val in proptest::option::of(0u32..1000),
            ) -> Task {
                let mut extra = serde_json::Map::new();
                if let Some(v) = extra_val {
                    extra.insert("foreign_field".into(), serde_json::json!(v));
                }
                Task {
                    id,
                    title,
                    description: String::new(),
                    status,
                    blocked_by,
                    blocks: Vec::new(),
                    created: None,
                    updated: None,
                    metadata: TaskMetadata {
                        assignee,
                        ..TaskMetadata::default()
                    },
                    extra,
                }
            }
        }

        proptest! {
            /// parse(serialize(task)) == task, foreign fields included.
            #[test]
            fn prop_serde_round_trip(task in arb_task()) {
                let json = task.to_json().expect("serialize");
                let back = Task::parse("t.json", json.as_bytes()).expect("parse");
                prop_assert_eq!(back, task);
            }

            /// reset is idempotent: twice equals once.
            #[test]
            fn prop_reset_idempotent(task in arb_task()) {
                let mut once = task.clone();
                once.reset();
                let mut twice = once.clone();
                twice.reset();
                prop_assert_eq!(twice, once);
            }

            /// reset always lands on an unclaimed pending task.
            #[test]
            fn prop_reset_postcondition(task in arb_task()) {
                let mut t = task;
                t.reset();
                prop_assert_eq!(t.status, TaskStatus::Pending);
                prop_assert!(t.metadata.assignee.is_none());
                prop_assert!(t.metadata.claimed_at.is_none());
            }
        }
    }
}
