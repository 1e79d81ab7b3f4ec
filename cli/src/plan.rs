//! Plan directory loading and validation.
//!
//! A plan is authored offline: a spec document, a verify script, a voyage
//! configuration, and one JSON file per pre-planned task. Everything wrong
//! with a plan is an input error surfaced before any VM is touched.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

use armada_common::{Task, TaskStatus};

use crate::error::FleetError;

/// `voyage.json` inside a plan directory.
#[derive(Debug, Deserialize)]
pub struct PlanConfig {
    pub recommended_ships: u32,
    pub total_tasks: u32,
    pub max_parallel_width: u32,
    pub repo: String,
    /// Optional; defaults to the first non-empty line of the spec.
    #[serde(default)]
    pub objective: Option<String>,
}

/// A validated plan, loaded into memory.
#[derive(Debug)]
pub struct Plan {
    pub dir: PathBuf,
    pub spec: String,
    pub verify: String,
    pub config: PlanConfig,
    pub tasks: Vec<Task>,
}

impl Plan {
    /// The voyage objective: configured, or lifted from the spec document.
    #[must_use]
    pub fn objective(&self) -> String {
        if let Some(objective) = &self.config.objective {
            return objective.clone();
        }
        self.spec
            .lines()
            .map(|l| l.trim_start_matches('#').trim())
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

fn invalid(detail: impl Into<String>) -> anyhow::Error {
    FleetError::InvalidPlan {
        detail: detail.into(),
    }
    .into()
}

fn read(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| invalid(format!("cannot read {what} at {}: {e}", path.display())))
}

/// Load and validate a plan directory.
///
/// Checks, in order: the directory exists; `spec.md`, `verify.sh`, and
/// `voyage.json` are present and well-formed; every file under `tasks/`
/// parses as a Task, is `pending`, has a unique id, and references only
/// sibling tasks in `blocked_by`. An empty `tasks/` directory is valid (the
/// planning-phase launch).
pub fn load(dir: &Path) -> Result<Plan> {
    if !dir.is_dir() {
        return Err(invalid(format!("{} is not a directory", dir.display())));
    }

    let spec = read(&dir.join("spec.md"), "plan spec")?;
    let verify = read(&dir.join("verify.sh"), "verify script")?;
    if verify.trim().is_empty() {
        return Err(invalid("verify.sh is empty"));
    }

    let config_raw = read(&dir.join("voyage.json"), "voyage config")?;
    let config: PlanConfig = serde_json::from_str(&config_raw)
        .map_err(|e| invalid(format!("voyage.json is malformed: {e}")))?;
    if config.repo.split('/').filter(|s| !s.is_empty()).count() != 2 {
        return Err(invalid(format!(
            "repo must be in owner/name form, got {:?}",
            config.repo
        )));
    }

    let tasks_dir = dir.join("tasks");
    if !tasks_dir.is_dir() {
        return Err(invalid(format!(
            "missing tasks/ directory in {}",
            dir.display()
        )));
    }

    let mut tasks = Vec::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(&tasks_dir)
        .map_err(|e| invalid(format!("cannot read tasks/: {e}")))?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort();

    for path in entries {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes =
            std::fs::read(&path).map_err(|e| invalid(format!("cannot read {file}: {e}")))?;
        let task = Task::parse(&file, &bytes).map_err(|e| {
            anyhow::Error::from(FleetError::TaskParse {
                detail: e.to_string(),
            })
        })?;
        if task.status != TaskStatus::Pending {
            return Err(invalid(format!(
                "task {} must be pending at publish time, found {}",
                task.id,
                task.status.as_str()
            )));
        }
        tasks.push(task);
    }

    // Unique ids, and blocked_by edges that stay inside the plan.
    let ids: std::collections::HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    if ids.len() != tasks.len() {
        return Err(invalid("duplicate task ids in plan"));
    }
    for task in &tasks {
        for blocker in &task.blocked_by {
            if !ids.contains(blocker.as_str()) {
                return Err(invalid(format!(
                    "task {} is blocked by unknown task {blocker}",
                    task.id
                )));
            }
        }
    }

    Ok(Plan {
        dir: dir.to_path_buf(),
        spec,
        verify,
        config,
        tasks,
    })
}
