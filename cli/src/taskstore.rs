//! Task store adapter — reads and writes the per-voyage task files that live
//! on the storage VM.
//!
//! One file per task, `<task_id>.json`, under the voyage's task set root.
//! Ships mutate the same files through their mounts, so every write here
//! goes through a temp file and an atomic rename: a concurrent reader sees
//! the old content or the new content, never a torn file.

use anyhow::Result;
use chrono::Utc;

use armada_common::{Task, VoyageDescriptor};

use crate::error::FleetError;
use crate::layout;
use crate::remote::{shell_quote, RemoteExec};

/// Separator line emitted between files by the batch read script.
const FILE_SENTINEL: &str = "===ARMADA-TASK===";

/// Result of enumerating the task set.
///
/// `skipped` describes files that existed but could not be parsed; they are
/// reported, never fatal.
#[derive(Debug, Default)]
pub struct TaskListing {
    pub tasks: Vec<Task>,
    pub skipped: Vec<String>,
}

pub struct TaskStore<'a, R: RemoteExec> {
    remote: &'a R,
    storage: String,
    voyage: &'a VoyageDescriptor,
}

impl<'a, R: RemoteExec> TaskStore<'a, R> {
    pub fn new(remote: &'a R, storage_vm: impl Into<String>, voyage: &'a VoyageDescriptor) -> Self {
        Self {
            remote,
            storage: storage_vm.into(),
            voyage,
        }
    }

    /// Enumerate and parse every task file.
    ///
    /// An empty or absent task directory is the legitimate planning-phase
    /// signal and returns an empty listing. Unparseable files are skipped
    /// and reported in the listing.
    pub async fn list_tasks(&self) -> Result<TaskListing> {
        // One exec round trip for the whole set: emit a sentinel line per
        // file, then its content.
        let root = layout::task_root(self.voyage);
        let script = format!(
            "cd {root} 2>/dev/null || exit 0; \
             for f in *.json; do [ -e \"$f\" ] || exit 0; \
             printf '{FILE_SENTINEL} %s\\n' \"$f\"; cat \"$f\"; printf '\\n'; done",
            root = shell_quote(&root),
        );
        let result = self.remote.run(&self.storage, &script).await?;
        if !result.success() {
            return Err(FleetError::ExecError {
                vm: self.storage.clone(),
                detail: format!("listing tasks: {}", result.detail()),
            }
            .into());
        }

        let mut listing = TaskListing::default();
        for (file, body) in split_batch(&result.stdout) {
            match Task::parse(file, body.as_bytes()) {
                Ok(task) => listing.tasks.push(task),
                Err(err) => listing.skipped.push(err.to_string()),
            }
        }
        listing.tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listing)
    }

    /// Read one task by id.
    pub async fn read_task(&self, task_id: &str) -> Result<Task> {
        let path = layout::task_path(self.voyage, task_id);
        let bytes = self
            .remote
            .get(&self.storage, &path)
            .await?
            .ok_or_else(|| FleetError::NotFound {
                what: format!("task {task_id} in voyage {}", self.voyage.id),
            })?;
        Task::parse(&format!("{task_id}.json"), &bytes).map_err(|e| {
            FleetError::TaskParse {
                detail: e.to_string(),
            }
            .into()
        })
    }

    /// Whole-file replacement with `updated = now`, atomically.
    pub async fn write_task(&self, task: &mut Task) -> Result<()> {
        task.updated = Some(Utc::now());
        self.write_file(task).await
    }

    /// First publication of a plan-authored task: stamps the voyage id and
    /// fills missing timestamps, otherwise preserves the file verbatim.
    pub async fn publish_task(&self, task: &mut Task) -> Result<()> {
        task.metadata.voyage = Some(self.voyage.id.clone());
        let now = Utc::now();
        task.created.get_or_insert(now);
        task.updated.get_or_insert(now);
        self.write_file(task).await
    }

    /// Return a task to the claimable pool, dropping its active claim.
    ///
    /// Unconditional overwrite: no lock is taken across the network
    /// boundary, so correctness rests on the staleness policy. Resetting an
    /// unclaimed pending task does not touch the file, which makes the
    /// operation idempotent.
    pub async fn reset_task(&self, task_id: &str) -> Result<Task> {
        let mut task = self.read_task(task_id).await?;
        let mut cleared = task.clone();
        cleared.reset();
        if cleared == task {
            return Ok(task);
        }
        task.reset();
        self.write_task(&mut task).await?;
        Ok(task)
    }

    async fn write_file(&self, task: &Task) -> Result<()> {
        let path = layout::task_path(self.voyage, &task.id);
        let tmp = format!("{path}.tmp");
        let json = task.to_json().map_err(|e| FleetError::TaskParse {
            detail: format!("serializing task {}: {e}", task.id),
        })?;
        self.remote
            .put(&self.storage, json.as_bytes(), &tmp)
            .await?;
        let rename = self
            .remote
            .run(
                &self.storage,
                &format!("mv -f {} {}", shell_quote(&tmp), shell_quote(&path)),
            )
            .await?;
        if !rename.success() {
            return Err(FleetError::ExecError {
                vm: self.storage.clone(),
                detail: format!("renaming {tmp}: {}", rename.detail()),
            }
            .into());
        }
        Ok(())
    }
}

/// Split the batch-read output into `(file, body)` pairs.
fn split_batch(stdout: &str) -> Vec<(&str, String)> {
    let mut files = Vec::new();
    let mut current: Option<(&str, String)> = None;
    for line in stdout.lines() {
        if let Some(name) = line.strip_prefix(FILE_SENTINEL) {
            if let Some(done) = current.take() {
                files.push(done);
            }
            current = Some((name.trim(), String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    if let Some(done) = current.take() {
        files.push(done);
    }
    files
}
