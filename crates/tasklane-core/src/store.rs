use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{TaskError, TaskResult};
use crate::gateway::TaskGateway;
use crate::mutation::{Mutation, MutationKind};
use crate::task::{Task, TaskDraft, TaskId, TaskPatch};

/// Sole owner of the canonical task collection.
///
/// Methods take `&self` so several operations may be in flight at once.
/// The collection lock is never held across a gateway call; when two calls
/// race on the same id, whichever response lands last wins.
pub struct TaskStore<G> {
    gateway: G,
    tasks: Mutex<Vec<Task>>,
}

impl<G: TaskGateway> TaskStore<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            tasks: Mutex::new(vec![]),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.lock().iter().find(|task| &task.id == id).cloned()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.lock().iter().any(|task| &task.id == id)
    }

    /// Drops the collection, e.g. on logout.
    pub fn clear(&self) {
        self.tasks.lock().clear();
    }

    /// Replaces the collection with the backend's. On failure the
    /// collection is emptied rather than left stale.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> TaskResult<usize> {
        match self.gateway.load().await {
            Ok(tasks) => {
                let tasks = dedupe_by_id(tasks);
                let count = tasks.len();
                *self.tasks.lock() = tasks;
                info!(count, "loaded tasks");
                Ok(count)
            }
            Err(err) => {
                self.tasks.lock().clear();
                warn!(error = %err, "task load failed; collection cleared");
                Err(err)
            }
        }
    }

    /// Creates a task and puts it at the front of the collection. Blank
    /// titles are ignored without contacting the backend.
    #[instrument(skip(self, title))]
    pub async fn add(&self, title: &str) -> TaskResult<Option<Task>> {
        let title = title.trim();
        if title.is_empty() {
            debug!("ignoring blank title");
            return Ok(None);
        }

        let created = self.gateway.create(&TaskDraft::titled(title)).await?;

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| task.id != created.id);
        tasks.insert(0, created.clone());
        info!(task_id = %created.id, "added task");
        Ok(Some(created))
    }

    /// Flips `completed` locally, then confirms with a full-field update.
    /// On failure the collection is resynchronized from the backend.
    #[instrument(skip(self), fields(task_id = %id))]
    pub async fn toggle(&self, id: &TaskId) -> Mutation {
        let optimistic = {
            let mut tasks = self.tasks.lock();
            let Some(task) = tasks.iter_mut().find(|task| &task.id == id) else {
                warn!("toggle requested for unknown task");
                return Mutation::skipped(id.clone(), MutationKind::Toggle);
            };
            task.completed = !task.completed;
            task.clone()
        };

        let fields = optimistic.fields();
        let mutation = Mutation::pending(id.clone(), MutationKind::Toggle, Some(optimistic));

        match self.gateway.update(id, &fields).await {
            Ok(server) => {
                self.replace(id, server.clone());
                debug!(completed = server.completed, "toggle confirmed");
                mutation.confirm(Some(server))
            }
            Err(err) => {
                warn!(error = %err, "toggle failed; resynchronizing");
                let snapshot = self.resync().await;
                mutation.revert(snapshot, err)
            }
        }
    }

    /// Field-level merge of `patch` over the current record, sent as a full
    /// update. Nothing changes locally until the backend answers.
    #[instrument(skip(self, patch), fields(task_id = %id))]
    pub async fn edit(&self, id: &TaskId, patch: TaskPatch) -> TaskResult<Option<Task>> {
        let Some(current) = self.get(id) else {
            warn!("edit requested for unknown task");
            return Ok(None);
        };

        let mut fields = patch.merge_into(current.fields());
        fields.title = fields.title.trim().to_string();
        if fields.title.is_empty() {
            return Err(TaskError::Validation("Task title cannot be empty".to_string()));
        }

        match self.gateway.update(id, &fields).await {
            Ok(server) => {
                self.replace(id, server.clone());
                info!("edited task");
                Ok(Some(server))
            }
            Err(err) if err.is_not_found() => {
                debug!("task vanished on the backend; edit dropped");
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "edit failed; collection untouched");
                Err(err)
            }
        }
    }

    /// Removes the task locally, then on the backend. On failure the
    /// collection is resynchronized from the backend.
    #[instrument(skip(self), fields(task_id = %id))]
    pub async fn remove(&self, id: &TaskId) -> Mutation {
        let removed = {
            let mut tasks = self.tasks.lock();
            match tasks.iter().position(|task| &task.id == id) {
                Some(idx) => tasks.remove(idx),
                None => {
                    warn!("remove requested for unknown task");
                    return Mutation::skipped(id.clone(), MutationKind::Remove);
                }
            }
        };
        debug!(title = %removed.title, "removed locally");

        let mutation = Mutation::pending(id.clone(), MutationKind::Remove, None);
        match self.gateway.remove(id).await {
            Ok(()) => {
                info!("removed task");
                mutation.confirm(None)
            }
            Err(err) => {
                warn!(error = %err, "remove failed; resynchronizing");
                let snapshot = self.resync().await;
                mutation.revert(snapshot, err)
            }
        }
    }

    fn replace(&self, id: &TaskId, server: Task) {
        let mut tasks = self.tasks.lock();
        match tasks.iter().position(|task| &task.id == id) {
            Some(idx) => {
                let server_id = server.id.clone();
                tasks[idx] = server;
                let mut pos = 0;
                tasks.retain(|task| {
                    let keep = pos == idx || task.id != server_id;
                    pos += 1;
                    keep
                });
            }
            None => {
                debug!(task_id = %id, "task left the collection before the response arrived");
            }
        }
    }

    async fn resync(&self) -> Vec<Task> {
        if let Err(err) = self.load_all().await {
            warn!(error = %err, "resynchronization failed");
        }
        self.snapshot()
    }
}

fn dedupe_by_id(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| {
            if task.id.is_empty() || seen.insert(task.id.clone()) {
                true
            } else {
                warn!(task_id = %task.id, "dropping duplicate task from backend");
                false
            }
        })
        .collect()
}
