use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::error::TaskError;
use crate::gateway::TaskGateway;
use crate::mutation::Mutation;
use crate::store::TaskStore;
use crate::task::{Task, TaskId};

/// Ids picked for a bulk action, in the order they were picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<TaskId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[TaskId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.ids.contains(id)
    }

    pub fn insert(&mut self, id: TaskId) {
        if !self.contains(&id) {
            self.ids.push(id);
        }
    }

    pub fn remove(&mut self, id: &TaskId) {
        self.ids.retain(|selected| selected != id);
    }

    pub fn set(&mut self, id: TaskId, selected: bool) {
        if selected {
            self.insert(id);
        } else {
            self.remove(&id);
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drops ids that no longer name a task in `tasks`.
    pub fn retain_present(&mut self, tasks: &[Task]) {
        self.ids
            .retain(|id| tasks.iter().any(|task| &task.id == id));
    }

    fn covers(&self, visible: &[Task]) -> bool {
        self.ids.len() == visible.len() && visible.iter().all(|task| self.contains(&task.id))
    }
}

/// Outcome of one bulk action, one mutation per attempted id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub mutations: Vec<Mutation>,
}

impl BulkReport {
    pub fn attempted(&self) -> usize {
        self.mutations.len()
    }

    pub fn confirmed(&self) -> usize {
        self.mutations.iter().filter(|m| m.is_confirmed()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter().filter(|m| m.is_reverted())
    }

    /// First failure worth showing; vanished tasks are not reported.
    pub fn first_error(&self) -> Option<&TaskError> {
        self.failures()
            .filter_map(Mutation::error)
            .find(|err| !err.is_not_found())
    }
}

/// Sole owner of the selection set. Bulk actions run strictly one id at a
/// time through the store.
#[derive(Debug, Default)]
pub struct BulkCoordinator {
    selection: Mutex<Selection>,
}

impl BulkCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Selection {
        self.selection.lock().clone()
    }

    /// Picks or unpicks `id`. Ids missing from `tasks` are never picked.
    pub fn select(&self, id: TaskId, selected: bool, tasks: &[Task]) -> bool {
        if selected && !tasks.iter().any(|task| task.id == id) {
            debug!(task_id = %id, "ignoring selection of unknown task");
            return false;
        }
        self.selection.lock().set(id, selected);
        true
    }

    pub fn deselect(&self, id: &TaskId) {
        self.selection.lock().remove(id);
    }

    pub fn prune(&self, tasks: &[Task]) {
        self.selection.lock().retain_present(tasks);
    }

    pub fn clear(&self) {
        self.selection.lock().clear();
    }

    /// Selects exactly the visible ids, or clears the selection when it
    /// already holds them all.
    pub fn select_all(&self, visible: &[Task]) {
        let mut selection = self.selection.lock();
        if selection.covers(visible) {
            selection.clear();
        } else {
            selection.ids = visible.iter().map(|task| task.id.clone()).collect();
        }
        debug!(selected = selection.len(), "select all");
    }

    /// Toggles every selected task in turn, then clears the selection
    /// whatever the individual outcomes.
    #[instrument(skip_all)]
    pub async fn complete_selected<G: TaskGateway>(&self, store: &TaskStore<G>) -> BulkReport {
        let ids = self.selection().ids;
        let mut report = BulkReport::default();

        for id in &ids {
            report.mutations.push(store.toggle(id).await);
        }

        self.clear();
        info!(
            attempted = report.attempted(),
            confirmed = report.confirmed(),
            "bulk complete finished"
        );
        report
    }

    /// Removes every selected task in turn once `confirm` agrees. A refusal
    /// leaves both the collection and the selection untouched and yields
    /// `None`.
    #[instrument(skip_all)]
    pub async fn delete_selected<G, F>(&self, store: &TaskStore<G>, confirm: F) -> Option<BulkReport>
    where
        G: TaskGateway,
        F: FnOnce(usize) -> bool,
    {
        let ids = self.selection().ids;
        if !confirm(ids.len()) {
            debug!(selected = ids.len(), "bulk delete declined");
            return None;
        }

        let mut report = BulkReport::default();
        for id in &ids {
            self.deselect(id);
            report.mutations.push(store.remove(id).await);
        }

        self.clear();
        info!(
            attempted = report.attempted(),
            confirmed = report.confirmed(),
            "bulk delete finished"
        );
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::{BulkCoordinator, Selection};
    use crate::task::{Task, TaskId};

    fn tasks(ids: &[&str]) -> Vec<Task> {
        ids.iter().map(|id| Task::new(*id, format!("task {id}"))).collect()
    }

    #[test]
    fn selection_keeps_pick_order_without_duplicates() {
        let mut selection = Selection::new();
        selection.insert(TaskId::from("3"));
        selection.insert(TaskId::from("1"));
        selection.insert(TaskId::from("3"));
        assert_eq!(selection.ids(), &[TaskId::from("3"), TaskId::from("1")]);

        selection.set(TaskId::from("3"), false);
        assert_eq!(selection.ids(), &[TaskId::from("1")]);
    }

    #[test]
    fn retain_present_prunes_missing_ids() {
        let mut selection = Selection::new();
        selection.insert(TaskId::from("1"));
        selection.insert(TaskId::from("2"));
        selection.retain_present(&tasks(&["2", "5"]));
        assert_eq!(selection.ids(), &[TaskId::from("2")]);
    }

    #[test]
    fn select_all_toggles_against_the_visible_rows() {
        let bulk = BulkCoordinator::new();
        let visible = tasks(&["1", "2"]);

        assert!(!bulk.select(TaskId::from("9"), true, &visible));
        assert!(bulk.selection().is_empty());
        assert!(bulk.select(TaskId::from("2"), true, &visible));
        bulk.select_all(&visible);
        assert_eq!(bulk.selection().ids(), &[TaskId::from("1"), TaskId::from("2")]);

        bulk.select_all(&visible);
        assert!(bulk.selection().is_empty());
    }
}
