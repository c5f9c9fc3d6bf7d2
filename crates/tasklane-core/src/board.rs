use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::bulk::{BulkCoordinator, BulkReport, Selection};
use crate::datetime::to_local;
use crate::error::{Operation, TaskError, TaskResult};
use crate::gateway::TaskGateway;
use crate::mutation::Mutation;
use crate::stats::Stats;
use crate::store::TaskStore;
use crate::task::{Task, TaskId, TaskPatch};
use crate::view::{self, Category, ViewConfig};

/// One signed-in session's worth of task state: the store, the selection
/// and the list configuration, plus the current error banner.
pub struct TaskBoard<G> {
    store: TaskStore<G>,
    bulk: BulkCoordinator,
    view: Mutex<ViewConfig>,
    last_error: Mutex<Option<String>>,
    tz: Tz,
}

impl<G: TaskGateway> TaskBoard<G> {
    pub fn new(gateway: G, tz: Tz) -> Self {
        Self {
            store: TaskStore::new(gateway),
            bulk: BulkCoordinator::new(),
            view: Mutex::new(ViewConfig::default()),
            last_error: Mutex::new(None),
            tz,
        }
    }

    pub fn with_view(self, config: ViewConfig) -> Self {
        *self.view.lock() = config;
        self
    }

    pub fn store(&self) -> &TaskStore<G> {
        &self.store
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> NaiveDateTime {
        to_local(Utc::now(), self.tz)
    }

    pub fn view_config(&self) -> ViewConfig {
        self.view.lock().clone()
    }

    pub fn update_view(&self, change: impl FnOnce(&mut ViewConfig)) {
        change(&mut self.view.lock());
    }

    pub fn selection(&self) -> Selection {
        self.bulk.selection()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn dismiss_error(&self) {
        *self.last_error.lock() = None;
    }

    pub fn visible(&self) -> Vec<Task> {
        self.visible_at(self.now())
    }

    pub fn visible_at(&self, now: NaiveDateTime) -> Vec<Task> {
        view::derive_view(&self.store.snapshot(), &self.view.lock(), now)
    }

    pub fn stats(&self) -> Stats {
        self.stats_at(self.now())
    }

    pub fn stats_at(&self, now: NaiveDateTime) -> Stats {
        Stats::compute(&self.store.snapshot(), now)
    }

    pub fn all_tags(&self) -> Vec<String> {
        view::all_tags(&self.store.snapshot())
    }

    pub fn category_title(&self) -> &'static str {
        self.view.lock().category.title()
    }

    pub async fn load(&self) -> TaskResult<usize> {
        let result = self.store.load_all().await;
        self.prune_selection();
        self.record(result, Operation::Load)
    }

    pub async fn add(&self, title: &str) -> TaskResult<Option<Task>> {
        let result = self.store.add(title).await;
        if let Ok(Some(task)) = &result {
            let mut view = self.view.lock();
            if view.category == Category::Completed {
                debug!(task_id = %task.id, "showing all tasks so the new one is visible");
                view.category = Category::All;
            }
        }
        self.record(result, Operation::Add)
    }

    pub async fn toggle(&self, id: &TaskId) -> TaskResult<Option<Task>> {
        let mutation = self.store.toggle(id).await;
        if mutation.is_reverted() {
            self.prune_selection();
        }
        self.settle(mutation, Operation::Update)
    }

    pub async fn edit(&self, id: &TaskId, patch: TaskPatch) -> TaskResult<Option<Task>> {
        let result = self.store.edit(id, patch).await;
        self.record(result, Operation::Update)
    }

    pub async fn remove(&self, id: &TaskId) -> TaskResult<()> {
        self.bulk.deselect(id);
        let mutation = self.store.remove(id).await;
        if mutation.is_reverted() {
            self.prune_selection();
        }
        self.settle(mutation, Operation::Delete).map(|_| ())
    }

    /// Only ids present in the collection can be selected.
    pub fn select(&self, id: TaskId, selected: bool) -> bool {
        self.bulk.select(id, selected, &self.store.snapshot())
    }

    pub fn select_all(&self) {
        self.bulk.select_all(&self.visible());
    }

    pub fn clear_selection(&self) {
        self.bulk.clear();
    }

    pub async fn complete_selected(&self) -> BulkReport {
        let report = self.bulk.complete_selected(&self.store).await;
        self.prune_selection();
        self.record_bulk(&report, Operation::Update);
        report
    }

    pub async fn delete_selected(&self, confirm: impl FnOnce(usize) -> bool) -> Option<BulkReport> {
        let report = self.bulk.delete_selected(&self.store, confirm).await?;
        self.prune_selection();
        self.record_bulk(&report, Operation::Delete);
        Some(report)
    }

    /// Forgets everything held for the session. The caller clears the
    /// credentials.
    pub fn logout(&self) {
        self.store.clear();
        self.bulk.clear();
        *self.view.lock() = ViewConfig::default();
        self.dismiss_error();
        info!("board reset");
    }

    fn prune_selection(&self) {
        self.bulk.prune(&self.store.snapshot());
    }

    fn settle(&self, mutation: Mutation, op: Operation) -> TaskResult<Option<Task>> {
        self.record(mutation.into_result(), op)
    }

    fn record<T>(&self, result: TaskResult<T>, op: Operation) -> TaskResult<T> {
        let banner = match &result {
            Ok(_) => None,
            Err(err) => Some(err.user_message(op)),
        };
        *self.last_error.lock() = banner;
        result
    }

    fn record_bulk(&self, report: &BulkReport, op: Operation) {
        let banner = report.first_error().map(|err: &TaskError| err.user_message(op));
        let mut last_error = self.last_error.lock();
        match banner {
            Some(message) => *last_error = Some(message),
            None if report.confirmed() > 0 => *last_error = None,
            None => {}
        }
    }
}
