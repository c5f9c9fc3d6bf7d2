use tracing::warn;

use crate::error::{TaskError, TaskResult};
use crate::task::{Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Toggle,
    Remove,
}

/// Lifecycle of one optimistic change:
/// `Pending -> Confirmed | Reverted`, or `Skipped` when the id was unknown.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState {
    /// Applied locally, awaiting the backend. Holds the optimistic record
    /// (`None` for a removal).
    Pending(Option<Task>),
    /// The backend accepted it. Holds the server's record (`None` for a
    /// removal).
    Confirmed(Option<Task>),
    /// The backend call failed and the collection was reloaded. Holds the
    /// collection after the reload, which may be empty.
    Reverted {
        snapshot: Vec<Task>,
        error: TaskError,
    },
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    id: TaskId,
    kind: MutationKind,
    state: MutationState,
}

impl Mutation {
    pub(crate) fn pending(id: TaskId, kind: MutationKind, optimistic: Option<Task>) -> Self {
        Self {
            id,
            kind,
            state: MutationState::Pending(optimistic),
        }
    }

    pub(crate) fn skipped(id: TaskId, kind: MutationKind) -> Self {
        Self {
            id,
            kind,
            state: MutationState::Skipped,
        }
    }

    pub(crate) fn confirm(self, server: Option<Task>) -> Self {
        self.settle(MutationState::Confirmed(server))
    }

    pub(crate) fn revert(self, snapshot: Vec<Task>, error: TaskError) -> Self {
        self.settle(MutationState::Reverted { snapshot, error })
    }

    fn settle(mut self, next: MutationState) -> Self {
        if !matches!(self.state, MutationState::Pending(_)) {
            warn!(task_id = %self.id, state = ?self.state, "mutation already settled");
            return self;
        }
        self.state = next;
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn state(&self) -> &MutationState {
        &self.state
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.state, MutationState::Confirmed(_))
    }

    pub fn is_reverted(&self) -> bool {
        matches!(self.state, MutationState::Reverted { .. })
    }

    pub fn error(&self) -> Option<&TaskError> {
        match &self.state {
            MutationState::Reverted { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Failures surface as `Err`, except a vanished task which is a silent
    /// no-op.
    pub fn into_result(self) -> TaskResult<Option<Task>> {
        match self.state {
            MutationState::Confirmed(task) | MutationState::Pending(task) => Ok(task),
            MutationState::Skipped => Ok(None),
            MutationState::Reverted { error, .. } if error.is_not_found() => Ok(None),
            MutationState::Reverted { error, .. } => Err(error),
        }
    }
}
