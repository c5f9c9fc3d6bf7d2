use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Backend-assigned identifier. Opaque to the client: numeric ids are kept
/// in their decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Urgent => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            TaskError::Validation(format!(
                "unknown priority '{s}' (expected low, medium, high or urgent)"
            ))
        })
    }
}

/// Canonical task record as held by the store.
///
/// `due_date` is a wall-clock time in the configured timezone; a date-only
/// value from the backend lands at midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDateTime>,
    pub archived: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            completed: false,
            priority: Priority::Medium,
            tags: vec![],
            due_date: None,
            archived: false,
            created_at: None,
        }
    }

    /// Records without an id or a title are never displayed.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.title.trim().is_empty()
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }

    pub fn is_due_today(&self, now: NaiveDateTime) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due.date() == now.date())
    }

    pub fn is_due_this_week(&self, now: NaiveDateTime) -> bool {
        let horizon = now + Duration::days(7);
        !self.completed && self.due_date.is_some_and(|due| due >= now && due <= horizon)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// `query` must already be lowercased.
    pub fn matches_query(&self, query: &str) -> bool {
        self.title.to_lowercase().contains(query)
            || self.description.to_lowercase().contains(query)
            || self.tags.iter().any(|tag| tag.to_lowercase().contains(query))
    }

    pub fn fields(&self) -> TaskFields {
        TaskFields {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            due_date: self.due_date,
            tags: self.tags.clone(),
            completed: self.completed,
        }
    }
}

/// Fields sent when creating a task. `completed` is always false on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDateTime>,
    pub tags: Vec<String>,
}

impl TaskDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// The full mutable field set carried by an update.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFields {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDateTime>,
    pub tags: Vec<String>,
    pub completed: bool,
}

/// Partial update. `None` keeps the current value; `due_date: Some(None)`
/// clears the due date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDateTime>>,
    pub tags: Option<Vec<String>>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn merge_into(self, current: TaskFields) -> TaskFields {
        TaskFields {
            title: self.title.unwrap_or(current.title),
            description: self.description.unwrap_or(current.description),
            priority: self.priority.unwrap_or(current.priority),
            due_date: self.due_date.unwrap_or(current.due_date),
            tags: self.tags.unwrap_or(current.tags),
            completed: self.completed.unwrap_or(current.completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Priority, Task, TaskPatch};

    fn at(y: i32, m: u32, d: u32, h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .expect("valid datetime")
    }

    #[test]
    fn patch_keeps_fields_it_does_not_name() {
        let mut task = Task::new("2", "B");
        task.completed = true;
        task.priority = Priority::Urgent;
        task.tags = vec!["home".to_string()];

        let merged = TaskPatch {
            priority: Some(Priority::High),
            ..TaskPatch::default()
        }
        .merge_into(task.fields());

        assert_eq!(merged.title, "B");
        assert!(merged.completed);
        assert_eq!(merged.priority, Priority::High);
        assert_eq!(merged.tags, vec!["home".to_string()]);
    }

    #[test]
    fn patch_can_clear_due_date() {
        let mut task = Task::new("1", "A");
        task.due_date = Some(at(2026, 3, 1, 0));

        let merged = TaskPatch {
            due_date: Some(None),
            ..TaskPatch::default()
        }
        .merge_into(task.fields());

        assert_eq!(merged.due_date, None);
    }

    #[test]
    fn due_predicates_ignore_completed_and_undated() {
        let now = at(2026, 2, 17, 12);
        let mut late = Task::new("1", "late");
        late.due_date = Some(at(2026, 2, 17, 9));
        assert!(late.is_overdue(now));
        assert!(late.is_due_today(now));
        assert!(!late.is_due_this_week(now));

        late.completed = true;
        assert!(!late.is_overdue(now));
        assert!(!late.is_due_today(now));

        let undated = Task::new("2", "undated");
        assert!(!undated.is_overdue(now));
        assert!(!undated.is_due_today(now));
        assert!(!undated.is_due_this_week(now));

        let mut soon = Task::new("3", "soon");
        soon.due_date = Some(at(2026, 2, 24, 12));
        assert!(soon.is_due_this_week(now));
        soon.due_date = Some(at(2026, 2, 24, 13));
        assert!(!soon.is_due_this_week(now));
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!(Priority::parse("URGENT"), Some(Priority::Urgent));
        assert_eq!(Priority::parse(" low "), Some(Priority::Low));
        assert_eq!(Priority::parse("critical"), None);
        assert!("critical".parse::<Priority>().is_err());
    }
}
