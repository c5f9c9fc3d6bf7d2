use std::cmp::Ordering;
use std::collections::{
  BTreeMap,
  HashSet
};
use std::fmt;
use std::str::FromStr;

use chrono::{
  NaiveDate,
  NaiveDateTime
};
use tracing::trace;

use crate::error::TaskError;
use crate::task::{
  Priority,
  Task
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum Category {
  #[default]
  All,
  Active,
  Completed,
  Overdue,
  Today,
  Week
}

impl Category {
  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Some(Self::All),
      | "active" => Some(Self::Active),
      | "completed" | "done" => {
        Some(Self::Completed)
      }
      | "overdue" => Some(Self::Overdue),
      | "today" => Some(Self::Today),
      | "week" => Some(Self::Week),
      | _ => None
    }
  }

  pub fn as_str(
    self
  ) -> &'static str {
    match self {
      | Self::All => "all",
      | Self::Active => "active",
      | Self::Completed => "completed",
      | Self::Overdue => "overdue",
      | Self::Today => "today",
      | Self::Week => "week"
    }
  }

  pub fn title(
    self
  ) -> &'static str {
    match self {
      | Self::All => "All Tasks",
      | Self::Active => "Active Tasks",
      | Self::Completed => {
        "Completed Tasks"
      }
      | Self::Overdue => "Overdue Tasks",
      | Self::Today => "Due Today",
      | Self::Week => "Due This Week"
    }
  }

  fn matches(
    self,
    task: &Task,
    now: NaiveDateTime
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Active => !task.completed,
      | Self::Completed => {
        task.completed
      }
      | Self::Overdue => {
        task.is_overdue(now)
      }
      | Self::Today => {
        task.is_due_today(now)
      }
      | Self::Week => {
        task.is_due_this_week(now)
      }
    }
  }
}

impl fmt::Display for Category {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Category {
  type Err = TaskError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::parse(s).ok_or_else(|| {
      TaskError::Validation(format!(
        "unknown filter '{s}' (expected \
         all, active, completed, \
         overdue, today or week)"
      ))
    })
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum SortKey {
  DateDesc,
  DateAsc,
  Priority,
  Title,
  #[default]
  Created
}

impl SortKey {
  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "date_desc" => {
        Some(Self::DateDesc)
      }
      | "date_asc" => Some(Self::DateAsc),
      | "priority" => {
        Some(Self::Priority)
      }
      | "title" => Some(Self::Title),
      | "created" => Some(Self::Created),
      | _ => None
    }
  }

  pub fn as_str(
    self
  ) -> &'static str {
    match self {
      | Self::DateDesc => "date_desc",
      | Self::DateAsc => "date_asc",
      | Self::Priority => "priority",
      | Self::Title => "title",
      | Self::Created => "created"
    }
  }
}

impl fmt::Display for SortKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortKey {
  type Err = TaskError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::parse(s).ok_or_else(|| {
      TaskError::Validation(format!(
        "unknown sort '{s}' (expected \
         date_desc, date_asc, priority, \
         title or created)"
      ))
    })
  }
}

#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct DateRange {
  pub start: Option<NaiveDate>,
  pub end:   Option<NaiveDate>
}

/// Transient filter and sort state
/// for the list. Never persisted.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct ViewConfig {
  pub category:      Category,
  pub query:         String,
  pub priority:      Option<Priority>,
  pub tag:           Option<String>,
  pub range:         DateRange,
  pub show_archived: bool,
  pub sort:          SortKey
}

/// Visible tasks for `cfg`, in display
/// order. Pure: the same inputs always
/// give the same output.
pub fn derive_view(
  tasks: &[Task],
  cfg: &ViewConfig,
  now: NaiveDateTime
) -> Vec<Task> {
  let query =
    cfg.query.trim().to_lowercase();

  let mut visible: Vec<Task> = tasks
    .iter()
    .filter(|task| task.is_valid())
    .filter(|task| {
      query.is_empty()
        || task.matches_query(&query)
    })
    .filter(|task| {
      cfg.category.matches(task, now)
    })
    .filter(|task| {
      cfg
        .priority
        .is_none_or(|p| task.priority == p)
    })
    .filter(|task| {
      cfg
        .tag
        .as_deref()
        .is_none_or(|tag| task.has_tag(tag))
    })
    .filter(|task| {
      within_range(task, &cfg.range)
    })
    .filter(|task| {
      cfg.show_archived || !task.archived
    })
    .cloned()
    .collect();

  sort_tasks(&mut visible, cfg.sort);

  trace!(
    total = tasks.len(),
    visible = visible.len(),
    category = %cfg.category,
    sort = %cfg.sort,
    "derived view"
  );
  visible
}

fn within_range(
  task: &Task,
  range: &DateRange
) -> bool {
  if range.start.is_none()
    && range.end.is_none()
  {
    return true;
  }

  let Some(due) = task.due_date else {
    return false;
  };

  if let Some(start) = range.start
    && due.date() < start
  {
    return false;
  }

  if let Some(end) = range.end
    && due.date() > end
  {
    return false;
  }

  true
}

/// Stable sort; undated tasks trail
/// dated ones in both date orders.
pub fn sort_tasks(
  tasks: &mut [Task],
  key: SortKey
) {
  match key {
    | SortKey::DateDesc => {
      tasks.sort_by(|a, b| {
        compare_due(a, b, true)
      });
    }
    | SortKey::DateAsc => {
      tasks.sort_by(|a, b| {
        compare_due(a, b, false)
      });
    }
    | SortKey::Priority => {
      tasks.sort_by(|a, b| {
        b.priority
          .rank()
          .cmp(&a.priority.rank())
      });
    }
    | SortKey::Title => {
      tasks.sort_by_cached_key(|task| {
        task.title.to_lowercase()
      });
    }
    | SortKey::Created => {
      tasks.sort_by(|a, b| {
        created_millis(b)
          .cmp(&created_millis(a))
      });
    }
  }
}

fn compare_due(
  a: &Task,
  b: &Task,
  descending: bool
) -> Ordering {
  match (a.due_date, b.due_date) {
    | (Some(x), Some(y)) => {
      if descending {
        y.cmp(&x)
      } else {
        x.cmp(&y)
      }
    }
    | (Some(_), None) => Ordering::Less,
    | (None, Some(_)) => {
      Ordering::Greater
    }
    | (None, None) => Ordering::Equal
  }
}

fn created_millis(task: &Task) -> i64 {
  task
    .created_at
    .map_or(0, |at| at.timestamp_millis())
}

/// Distinct tags in first-seen order.
pub fn all_tags(
  tasks: &[Task]
) -> Vec<String> {
  let mut seen = HashSet::new();
  tasks
    .iter()
    .flat_map(|task| task.tags.iter())
    .filter(|tag| seen.insert(tag.as_str()))
    .cloned()
    .collect()
}

pub fn tag_facets(
  tasks: &[Task]
) -> Vec<(String, usize)> {
  let mut counts = BTreeMap::new();
  for task in tasks {
    for tag in &task.tags {
      *counts
        .entry(tag.clone())
        .or_insert(0_usize) += 1;
    }
  }
  counts.into_iter().collect()
}
