use chrono::NaiveDateTime;
use serde::Serialize;

use crate::task::Task;

/// Counts over the whole collection, independent of the current view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub overdue: usize,
    pub due_today: usize,
    /// Percentage in `0..=100`, rounded half away from zero.
    pub completion_rate: u8,
}

impl Stats {
    pub fn compute(tasks: &[Task], now: NaiveDateTime) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.completed).count();
        let overdue = tasks.iter().filter(|task| task.is_overdue(now)).count();
        let due_today = tasks.iter().filter(|task| task.is_due_today(now)).count();

        Self {
            total,
            completed,
            active: total - completed,
            overdue,
            due_today,
            completion_rate: completion_rate(completed, total),
        }
    }
}

fn completion_rate(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // (2c*100 + t) / 2t rounds c*100/t to nearest, halves up.
    let rate = (completed * 200 + total) / (total * 2);
    u8::try_from(rate.min(100)).unwrap_or(100)
}
