use std::io::{self, IsTerminal, Write};

use chrono::NaiveDateTime;
use unicode_width::UnicodeWidthStr;

use crate::datetime::format_due;
use crate::stats::Stats;
use crate::task::{Priority, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Colour is used only when enabled and stdout is a terminal.
    pub fn new(color: bool) -> Self {
        Self {
            color: color && io::stdout().is_terminal(),
        }
    }

    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_table(&self, title: &str, tasks: &[Task], now: NaiveDateTime) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_task_table(&mut out, title, tasks, now)
    }

    pub fn write_task_table<W: Write>(
        &self,
        mut out: W,
        title: &str,
        tasks: &[Task],
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        writeln!(out, "{} ({})", self.paint(title, "1"), tasks.len())?;
        if tasks.is_empty() {
            writeln!(out, "No tasks found")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Priority".to_string(),
            "Due".to_string(),
            "Title".to_string(),
            "Tags".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let due = task.due_date.map(format_due).unwrap_or_default();
            let due = if task.is_overdue(now) {
                self.paint(&due, "31")
            } else {
                due
            };

            let done = if task.completed { "x" } else { "" };
            let priority = self.paint(task.priority.as_str(), priority_code(task.priority));
            let title = if task.archived {
                format!("{} [archived]", task.title)
            } else {
                task.title.clone()
            };
            let tags = task
                .tags
                .iter()
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join(" ");

            rows.push(vec![
                self.paint(task.id.as_str(), "33"),
                done.to_string(),
                priority,
                due,
                title,
                tags,
            ]);
        }

        write_table(&mut out, headers, rows)
    }

    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        if !task.description.is_empty() {
            writeln!(out, "description {}", task.description)?;
        }
        writeln!(out, "completed   {}", if task.completed { "yes" } else { "no" })?;
        writeln!(out, "priority    {}", task.priority)?;
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", format_due(due))?;
        }
        if !task.tags.is_empty() {
            writeln!(out, "tags        {}", task.tags.join(", "))?;
        }
        if let Some(created) = task.created_at {
            writeln!(out, "created     {}", created.format("%Y-%m-%d %H:%M"))?;
        }

        Ok(())
    }

    pub fn print_stats(&self, stats: &Stats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_stats(&mut out, stats)
    }

    pub fn write_stats<W: Write>(&self, mut out: W, stats: &Stats) -> anyhow::Result<()> {
        let headers = vec!["Metric".to_string(), "Value".to_string()];
        let overdue = if stats.overdue > 0 {
            self.paint(&stats.overdue.to_string(), "31")
        } else {
            stats.overdue.to_string()
        };
        let rows = vec![
            vec!["Total".to_string(), stats.total.to_string()],
            vec!["Active".to_string(), stats.active.to_string()],
            vec!["Completed".to_string(), stats.completed.to_string()],
            vec!["Overdue".to_string(), overdue],
            vec!["Due today".to_string(), stats.due_today.to_string()],
            vec!["Completion".to_string(), format!("{}%", stats.completion_rate)],
        ];
        write_table(&mut out, headers, rows)
    }

    pub fn print_tags(&self, facets: &[(String, usize)]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if facets.is_empty() {
            writeln!(out, "No tags")?;
            return Ok(());
        }

        let headers = vec!["Tag".to_string(), "Tasks".to_string()];
        let rows = facets
            .iter()
            .map(|(tag, count)| vec![format!("#{tag}"), count.to_string()])
            .collect();
        write_table(&mut out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn priority_code(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "32",
        Priority::Medium => "36",
        Priority::High => "33",
        Priority::Urgent => "31",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    let mut header_line = String::new();
    let mut rule_line = String::new();
    for (header, width) in headers.iter().zip(&widths) {
        header_line.push_str(&pad(header, *width));
        rule_line.push_str(&format!("{:-<width$} ", "", width = *width));
    }
    writeln!(writer, "{}", header_line.trim_end())?;
    writeln!(writer, "{}", rule_line.trim_end())?;

    for row in rows {
        let mut line = String::new();
        for (cell, width) in row.iter().zip(&widths) {
            line.push_str(&pad(cell, *width));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let padding = width.saturating_sub(visible_width(cell));
    format!("{}{} ", cell, " ".repeat(padding))
}

fn visible_width(cell: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(cell).as_str())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
