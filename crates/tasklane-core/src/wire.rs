//! Request bodies and response normalization for the task backend.
//!
//! The backend is loose about shapes: ids may be `id` or `_id`, numbers or
//! strings; old records carry `text` instead of `title`; the task list may
//! be a bare array or wrapped in `{"todos": [...]}`. Everything that enters
//! the store passes through [`normalize_task`] first.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::datetime::{format_wire_due, parse_due_date, parse_timestamp};
use crate::error::{TaskError, TaskResult};
use crate::task::{Priority, Task, TaskDraft, TaskFields, TaskId};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub priority: Priority,
    pub due_date: Option<String>,
    pub tags: &'a [String],
    pub completed: bool,
}

impl<'a> CreateBody<'a> {
    pub fn from_draft(draft: &'a TaskDraft) -> Self {
        Self {
            title: &draft.title,
            description: &draft.description,
            priority: draft.priority,
            due_date: draft.due_date.map(format_wire_due),
            tags: &draft.tags,
            completed: false,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub priority: Priority,
    pub due_date: Option<String>,
    pub tags: &'a [String],
    pub completed: bool,
}

impl<'a> UpdateBody<'a> {
    pub fn from_fields(fields: &'a TaskFields) -> Self {
        Self {
            title: &fields.title,
            description: &fields.description,
            priority: fields.priority,
            due_date: fields.due_date.map(format_wire_due),
            tags: &fields.tags,
            completed: fields.completed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CredentialsBody<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    username: Option<Value>,
}

/// Backend-supplied reason from an error body, when one can be decoded.
pub fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.message.filter(|message| !message.trim().is_empty())
}

/// Login errors sometimes explain themselves under `username` instead of
/// `message`.
pub fn login_error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .filter(|message| !message.trim().is_empty())
        .or_else(|| match parsed.username {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text),
            Some(Value::Array(items)) => items
                .into_iter()
                .find_map(|item| item.as_str().map(str::to_string)),
            _ => None,
        })
}

/// Accepts `[...]` or `{"todos": [...]}`.
pub fn extract_task_list(value: Value) -> TaskResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove("todos") {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(TaskError::MalformedResponse(format!(
                "expected 'todos' to be an array, got {}",
                kind_of(&other)
            ))),
            None => Err(TaskError::MalformedResponse(
                "task list object has no 'todos' field".to_string(),
            )),
        },
        other => Err(TaskError::MalformedResponse(format!(
            "expected a task list, got {}",
            kind_of(&other)
        ))),
    }
}

/// Maps one backend task object onto the canonical record, defaulting
/// whatever is missing. `now` stamps records that arrive without a
/// creation time.
pub fn normalize_task(value: &Value, now: DateTime<Utc>, tz: Tz) -> TaskResult<Task> {
    let Value::Object(object) = value else {
        return Err(TaskError::MalformedResponse(format!(
            "expected a task object, got {}",
            kind_of(value)
        )));
    };

    let id = read_id(object);
    let title = read_string(object, "title")
        .filter(|title| !title.trim().is_empty())
        .or_else(|| read_string(object, "text"))
        .map(|title| title.trim().to_string())
        .unwrap_or_default();

    let priority = match read_string(object, "priority") {
        Some(raw) if !raw.is_empty() => Priority::parse(&raw).unwrap_or_else(|| {
            warn!(task_id = %id, priority = %raw, "unknown priority; using medium");
            Priority::Medium
        }),
        _ => Priority::Medium,
    };

    let tags = match object.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        _ => vec![],
    };

    let due_date = read_string(object, "dueDate")
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| {
            let parsed = parse_due_date(&raw, tz);
            if parsed.is_none() {
                warn!(task_id = %id, due = %raw, "unparseable due date dropped");
            }
            parsed
        });

    let created_at = match read_string(object, "createdAt") {
        Some(raw) => parse_timestamp(&raw, tz),
        None => Some(now),
    };

    let task = Task {
        id,
        title,
        description: read_string(object, "description").unwrap_or_default(),
        completed: read_bool(object, "completed"),
        priority,
        tags,
        due_date,
        archived: read_bool(object, "archived"),
        created_at,
    };
    trace!(task_id = %task.id, "normalized task");
    Ok(task)
}

fn read_id(object: &Map<String, Value>) -> TaskId {
    ["id", "_id"]
        .iter()
        .find_map(|key| match object.get(*key) {
            Some(Value::String(raw)) if !raw.is_empty() => Some(raw.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        })
        .map(TaskId::new)
        .unwrap_or_else(|| TaskId::new(""))
}

fn read_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn read_bool(object: &Map<String, Value>, key: &str) -> bool {
    match object.get(key) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    use super::{
        CreateBody, UpdateBody, error_message, extract_task_list, login_error_message,
        normalize_task,
    };
    use crate::error::TaskError;
    use crate::task::{Priority, TaskDraft, TaskFields};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid now")
    }

    #[test]
    fn defaults_missing_fields() {
        let task = normalize_task(&json!({"id": 7, "title": " Buy milk "}), now(), chrono_tz::UTC)
            .expect("normalize");

        assert_eq!(task.id.as_str(), "7");
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.description, "");
        assert!(!task.completed);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.tags.is_empty());
        assert_eq!(task.due_date, None);
        assert!(!task.archived);
        assert_eq!(task.created_at, Some(now()));
    }

    #[test]
    fn maps_legacy_id_and_title_fields() {
        let task = normalize_task(
            &json!({"_id": "abc", "text": "legacy", "priority": "urgent", "tags": ["a", "", 3, "a"]}),
            now(),
            chrono_tz::UTC,
        )
        .expect("normalize");

        assert_eq!(task.id.as_str(), "abc");
        assert_eq!(task.title, "legacy");
        assert_eq!(task.priority, Priority::Urgent);
        assert_eq!(task.tags, vec!["a".to_string(), "a".to_string()]);
    }

    #[test]
    fn keeps_backend_created_at_and_due_date() {
        let task = normalize_task(
            &json!({
                "id": "1",
                "title": "t",
                "dueDate": "2020-01-01T00:00:00",
                "createdAt": "2025-12-31T23:00:00Z",
                "completed": true
            }),
            now(),
            chrono_tz::UTC,
        )
        .expect("normalize");

        assert!(task.completed);
        assert_eq!(
            task.due_date.map(|due| due.date()),
            NaiveDate::from_ymd_opt(2020, 1, 1)
        );
        assert_eq!(
            task.created_at,
            Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).single()
        );
    }

    #[test]
    fn unparseable_created_at_is_absent() {
        let task = normalize_task(
            &json!({"id": "1", "title": "t", "createdAt": "yesterday"}),
            now(),
            chrono_tz::UTC,
        )
        .expect("normalize");
        assert_eq!(task.created_at, None);
    }

    #[test]
    fn rejects_non_object_tasks() {
        let err = normalize_task(&json!("nope"), now(), chrono_tz::UTC).expect_err("string task");
        assert!(matches!(err, TaskError::MalformedResponse(_)));
    }

    #[test]
    fn task_list_shapes() {
        assert_eq!(
            extract_task_list(json!([{"id": 1}])).expect("bare array").len(),
            1
        );
        assert_eq!(
            extract_task_list(json!({"todos": [{"id": 1}, {"id": 2}]}))
                .expect("wrapped array")
                .len(),
            2
        );
        assert!(matches!(
            extract_task_list(json!({"items": []})),
            Err(TaskError::MalformedResponse(_))
        ));
        assert!(matches!(
            extract_task_list(json!("tasks")),
            Err(TaskError::MalformedResponse(_))
        ));
    }

    #[test]
    fn update_body_sends_midnight_for_date_only_due() {
        let fields = TaskFields {
            title: "t".to_string(),
            description: String::new(),
            priority: Priority::High,
            due_date: NaiveDate::from_ymd_opt(2026, 3, 1)
                .and_then(|date| date.and_hms_opt(0, 0, 0)),
            tags: vec![],
            completed: true,
        };
        let body = serde_json::to_value(UpdateBody::from_fields(&fields)).expect("serialize");
        assert_eq!(
            body,
            json!({
                "title": "t",
                "description": "",
                "priority": "high",
                "dueDate": "2026-03-01T00:00:00",
                "tags": [],
                "completed": true
            })
        );
    }

    #[test]
    fn create_body_forces_incomplete() {
        let draft = TaskDraft::titled("new");
        let body = serde_json::to_value(CreateBody::from_draft(&draft)).expect("serialize");
        assert_eq!(body["completed"], json!(false));
        assert_eq!(body["dueDate"], json!(null));
        assert_eq!(body["priority"], json!("medium"));
    }

    #[test]
    fn error_bodies() {
        assert_eq!(
            error_message(r#"{"message": "Title required"}"#).as_deref(),
            Some("Title required")
        );
        assert_eq!(error_message("<html>"), None);
        assert_eq!(
            login_error_message(r#"{"username": ["No such user"]}"#).as_deref(),
            Some("No such user")
        );
    }
}
