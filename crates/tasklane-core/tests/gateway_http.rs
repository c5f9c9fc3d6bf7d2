use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tasklane_core::auth::RegistrationForm;
use tasklane_core::error::TaskError;
use tasklane_core::gateway::{HttpGateway, TaskGateway};
use tasklane_core::session::{Credentials, MemorySession, SessionContext};
use tasklane_core::task::{Priority, Task, TaskDraft, TaskId};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn signed_in() -> Arc<MemorySession> {
    Arc::new(MemorySession::with_credentials(Credentials::new(
        "ada",
        Some("tok-123".to_string()),
    )))
}

fn gateway(server: &MockServer, session: Arc<MemorySession>) -> HttpGateway {
    HttpGateway::new(&server.uri(), session, chrono_tz::UTC).expect("http client")
}

#[tokio::test]
async fn load_sends_the_bearer_token_and_unwraps_todos() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todos"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "todos": [
                {"_id": 7, "text": "legacy", "priority": "bogus"},
                {"id": "8", "title": "Pay rent", "completed": 1, "dueDate": "2026-03-01",
                 "tags": ["home", 3, ""], "createdAt": "2026-02-01T10:00:00Z"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = gateway(&server, signed_in()).load().await.expect("load");

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].id, TaskId::from("7"));
    assert_eq!(tasks[0].title, "legacy");
    assert_eq!(tasks[0].priority, Priority::Medium);
    assert!(tasks[0].created_at.is_some());

    assert!(tasks[1].completed);
    assert_eq!(tasks[1].tags, vec!["home".to_string()]);
    assert_eq!(
        tasks[1].due_date,
        NaiveDate::from_ymd_opt(2026, 3, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
    );
}

#[tokio::test]
async fn requests_go_out_without_a_token_when_none_is_held() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let session = Arc::new(MemorySession::new());
    let tasks = gateway(&server, session).load().await.expect("load");
    assert!(tasks.is_empty());

    let requests = server.received_requests().await.expect("recording on");
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn unexpected_list_shape_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let result = gateway(&server, signed_in()).load().await;
    assert!(matches!(result, Err(TaskError::MalformedResponse(_))));
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = gateway(&server, signed_in()).load().await;
    assert!(matches!(result, Err(TaskError::MalformedResponse(_))));
}

#[tokio::test]
async fn backend_message_is_carried_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "title too long"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(500).set_body_string(""))
        .mount(&server)
        .await;

    let gw = gateway(&server, signed_in());
    assert_eq!(
        gw.create(&TaskDraft::titled("x")).await,
        Err(TaskError::status(422, "title too long"))
    );
    assert_eq!(gw.load().await, Err(TaskError::status(500, "Failed to fetch tasks")));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_failure() {
    // Pooled mock servers keep listening after drop, so free a port by hand.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    };
    let gw = HttpGateway::new(&format!("http://127.0.0.1:{port}"), signed_in(), chrono_tz::UTC)
        .expect("http client");

    match gw.load().await {
        Err(TaskError::NetworkFailure { status: None, message }) => assert!(!message.is_empty()),
        other => panic!("expected a transport failure, got {other:?}"),
    }
    assert!(matches!(
        gw.remove(&TaskId::from("1")).await,
        Err(TaskError::NetworkFailure { status: None, .. })
    ));
}

#[tokio::test]
async fn create_posts_the_full_draft() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/todos"))
        .and(body_json(json!({
            "title": "Write report",
            "description": "",
            "priority": "medium",
            "dueDate": null,
            "tags": [],
            "completed": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 42, "title": "Write report", "completed": false, "priority": "medium"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = gateway(&server, signed_in())
        .create(&TaskDraft::titled("Write report"))
        .await
        .expect("create");
    assert_eq!(created.id, TaskId::from("42"));
}

#[tokio::test]
async fn update_sends_every_field_with_a_full_timestamp() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/todos/9"))
        .and(body_json(json!({
            "title": "B",
            "description": "",
            "priority": "high",
            "dueDate": "2020-01-01T00:00:00",
            "tags": ["ops"],
            "completed": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 9, "title": "B", "completed": true, "priority": "high",
            "dueDate": "2020-01-01T00:00:00", "tags": ["ops"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut task = Task::new("9", "B");
    task.completed = true;
    task.priority = Priority::High;
    task.tags = vec!["ops".to_string()];
    task.due_date = NaiveDate::from_ymd_opt(2020, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));

    let updated = gateway(&server, signed_in())
        .update(&task.id, &task.fields())
        .await
        .expect("update");
    assert_eq!(updated.priority, Priority::High);
    assert_eq!(updated.due_date, task.due_date);
}

#[tokio::test]
async fn missing_task_on_update_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/todos/5"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let task = Task::new("5", "gone");
    let result = gateway(&server, signed_in()).update(&task.id, &task.fields()).await;
    assert_eq!(result, Err(TaskError::NotFound(TaskId::from("5"))));
}

#[tokio::test]
async fn delete_of_a_missing_task_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/todos/5"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/todos/6"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let gw = gateway(&server, signed_in());
    assert_eq!(gw.remove(&TaskId::from("5")).await, Ok(()));
    assert_eq!(gw.remove(&TaskId::from("6")).await, Ok(()));
}

#[tokio::test]
async fn unauthorized_is_an_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})))
        .mount(&server)
        .await;

    let result = gateway(&server, signed_in()).load().await;
    assert_eq!(result, Err(TaskError::AuthFailure("token expired".to_string())));
}

#[tokio::test]
async fn login_stores_the_issued_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"username": "ada", "password": "hunter22"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "username": "ada", "token": "fresh"
        })))
        .mount(&server)
        .await;

    let session = Arc::new(MemorySession::new());
    let gw = gateway(&server, session.clone());
    let signed_in = gw.login("ada", "hunter22").await.expect("login");

    assert_eq!(signed_in.token.as_deref(), Some("fresh"));
    assert_eq!(session.get(), Some(Credentials::new("ada", Some("fresh".to_string()))));

    gw.logout();
    assert_eq!(session.get(), None);
}

#[tokio::test]
async fn rejected_login_explains_itself() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "username": ["Invalid username or password"]
        })))
        .mount(&server)
        .await;

    let session = Arc::new(MemorySession::new());
    let result = gateway(&server, session.clone()).login("ada", "nope").await;

    assert_eq!(
        result,
        Err(TaskError::AuthFailure("Invalid username or password".to_string()))
    );
    assert_eq!(session.get(), None);
}

#[tokio::test]
async fn invalid_registration_never_hits_the_network() {
    let server = MockServer::start().await;
    let form = RegistrationForm {
        name: "Ada".to_string(),
        email: "not-an-email".to_string(),
        password: "secret1".to_string(),
    };

    let result = gateway(&server, Arc::new(MemorySession::new())).register(&form).await;

    assert!(matches!(result, Err(TaskError::Validation(_))));
    let requests = server.received_requests().await.expect("recording on");
    assert!(requests.is_empty());
}

#[tokio::test]
async fn registration_records_the_username() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_json(json!({"username": "Ada", "password": "secret1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true, "message": "Account created"
        })))
        .mount(&server)
        .await;

    let session = Arc::new(MemorySession::new());
    let form = RegistrationForm {
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        password: "secret1".to_string(),
    };
    let registered = gateway(&server, session.clone()).register(&form).await.expect("register");

    assert!(registered.success);
    assert_eq!(registered.message.as_deref(), Some("Account created"));
    assert_eq!(session.get(), Some(Credentials::new("Ada", None)));
}
