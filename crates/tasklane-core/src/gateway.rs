//! Remote task gateway.
//!
//! One HTTP call per operation, bearer token attached when the session has
//! one. Responses are normalized into [`Task`] records; failures become
//! [`TaskError`]s carrying the backend's message when it sent one. The
//! gateway never retries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::auth::{RegistrationForm, validate_login};
use crate::error::{Operation, TaskError, TaskResult};
use crate::session::{Credentials, SessionContext};
use crate::task::{Task, TaskDraft, TaskFields, TaskId};
use crate::wire::{
    CreateBody, CredentialsBody, LoginResponse, RegisterResponse, UpdateBody, error_message,
    extract_task_list, login_error_message, normalize_task,
};

#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn load(&self) -> TaskResult<Vec<Task>>;
    async fn create(&self, draft: &TaskDraft) -> TaskResult<Task>;
    async fn update(&self, id: &TaskId, fields: &TaskFields) -> TaskResult<Task>;
    async fn remove(&self, id: &TaskId) -> TaskResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub username: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub success: bool,
    pub message: Option<String>,
    pub username: String,
}

#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    http: Client,
    session: Arc<dyn SessionContext>,
    tz: Tz,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("tz", &self.tz)
            .field("has_token", &self.session.token().is_some())
            .finish()
    }
}

impl HttpGateway {
    pub fn new(base_url: &str, session: Arc<dyn SessionContext>, tz: Tz) -> TaskResult<Self> {
        let http = Client::builder()
            .user_agent(format!("tasklane/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TaskError::network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(base_url, http, session, tz))
    }

    pub fn with_http_client(
        base_url: &str,
        http: Client,
        session: Arc<dyn SessionContext>,
        tz: Tz,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            session,
            tz,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<dyn SessionContext> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn task_url(&self, id: &TaskId) -> String {
        self.url(&format!("/todos/{id}"))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> TaskResult<Response> {
        self.authorized(builder)
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> TaskResult<SignedIn> {
        validate_login(username, password)?;

        let response = self
            .http
            .post(self.url("/login"))
            .json(&CredentialsBody { username, password })
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "login response");
        let body = read_body(response).await?;

        if !status.is_success() {
            let message = login_error_message(&body)
                .unwrap_or_else(|| format!("Login failed with status {}", status.as_u16()));
            warn!(status = status.as_u16(), "login rejected");
            return Err(TaskError::AuthFailure(message));
        }

        let parsed: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| TaskError::MalformedResponse(format!("login response: {e}")))?;
        let signed_in = SignedIn {
            username: parsed.username.unwrap_or_else(|| username.to_string()),
            token: parsed.token,
        };

        if signed_in.token.is_some() {
            self.session.set(Credentials::new(
                signed_in.username.clone(),
                signed_in.token.clone(),
            ));
        }

        info!(
            username = %signed_in.username,
            has_token = signed_in.token.is_some(),
            "signed in"
        );
        Ok(signed_in)
    }

    #[instrument(skip(self, form), fields(name = %form.name))]
    pub async fn register(&self, form: &RegistrationForm) -> TaskResult<Registered> {
        form.validate()?;

        let response = self
            .http
            .post(self.url("/register"))
            .json(&CredentialsBody {
                username: &form.name,
                password: &form.password,
            })
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;

        let status = response.status();
        let body = read_body(response).await?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| "Registration failed".to_string());
            warn!(status = status.as_u16(), "registration rejected");
            return Err(TaskError::AuthFailure(message));
        }

        let parsed: RegisterResponse = serde_json::from_str(&body)
            .map_err(|e| TaskError::MalformedResponse(format!("register response: {e}")))?;
        if parsed.success {
            self.session.set(Credentials::new(form.name.clone(), None));
        }

        info!(success = parsed.success, "registration finished");
        Ok(Registered {
            success: parsed.success,
            message: parsed.message,
            username: form.name.clone(),
        })
    }

    pub fn logout(&self) {
        self.session.clear();
        info!("signed out");
    }

    fn normalize(&self, value: &Value) -> TaskResult<Task> {
        normalize_task(value, Utc::now(), self.tz)
    }
}

#[async_trait]
impl TaskGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn load(&self) -> TaskResult<Vec<Task>> {
        let response = self.send(self.http.get(self.url("/todos"))).await?;
        let value = decode_json(response, Operation::Load).await?;

        let tasks = extract_task_list(value)?
            .iter()
            .map(|item| self.normalize(item))
            .collect::<TaskResult<Vec<_>>>()?;

        debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    #[instrument(skip(self, draft), fields(title_len = draft.title.len()))]
    async fn create(&self, draft: &TaskDraft) -> TaskResult<Task> {
        let request = self
            .http
            .post(self.url("/todos"))
            .json(&CreateBody::from_draft(draft));
        let response = self.send(request).await?;
        let value = decode_json(response, Operation::Add).await?;

        let task = self.normalize(&value)?;
        debug!(task_id = %task.id, "created task");
        Ok(task)
    }

    #[instrument(skip(self, fields), fields(task_id = %id, completed = fields.completed))]
    async fn update(&self, id: &TaskId, fields: &TaskFields) -> TaskResult<Task> {
        let request = self
            .http
            .put(self.task_url(id))
            .json(&UpdateBody::from_fields(fields));
        let response = self.send(request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(TaskError::NotFound(id.clone()));
        }

        let value = decode_json(response, Operation::Update).await?;
        let task = self.normalize(&value)?;
        debug!(task_id = %task.id, "updated task");
        Ok(task)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn remove(&self, id: &TaskId) -> TaskResult<()> {
        let response = self.send(self.http.delete(self.task_url(id))).await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!(status = status.as_u16(), "deleted task");
            return Ok(());
        }

        let body = read_body(response).await?;
        Err(status_error(status, &body, Operation::Delete))
    }
}

async fn read_body(response: Response) -> TaskResult<String> {
    response
        .text()
        .await
        .map_err(|e| TaskError::network(e.to_string()))
}

async fn decode_json(response: Response, op: Operation) -> TaskResult<Value> {
    let status = response.status();
    let body = read_body(response).await?;

    if !status.is_success() {
        return Err(status_error(status, &body, op));
    }

    serde_json::from_str(&body).map_err(|e| TaskError::MalformedResponse(e.to_string()))
}

fn status_error(status: StatusCode, body: &str, op: Operation) -> TaskError {
    let message = error_message(body).unwrap_or_else(|| op.fallback_message().to_string());
    warn!(status = status.as_u16(), message = %message, "backend rejected request");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TaskError::AuthFailure(message),
        _ => TaskError::status(status.as_u16(), message),
    }
}
