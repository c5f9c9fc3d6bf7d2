use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::auth::{RegistrationForm, password_strength};
use crate::board::TaskBoard;
use crate::bulk::BulkReport;
use crate::cli::{Command, EditArgs, ListArgs};
use crate::config::Config;
use crate::datetime::{parse_date_bound, parse_due_input};
use crate::error::TaskError;
use crate::gateway::{HttpGateway, TaskGateway};
use crate::render::Renderer;
use crate::session::{FileSession, SessionContext};
use crate::task::{TaskId, TaskPatch};
use crate::view::{DateRange, ViewConfig, tag_facets};

pub const PASSWORD_ENV_VAR: &str = "TASKLANE_PASSWORD";

#[instrument(skip(cfg, renderer, command))]
pub async fn dispatch(cfg: &Config, renderer: &Renderer, command: Command) -> anyhow::Result<()> {
    let session_path = cfg.session_path()?;
    let session: Arc<dyn SessionContext> = Arc::new(
        FileSession::open(&session_path)
            .with_context(|| format!("failed to open session at {}", session_path.display()))?,
    );
    let gateway = HttpGateway::new(&cfg.base_url, session, cfg.timezone)?;

    debug!(base_url = %gateway.base_url(), command = ?command, "dispatching command");

    match command {
        Command::Login { username, password } => cmd_login(&gateway, &username, password).await,
        Command::Register {
            name,
            email,
            password,
        } => cmd_register(&gateway, name, email, password).await,
        Command::Logout => {
            gateway.logout();
            println!("Signed out");
            Ok(())
        }
        command => {
            require_session(&gateway)?;
            let board = TaskBoard::new(gateway, cfg.timezone);
            run_task_command(&board, cfg, renderer, command).await
        }
    }
}

async fn run_task_command<G: TaskGateway>(
    board: &TaskBoard<G>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::List(args) => cmd_list(board, cfg, renderer, args).await,
        Command::Add { title } => cmd_add(board, &title.join(" ")).await,
        Command::Show { id } => cmd_show(board, renderer, &id).await,
        Command::Done { ids } => cmd_done(board, &ids).await,
        Command::Edit(args) => cmd_edit(board, args).await,
        Command::Delete { ids, yes } => cmd_delete(board, &ids, yes).await,
        Command::Stats { json } => cmd_stats(board, renderer, json).await,
        Command::Tags => cmd_tags(board, renderer).await,
        Command::Login { .. } | Command::Register { .. } | Command::Logout => {
            Err(anyhow!("session commands are handled before loading tasks"))
        }
    }
}

fn require_session(gateway: &HttpGateway) -> anyhow::Result<()> {
    if gateway.session().get().is_none() {
        return Err(anyhow!("not signed in; run `tasklane login <username>` first"));
    }
    if gateway.session().token().is_none() {
        warn!("session has no token; requests will be sent unauthenticated");
    }
    Ok(())
}

#[instrument(skip(gateway, password))]
async fn cmd_login(gateway: &HttpGateway, username: &str, password: Option<String>) -> anyhow::Result<()> {
    let password = resolve_password(password)?;
    let signed_in = gateway.login(username, &password).await?;

    if signed_in.token.is_some() {
        println!("Signed in as {}", signed_in.username);
    } else {
        println!(
            "Signed in as {} (no token issued; session not saved)",
            signed_in.username
        );
    }
    Ok(())
}

#[instrument(skip(gateway, email, password))]
async fn cmd_register(
    gateway: &HttpGateway,
    name: String,
    email: String,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = resolve_password(password)?;
    let strength = password_strength(&password);
    if strength.is_valid() {
        eprintln!("{}", strength.message());
    }

    let form = RegistrationForm {
        name,
        email,
        password,
    };
    let registered = gateway.register(&form).await?;

    match (registered.success, registered.message) {
        (true, Some(message)) => println!("{message}"),
        (true, None) => println!("Registered {}", registered.username),
        (false, message) => {
            return Err(anyhow!(
                message.unwrap_or_else(|| "Registration failed".to_string())
            ));
        }
    }
    Ok(())
}

fn resolve_password(flag: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = flag {
        return Ok(password);
    }
    if let Ok(password) = std::env::var(PASSWORD_ENV_VAR) {
        debug!("using password from environment");
        return Ok(password);
    }
    prompt("Password: ")
}

fn prompt(question: &str) -> anyhow::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{question}")?;
    stderr.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn load<G: TaskGateway>(board: &TaskBoard<G>) -> anyhow::Result<()> {
    board.load().await.map_err(|err| surfaced(board, err))?;
    Ok(())
}

/// The board's banner for `err`, with the detail kept in the log.
fn surfaced<G: TaskGateway>(board: &TaskBoard<G>, err: TaskError) -> anyhow::Error {
    debug!(error = %err, "operation failed");
    anyhow!(board.last_error().unwrap_or_else(|| err.to_string()))
}

fn known_id<G: TaskGateway>(board: &TaskBoard<G>, raw: &str) -> anyhow::Result<TaskId> {
    let id = TaskId::from(raw.trim());
    if !board.store().contains(&id) {
        return Err(anyhow!("no task with id {id}"));
    }
    Ok(id)
}

#[instrument(skip(board, cfg, renderer, args))]
async fn cmd_list<G: TaskGateway>(
    board: &TaskBoard<G>,
    cfg: &Config,
    renderer: &Renderer,
    args: ListArgs,
) -> anyhow::Result<()> {
    let range = DateRange {
        start: args.from.as_deref().map(parse_date_bound).transpose()?,
        end: args.to.as_deref().map(parse_date_bound).transpose()?,
    };
    let view = ViewConfig {
        category: args.filter,
        query: args.search.unwrap_or_default(),
        priority: args.priority,
        tag: args.tag,
        range,
        show_archived: args.archived,
        sort: args.sort.unwrap_or(cfg.sort),
    };
    board.update_view(|current| *current = view);

    load(board).await?;
    let now = board.now();
    renderer.print_task_table(board.category_title(), &board.visible_at(now), now)
}

#[instrument(skip(board, title))]
async fn cmd_add<G: TaskGateway>(board: &TaskBoard<G>, title: &str) -> anyhow::Result<()> {
    match board.add(title).await.map_err(|err| surfaced(board, err))? {
        Some(task) => {
            info!(task_id = %task.id, "command add");
            println!("Created task {}: {}", task.id, task.title);
            Ok(())
        }
        None => Err(anyhow!("Task title cannot be empty")),
    }
}

async fn cmd_show<G: TaskGateway>(board: &TaskBoard<G>, renderer: &Renderer, id: &str) -> anyhow::Result<()> {
    load(board).await?;
    let id = known_id(board, id)?;
    let task = board
        .store()
        .get(&id)
        .ok_or_else(|| anyhow!("no task with id {id}"))?;
    renderer.print_task_info(&task)
}

#[instrument(skip(board))]
async fn cmd_done<G: TaskGateway>(board: &TaskBoard<G>, ids: &[String]) -> anyhow::Result<()> {
    load(board).await?;
    for raw in ids {
        board.select(known_id(board, raw)?, true);
    }

    let report = board.complete_selected().await;
    for mutation in &report.mutations {
        if let Some(task) = board.store().get(mutation.id()).filter(|_| mutation.is_confirmed()) {
            let state = if task.completed { "completed" } else { "reopened" };
            println!("Task {} {state}", task.id);
        }
    }
    finish_bulk(board, &report)
}

#[instrument(skip(board, args), fields(task_id = %args.id))]
async fn cmd_edit<G: TaskGateway>(board: &TaskBoard<G>, args: EditArgs) -> anyhow::Result<()> {
    let patch = TaskPatch {
        title: args.title,
        description: args.description,
        priority: args.priority,
        due_date: if args.clear_due {
            Some(None)
        } else {
            args.due.as_deref().map(parse_due_input).transpose()?.map(Some)
        },
        tags: if args.clear_tags {
            Some(vec![])
        } else if args.tags.is_empty() {
            None
        } else {
            Some(args.tags)
        },
        completed: None,
    };
    if patch.is_empty() {
        return Err(anyhow!("nothing to change; pass at least one field flag"));
    }

    load(board).await?;
    let id = known_id(board, &args.id)?;
    match board.edit(&id, patch).await.map_err(|err| surfaced(board, err))? {
        Some(task) => println!("Updated task {}: {}", task.id, task.title),
        None => println!("Task {id} no longer exists"),
    }
    Ok(())
}

#[instrument(skip(board))]
async fn cmd_delete<G: TaskGateway>(board: &TaskBoard<G>, ids: &[String], yes: bool) -> anyhow::Result<()> {
    load(board).await?;
    for raw in ids {
        board.select(known_id(board, raw)?, true);
    }

    let confirm = |count: usize| {
        yes || prompt(&format!("Delete {count} tasks? [y/N] "))
            .map(|answer| matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    };

    match board.delete_selected(confirm).await {
        Some(report) => {
            println!("Deleted {} of {} tasks", report.confirmed(), report.attempted());
            finish_bulk(board, &report)
        }
        None => {
            println!("Nothing deleted");
            Ok(())
        }
    }
}

fn finish_bulk<G: TaskGateway>(board: &TaskBoard<G>, report: &BulkReport) -> anyhow::Result<()> {
    match report.first_error() {
        Some(err) => Err(surfaced(board, err.clone())),
        None => Ok(()),
    }
}

async fn cmd_stats<G: TaskGateway>(board: &TaskBoard<G>, renderer: &Renderer, json: bool) -> anyhow::Result<()> {
    load(board).await?;
    let stats = board.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    renderer.print_stats(&stats)
}

async fn cmd_tags<G: TaskGateway>(board: &TaskBoard<G>, renderer: &Renderer) -> anyhow::Result<()> {
    load(board).await?;
    renderer.print_tags(&tag_facets(&board.store().snapshot()))
}
