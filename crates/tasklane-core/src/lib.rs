pub mod auth;
pub mod board;
pub mod bulk;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod gateway;
pub mod mutation;
pub mod render;
pub mod session;
pub mod stats;
pub mod store;
pub mod task;
pub mod view;
pub mod wire;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tasklane CLI"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;
  debug!(
    base_url = %cfg.base_url,
    timezone = %cfg.timezone,
    files = ?cfg.loaded_files,
    "resolved config"
  );

  let renderer =
    render::Renderer::new(cfg.color);

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(commands::dispatch(
    &cfg,
    &renderer,
    cli.command
  ))?;

  info!("done");
  Ok(())
}
