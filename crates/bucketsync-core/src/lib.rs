pub mod actions;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod drag;
pub mod due;
pub mod engine;
pub mod error;
pub mod notify;
pub mod policy;
pub mod prompt;
pub mod render;
pub mod scheduler;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Context;
use tracing::{
  debug,
  info
};

use crate::actions::Confirmer;
use crate::client::HttpSyncClient;
use crate::engine::Engine;
use crate::prompt::{
  AutoConfirm,
  StdinConfirmer
};
use crate::render::TerminalView;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_args(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting bucketsync"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;
  if let Some(server) = cli.server {
    cfg.server.base_url = server;
  }
  if cli.yes {
    cfg.ui.assume_yes = true;
  }
  debug!(?cfg, "effective config");

  let client = HttpSyncClient::new(
    &cfg.server.base_url,
    cfg.request_timeout()
  )?;
  let view =
    Arc::new(TerminalView::new(&cfg)?);
  let confirmer: Arc<dyn Confirmer> =
    if cfg.ui.assume_yes {
      Arc::new(AutoConfirm(true))
    } else {
      Arc::new(StdinConfirmer)
    };

  let engine = Arc::new(Engine::new(
    Arc::new(client),
    view.clone(),
    view.clone(),
    confirmer
  ));

  let command = cli
    .command
    .unwrap_or(cli::Command::Show);

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(commands::dispatch(
    engine, &view, &cfg, command
  ))?;

  info!("done");
  Ok(())
}
