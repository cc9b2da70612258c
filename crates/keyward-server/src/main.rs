//! keyward-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `KEYWARD_*` environment variables, opens the SQLite store, and serves the
//! processor trigger and admin API over HTTP. With `schedule_interval_secs`
//! set, the processor also runs on a timer.
//!
//! # Token hash generation
//!
//! To generate the argon2 PHC string for `auth_token_hash` in config.toml:
//!
//! ```text
//! cargo run -p keyward-server -- --hash-token
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use keyward_core::processor::OverdueProcessor;
use keyward_server::{AppState, ServerConfig, auth::AuthConfig, scheduler};
use keyward_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Keyward overdue processor server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a token entered on stdin and exit.
  #[arg(long)]
  hash_token: bool,

  /// Run one overdue check, print the JSON report and exit.
  #[arg(long)]
  run_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_token {
    let token = read_token()?;
    let hash = keyward_server::auth::hash_token(&token)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("KEYWARD")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  let notifier = server_cfg
    .notifier
    .build()
    .context("invalid notifier configuration")?;
  let processor = OverdueProcessor::new(
    store.clone(),
    Arc::new(notifier),
    server_cfg.policy,
    server_cfg.processor,
  )
  .context("invalid lifecycle policy")?;

  let (shutdown_tx, shutdown_rx) = watch::channel(false);

  if cli.run_once {
    let report = processor
      .run(Utc::now(), &shutdown_rx)
      .await
      .context("overdue check failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  if server_cfg.auth_token_hash.is_empty() {
    tracing::warn!("auth_token_hash is not set; every authenticated request will be rejected");
  }

  let state = AppState::new(
    store,
    processor,
    AuthConfig { token_hash: server_cfg.auth_token_hash.clone() },
    shutdown_rx.clone(),
  );

  let schedule = (server_cfg.schedule_interval_secs > 0).then(|| {
    tokio::spawn(scheduler::run_schedule(
      state.clone(),
      Duration::from_secs(server_cfg.schedule_interval_secs),
      shutdown_rx.clone(),
    ))
  });

  let app = keyward_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await
    .context("server error")?;

  if let Some(schedule) = schedule {
    schedule.await.context("scheduler task panicked")?;
  }

  Ok(())
}

/// Resolve on ctrl-c and tell in-flight runs to stop after their current
/// record.
async fn shutdown_signal(tx: watch::Sender<bool>) {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown requested");
  let _ = tx.send(true);
}

/// Read a token from stdin.
fn read_token() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Token: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
