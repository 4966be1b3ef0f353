//! courtbook-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens an
//! in-process SQLite store and serves the JSON API over HTTP.
//!
//! # First run
//!
//! ```text
//! courtbook-server --init                  # create the record tables
//! courtbook-server --init-admin yonetici   # add an admin, password on stdin
//! courtbook-server                         # serve
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, bail};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use courtbook_api::AppState;
use courtbook_core::{
  admin::{self, Admin},
  calendar::DayNames,
  codec,
  store::RecordStore,
};
use courtbook_store_sqlite::SqliteStore;
use rand_core::OsRng;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`. Every
/// field has a default so a bare first run works without a config file.
#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
  #[serde(default = "defaults::host")]
  host:       String,
  #[serde(default = "defaults::port")]
  port:       u16,
  #[serde(default = "defaults::store_path")]
  store_path: PathBuf,
  /// Locale tag for the stored weekday labels: `turkish` or `english`.
  /// Must match the locale the data was written with.
  #[serde(default = "defaults::day_names")]
  day_names:  String,
}

mod defaults {
  use std::path::PathBuf;

  pub fn host() -> String {
    "127.0.0.1".to_string()
  }

  pub fn port() -> u16 {
    8700
  }

  pub fn store_path() -> PathBuf {
    PathBuf::from("courtbook.db")
  }

  pub fn day_names() -> String {
    "turkish".to_string()
  }
}

// ─── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Courtbook membership server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create the record tables and exit.
  #[arg(long)]
  init: bool,

  /// Add an administrator with this username (password read from stdin)
  /// and exit.
  #[arg(long, value_name = "USERNAME")]
  init_admin: Option<String>,
}

// ─── Main ─────────────────────────────────────────────────────────────────────

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

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("COURTBOOK"))
    .build()
    .context("failed to read config file")?;
  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let day_names = DayNames::for_locale(&server_cfg.day_names)
    .with_context(|| {
      format!("unknown day_names locale {:?}", server_cfg.day_names)
    })?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Helper mode: create the tables and exit.
  if cli.init {
    init_tables(&store).await?;
    tracing::info!("record tables ready at {store_path:?}");
    return Ok(());
  }

  // Helper mode: seed an administrator and exit.
  if let Some(username) = cli.init_admin {
    init_tables(&store).await?;
    seed_admin(&store, &username).await?;
    tracing::info!(admin = %username, "administrator added");
    return Ok(());
  }

  let state = AppState { store: Arc::new(store), day_names };
  let app =
    courtbook_api::api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Create the three record tables. Existing tables are left untouched.
async fn init_tables(store: &SqliteStore) -> anyhow::Result<()> {
  store
    .create_table(codec::MEMBERS_TABLE, &codec::MEMBER_COLUMNS)
    .await
    .context("failed to create the membership table")?;
  store
    .create_table(codec::ADMINS_TABLE, &codec::ADMIN_COLUMNS)
    .await
    .context("failed to create the administrator table")?;
  store
    .create_table(codec::LEDGER_TABLE, &codec::LEDGER_COLUMNS)
    .await
    .context("failed to create the attendance ledger table")?;
  Ok(())
}

/// Prompt for a password on stdin and store `username` with its argon2
/// hash. Refuses blank passwords and existing usernames.
async fn seed_admin(store: &SqliteStore, username: &str) -> anyhow::Result<()> {
  let username = username.trim();
  if username.is_empty() {
    bail!("admin username must not be blank");
  }
  if admin::find_admin(store, username).await?.is_some() {
    bail!("admin {username:?} already exists");
  }

  let password = prompt_password()?;
  if password.is_empty() {
    bail!("password must not be empty");
  }

  let salt = SaltString::generate(&mut OsRng);
  let password_hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
    .to_string();

  let account = Admin { username: username.to_string(), password_hash };
  admin::add_admin(store, &account).await?;
  Ok(())
}

/// Read a password from stdin.
fn prompt_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(line.trim_end_matches('\n').trim_end_matches('\r').to_string())
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
