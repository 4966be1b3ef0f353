//! `courtbook` — command-line client for the courtbook membership server.
//!
//! # Usage
//!
//! ```
//! courtbook --url http://localhost:8700 --user admin --password secret list
//! courtbook --config ~/.config/courtbook/config.toml reconcile
//! courtbook renew 1712345678 --credits 8
//! ```

mod client;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use courtbook_core::{member::MemberView, reconcile::Outcome};
use serde::Deserialize;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "courtbook", about = "Client for the courtbook membership server")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the courtbook server (default: http://localhost:8700).
  #[arg(long, env = "COURTBOOK_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "COURTBOOK_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "COURTBOOK_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List every member with credits and activity.
  List,
  /// Show memberships about to lapse and recently lapsed.
  Alerts,
  /// Debit elapsed scheduled lessons and print the report.
  Reconcile {
    /// Reconcile as of this date instead of today.
    #[arg(long, value_name = "DATE")]
    as_of: Option<NaiveDate>,
  },
  /// Renew a membership: new 30-day window, credits added on top.
  Renew {
    member_id: i64,
    /// Credits to add (default: the member's package quantum).
    #[arg(long)]
    credits: Option<i64>,
    /// End date for the new window (default: 30 days out).
    #[arg(long, value_name = "DATE")]
    until: Option<NaiveDate>,
  },
  /// Add or remove credits; the balance never drops below zero.
  Adjust { member_id: i64, delta: i64 },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8700".to_string()),
    username: args
      .user
      .or_else(|| {
        (!file_cfg.username.is_empty()).then(|| file_cfg.username.clone())
      })
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| {
        (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone())
      })
      .unwrap_or_default(),
  };

  let client = ApiClient::new(api_config)?;

  match args.command {
    Command::List => list(&client).await,
    Command::Alerts => alerts(&client).await,
    Command::Reconcile { as_of } => reconcile(&client, as_of).await,
    Command::Renew { member_id, credits, until } => {
      renew(&client, member_id, credits, until).await
    }
    Command::Adjust { member_id, delta } => {
      adjust(&client, member_id, delta).await
    }
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn list(client: &ApiClient) -> Result<()> {
  let members = client.list_members().await?;
  if members.is_empty() {
    println!("no members on file");
    return Ok(());
  }

  for view in &members {
    println!("{}", member_line(view));
  }
  println!("{} member(s)", members.len());
  Ok(())
}

async fn alerts(client: &ApiClient) -> Result<()> {
  let alerts = client.alerts().await?;

  println!("Expiring soon:");
  if alerts.expiring.is_empty() {
    println!("  (none)");
  }
  for view in &alerts.expiring {
    println!("  {}", member_line(view));
  }

  println!("Recently ended:");
  if alerts.ended.is_empty() {
    println!("  (none)");
  }
  for view in &alerts.ended {
    println!("  {}", member_line(view));
  }
  Ok(())
}

async fn reconcile(client: &ApiClient, as_of: Option<NaiveDate>) -> Result<()> {
  let report = client.reconcile(as_of).await?;

  println!(
    "Reconciled as of {}: {} new ledger entries, {} member(s) debited",
    report.today,
    report.new_entries,
    report.debited_members(),
  );
  if report.ledger_created {
    println!("(attendance ledger table created)");
  }
  if report.unreadable_rows > 0 {
    println!("warning: {} unreadable membership row(s)", report.unreadable_rows);
  }

  for line in &report.members {
    match &line.outcome {
      Outcome::Debited { occurrences, remaining_before, remaining_after } => {
        println!(
          "  {} ({}): debited {} lesson(s), credits {} → {}",
          line.name, line.member_id, occurrences, remaining_before,
          remaining_after,
        );
      }
      Outcome::UpToDate => {
        println!("  {} ({}): up to date", line.name, line.member_id);
      }
      Outcome::Skipped { reason } => {
        println!(
          "  {} ({}): skipped, {}",
          line.name,
          line.member_id,
          reason.describe(),
        );
      }
    }
  }
  Ok(())
}

async fn renew(
  client: &ApiClient,
  member_id: i64,
  credits: Option<i64>,
  until: Option<NaiveDate>,
) -> Result<()> {
  let renewal = client.renew_membership(member_id, credits, until).await?;
  println!(
    "Renewed {member_id}: {} → {}, {} credit(s) remaining",
    renewal.enrollment_start, renewal.enrollment_end,
    renewal.remaining_credits,
  );
  Ok(())
}

async fn adjust(client: &ApiClient, member_id: i64, delta: i64) -> Result<()> {
  let resp = client.adjust_credits(member_id, delta).await?;
  println!("Member {member_id}: {} credit(s) remaining", resp.remaining_credits);
  Ok(())
}

// ─── Formatting ───────────────────────────────────────────────────────────────

fn member_line(view: &MemberView) -> String {
  let member = &view.member;
  let end = member
    .enrollment_end
    .map(|d| d.to_string())
    .unwrap_or_else(|| "-".to_string());
  let state = if view.active { "active" } else { "inactive" };
  format!(
    "{:<12} {:<24} {:>3}/{:<3} until {:<10} {}",
    member.id.to_string(),
    member.name,
    member.remaining_credits,
    member.total_credits,
    end,
    state,
  )
}
