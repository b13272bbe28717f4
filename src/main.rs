// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava-Sync command line
//!
//! Runs one incremental sync of the configured Strava account into
//! Firestore, then exits. Meant to be invoked by an external scheduler.
//!
//! ```bash
//! # Seed the session from an authorization code obtained out of band
//! strava-sync provision --code abc123
//!
//! # Or replace a revoked session with a new refresh token
//! strava-sync provision --refresh-token def456
//!
//! # Sync (the default command)
//! strava-sync
//!
//! # Inspect what has been stored
//! strava-sync list --start 2024-01-01T00:00:00Z
//! ```

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use std::sync::Arc;
use strava_sync::{
    config::Config,
    db::{ActivityFilter, FirestoreDb, Store},
    models::Credential,
    services::{SessionManager, StravaClient},
    time_utils::parse_utc_rfc3339,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "strava-sync",
    version,
    about = "Mirror Strava activities and laps into Firestore"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json, env = "LOG_FORMAT", global = true)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch new activities and laps and store them (default)
    Sync,

    /// Store a new session, replacing any existing one
    Provision {
        /// Authorization code from the Strava consent redirect
        #[arg(
            long,
            required_unless_present = "refresh_token",
            conflicts_with = "refresh_token"
        )]
        code: Option<String>,

        /// Refresh token obtained out of band; it is redeemed once to check it
        #[arg(long)]
        refresh_token: Option<String>,
    },

    /// Print the authenticated athlete's profile
    Athlete,

    /// Print stored activities as JSON lines, newest first
    List {
        /// 1-based page number
        #[arg(long, default_value_t = 1, conflicts_with_all = ["start", "end"])]
        page: u32,

        #[arg(long, default_value_t = 50)]
        per_page: u32,

        /// Only activities starting at or after this time (RFC3339)
        #[arg(long, value_parser = parse_time)]
        start: Option<DateTime<Utc>>,

        /// Only activities starting before this time (RFC3339)
        #[arg(long, value_parser = parse_time)]
        end: Option<DateTime<Utc>>,

        /// Include stored laps with each activity
        #[arg(long)]
        laps: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match run(cli.command.unwrap_or(Command::Sync)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "strava-sync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .context("Failed to connect to Firestore")?;
    let store: Arc<dyn Store> = Arc::new(db);

    match command {
        Command::Sync => sync(&config, store).await,
        Command::Provision {
            code,
            refresh_token,
        } => provision(&config, store, code, refresh_token).await,
        Command::Athlete => athlete(&config, store).await,
        Command::List {
            page,
            per_page,
            start,
            end,
            laps,
        } => list(store, page, per_page, ActivityFilter { start, end }, laps).await,
    }
}

async fn sync(config: &Config, store: Arc<dyn Store>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, config);

    let mut engine = strava_sync::build_engine(config, store).await?;
    let report = engine.run(&cancel).await?;

    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

async fn provision(
    config: &Config,
    store: Arc<dyn Store>,
    code: Option<String>,
    refresh_token: Option<String>,
) -> anyhow::Result<()> {
    let client = StravaClient::from_config(config)?;
    let credential = match (code, refresh_token) {
        (Some(code), _) => {
            client
                .exchange_code(&config.strava_client_id, &config.strava_client_secret, &code)
                .await?
        }
        (None, Some(refresh_token)) => {
            let seed = Credential::from_refresh_token(
                &config.strava_client_id,
                &config.strava_client_secret,
                refresh_token,
            );
            client.refresh_token(&seed).await?
        }
        (None, None) => anyhow::bail!("provision needs --code or --refresh-token"),
    };

    SessionManager::provision(client, store, credential).await?;
    Ok(())
}

async fn athlete(config: &Config, store: Arc<dyn Store>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, config);

    let client = StravaClient::from_config(config)?;
    let mut session =
        SessionManager::load(client.clone(), store, strava_sync::seed_credential(config)).await?;
    let athlete = client.get_athlete(&mut session, &cancel).await?;

    println!("{}", serde_json::to_string_pretty(&athlete)?);
    Ok(())
}

async fn list(
    store: Arc<dyn Store>,
    page: u32,
    per_page: u32,
    filter: ActivityFilter,
    with_laps: bool,
) -> anyhow::Result<()> {
    let mut activities = if filter == ActivityFilter::default() {
        store.load_page(page, per_page).await?
    } else {
        store.load_filtered(filter).await?
    };

    for activity in &mut activities {
        if with_laps {
            activity.laps = store.load_laps(activity.id).await?;
        }
        println!("{}", serde_json::to_string(&*activity)?);
    }
    Ok(())
}

/// Cancel on Ctrl-C, and on the configured deadline if there is one.
fn spawn_cancel_triggers(cancel: &CancellationToken, config: &Config) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    if let Some(timeout) = config.sync_timeout {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::warn!(timeout_secs = timeout.as_secs(), "Deadline reached, cancelling");
            on_deadline.cancel();
        });
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    parse_utc_rfc3339(s).ok_or_else(|| format!("not an RFC3339 timestamp: {}", s))
}

/// Initialize structured logging: JSON for Cloud Logging, or human-readable.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("strava_sync=debug,info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
