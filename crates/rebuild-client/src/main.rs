//! Rebuild CLI
//!
//! Commands:
//! - status: Show the current rebuild job
//! - stats: Show library counts and database file info
//! - trigger: Start a rebuild and follow it to completion
//! - watch: Follow a rebuild that is already running

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facedb_common::{RebuildJob, StatsResponse};
use rebuild_client::{AdminClient, PollOutcome, StatusPoller};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rebuildctl")]
#[command(about = "Trigger and watch face database rebuilds")]
struct Cli {
    /// Admin Service base URL
    #[arg(long, global = true, env = "ADMIN_URL", default_value = "http://localhost:5001")]
    url: String,

    /// Poll interval in milliseconds
    #[arg(long, global = true, default_value_t = 1000)]
    interval_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current rebuild job
    Status,

    /// Show library counts and database file info
    Stats,

    /// Start a rebuild
    Trigger {
        /// Return right after the rebuild is accepted
        #[arg(long)]
        no_wait: bool,
    },

    /// Follow a rebuild that is already running
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rebuild_client=warn,rebuildctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let client = AdminClient::new(&cli.url)?;
    let poller = StatusPoller::new(client.clone())
        .with_interval(Duration::from_millis(cli.interval_ms));

    match cli.command {
        Commands::Status => {
            let job = client.rebuild_status().await?;
            print_job(&job);
        }
        Commands::Stats => {
            let stats = client.stats().await?;
            print_stats(&stats);
        }
        Commands::Trigger { no_wait } => trigger(&client, poller, no_wait).await?,
        Commands::Watch => watch(poller).await?,
    }

    Ok(())
}

async fn trigger(client: &AdminClient, poller: StatusPoller, no_wait: bool) -> Result<()> {
    let response = client.trigger_rebuild().await?;

    if !response.success {
        let reason = response
            .error
            .unwrap_or_else(|| "Rebuild rejected".to_string());
        println!("{}", reason);
        if let Some(job) = &response.status {
            print_job(job);
        }
        return Ok(());
    }

    println!(
        "{}",
        response.message.as_deref().unwrap_or("Rebuild started")
    );

    if no_wait {
        return Ok(());
    }

    follow(poller.spawn(print_progress())).await
}

async fn watch(poller: StatusPoller) -> Result<()> {
    match poller.resume_if_running(print_progress()).await? {
        Some(handle) => follow(handle).await,
        None => {
            println!("No rebuild in progress");
            Ok(())
        }
    }
}

async fn follow(handle: rebuild_client::PollHandle) -> Result<()> {
    // Dropping the handle on Ctrl-C stops the poller
    let outcome = tokio::select! {
        outcome = handle.finished() => outcome,
        _ = tokio::signal::ctrl_c() => {
            println!("Stopped watching; the rebuild keeps running on the server");
            return Ok(());
        }
    };

    let outcome = outcome.context("Status poller stopped before the rebuild finished")?;
    report(&outcome)
}

fn report(outcome: &PollOutcome) -> Result<()> {
    println!("{}", outcome.notification());

    if let Some(stats) = &outcome.stats {
        print_stats(stats);
    }

    if !outcome.succeeded() {
        anyhow::bail!("rebuild failed");
    }
    Ok(())
}

/// Prints a line whenever progress or phase changes
fn print_progress() -> impl FnMut(&RebuildJob) + Send + 'static {
    let mut last = None;
    move |job: &RebuildJob| {
        let current = (job.status, job.progress);
        if last != Some(current) && job.status.is_active() {
            println!("[{:>3}%] {}", job.progress, job.message);
        }
        last = Some(current);
    }
}

fn print_job(job: &RebuildJob) {
    println!("Status:       {}", job.status);
    println!("Running:      {}", job.is_running);
    println!("Progress:     {}%", job.progress);
    println!("Message:      {}", job.message);
    if let Some(source) = job.triggered_by {
        println!("Triggered by: {}", source);
    }
    if let Some(started) = job.started_at {
        println!("Started:      {}", started.to_rfc3339());
    }
    if let Some(completed) = job.completed_at {
        println!("Completed:    {}", completed.to_rfc3339());
    }
    if let Some(error) = &job.last_error {
        println!("Last error:   {}", error);
    }
}

fn print_stats(stats: &StatsResponse) {
    println!("Identities:   {}", stats.total_identities);
    println!("Images:       {}", stats.total_images);
    if stats.database.exists {
        println!("Database:     {} bytes", stats.database.size);
        if let Some(modified) = stats.database.modified {
            println!("Updated:      {}", modified.to_rfc3339());
        }
    } else {
        println!("Database:     not built");
    }
}
