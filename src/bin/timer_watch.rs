//! Timer Watch - terminal observer for a session-timer
//!
//! Follows a server over HTTP, or a mirrored state file on GitHub Pages, and
//! redraws the countdown locally between fetches.

use std::io::Write;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use session_timer::{
    client::{run_observer, ClientReconciler, ConnectionStatus, Visibility},
    config::parse_minutes,
    state::{Action, TimerCommand, TimerRecord, TimerSnapshot},
    sync::{GithubConfig, GithubStore, HttpTimerClient, RemoteState, RetryPolicy, StateSource},
    utils::notify_on_shutdown,
};

#[derive(Parser)]
#[command(name = "timer-watch")]
#[command(about = "Watch a shared session timer from the terminal")]
#[command(version)]
struct Args {
    /// Base URL of a session-timer server
    #[arg(long, env = "TIMER_SERVER", conflicts_with = "github_owner")]
    server: Option<String>,

    /// GitHub owner of the mirrored state file
    #[arg(long, requires = "github_repo")]
    github_owner: Option<String>,

    /// GitHub repository of the mirrored state file
    #[arg(long, requires = "github_owner")]
    github_repo: Option<String>,

    #[arg(long, default_value = "timer-state.json")]
    github_path: String,

    /// Override the Pages base URL for the mirrored file
    #[arg(long)]
    pages_url: Option<String>,

    /// Watch with the admin polling cadence
    #[arg(long)]
    admin: bool,

    /// Bearer token sent with actions
    #[arg(long, env = "TIMER_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Send this action before watching (start, pause, reset, nextSession, setTime, stop)
    #[arg(long, requires = "server")]
    send: Option<Action>,

    /// Total minutes for start, reset or setTime
    #[arg(long, value_parser = parse_minutes)]
    total_minutes: Option<f64>,

    /// Session minutes for start, reset or setTime
    #[arg(long, value_parser = parse_minutes)]
    session_minutes: Option<f64>,

    /// Failed fetches before showing offline
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they do not tear the status line
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "session_timer={},timer_watch={}",
            if args.verbose { "debug" } else { "warn" },
            if args.verbose { "debug" } else { "info" },
        ))
        .init();

    let retry = RetryPolicy::default().with_max_retries(args.max_retries);
    let is_admin = args.admin || args.send.is_some();

    if let Some(server) = &args.server {
        let client = HttpTimerClient::new(server.clone());
        let client = if is_admin {
            client.as_admin(args.admin_token.clone())
        } else {
            client
        };

        let mut reconciler = ClientReconciler::new(TimerRecord::new(0, 0), is_admin).with_retry(retry);
        if let Some(action) = args.send {
            let command = TimerCommand::new(action).with_minutes(args.total_minutes, args.session_minutes);
            let snapshot = client
                .send(&command)
                .await
                .with_context(|| format!("sending {}", action))?;
            info!("Timer {} accepted (v{})", action, snapshot.record.version);
            let now = Utc::now();
            reconciler.merge(RemoteState::from(snapshot), now);
            reconciler.record_activity(now);
        }
        watch_source(&client, reconciler).await;
    } else if let (Some(owner), Some(repo)) = (&args.github_owner, &args.github_repo) {
        let config = GithubConfig {
            path: args.github_path.clone(),
            pages_url: args.pages_url.clone(),
            ..GithubConfig::new(owner.clone(), repo.clone())
        };
        let store = GithubStore::new(config);
        let reconciler = ClientReconciler::new(TimerRecord::new(0, 0), is_admin).with_retry(retry);
        watch_source(&store, reconciler).await;
    } else {
        bail!("either --server or --github-owner/--github-repo is required");
    }

    Ok(())
}

async fn watch_source<S: StateSource>(source: &S, mut reconciler: ClientReconciler) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(notify_on_shutdown(shutdown_tx));

    // A terminal is always in view
    let (_visibility_tx, visibility_rx) = watch::channel(Visibility::Visible);

    let mut stdout = std::io::stdout();
    run_observer(source, &mut reconciler, visibility_rx, shutdown_rx, |frame, reconciler| {
        let _ = write!(stdout, "\r{}", status_line(frame, reconciler.status()));
        let _ = stdout.flush();
    })
    .await;
    println!();

    let stats = reconciler.stats(Utc::now());
    info!(
        "Last sync {:?}, polling every {}s (~{} calls/hour)",
        stats.last_sync, stats.current_interval_secs, stats.estimated_calls_per_hour
    );
}

fn status_line(frame: &TimerSnapshot, status: ConnectionStatus) -> String {
    let state = match frame.record.run_state() {
        _ if frame.record.is_complete => "complete".to_string(),
        run_state => format!("{:?}", run_state).to_lowercase(),
    };
    let connection = match status {
        ConnectionStatus::Connecting => "connecting".to_string(),
        ConnectionStatus::Connected => "live".to_string(),
        ConnectionStatus::Retrying { attempt } => format!("retry {}", attempt),
        ConnectionStatus::Offline => "offline".to_string(),
    };
    format!(
        "total {}  session {}  [{}] v{} ({})   ",
        clock(frame.remaining_total),
        clock(frame.remaining_session),
        state,
        frame.record.version,
        connection,
    )
}

/// `H:MM:SS` rounded up, so a clock never shows zero while time remains.
fn clock(ms: u64) -> String {
    let secs = ms.div_ceil(1000);
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}
