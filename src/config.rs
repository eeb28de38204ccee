//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::{state::time_basis::minutes_to_ms, sync::GithubConfig};

/// CLI argument parsing structure
#[derive(Parser)]
#[command(name = "session-timer")]
#[command(about = "A shared session countdown timer served over HTTP and WebSocket")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, env = "TIMER_PORT", default_value = "3000")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "TIMER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Default total duration in minutes
    #[arg(long, default_value = "120", value_parser = parse_minutes)]
    pub total_minutes: f64,

    /// Default session duration in minutes
    #[arg(long, default_value = "20", value_parser = parse_minutes)]
    pub session_minutes: f64,

    /// Persist the timer to this JSON file instead of memory
    #[arg(long, env = "TIMER_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Session clock period in milliseconds (0 disables the clock)
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Require `Authorization: Bearer <token>` on POST /api/timer
    #[arg(long, env = "TIMER_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// GitHub owner of the repository to mirror state into
    #[arg(long, requires = "github_repo")]
    pub github_owner: Option<String>,

    /// GitHub repository to mirror state into
    #[arg(long, requires = "github_owner")]
    pub github_repo: Option<String>,

    /// Path of the state file inside the repository
    #[arg(long, default_value = "timer-state.json")]
    pub github_path: String,

    /// Branch to commit state to
    #[arg(long, default_value = "main")]
    pub github_branch: String,

    /// Token used for mirror writes
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn total_duration_ms(&self) -> u64 {
        minutes_to_ms(self.total_minutes)
    }

    pub fn session_duration_ms(&self) -> u64 {
        minutes_to_ms(self.session_minutes)
    }

    /// `None` when the session clock is disabled.
    pub fn tick_period(&self) -> Option<Duration> {
        (self.tick_ms > 0).then(|| Duration::from_millis(self.tick_ms))
    }

    /// Mirror settings, when both owner and repository were given.
    pub fn github(&self) -> Option<GithubConfig> {
        let (owner, repo) = (self.github_owner.as_ref()?, self.github_repo.as_ref()?);
        Some(GithubConfig {
            path: self.github_path.clone(),
            branch: self.github_branch.clone(),
            token: self.github_token.clone(),
            ..GithubConfig::new(owner.clone(), repo.clone())
        })
    }
}

/// Accept a finite, positive minute count.
pub fn parse_minutes(value: &str) -> Result<f64, String> {
    let minutes: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of minutes", value))?;
    if minutes.is_finite() && minutes > 0.0 {
        Ok(minutes)
    } else {
        Err(format!("minutes must be positive, got {}", value))
    }
}
