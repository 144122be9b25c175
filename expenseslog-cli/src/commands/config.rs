//! Config command - show and change client settings

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use expenseslog_core::config::{Config, ENV_API_URL, ENV_IDLE_TIMEOUT};

use super::get_app_dir;
use crate::output;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Point the client at another backend
    SetUrl {
        /// Base API URL, e.g. https://expenses.example.com/api
        url: String,
    },
    /// Turn the idle timeout on or off, or change its threshold
    Idle {
        /// on or off
        state: Option<Toggle>,
        /// Minutes of inactivity before the session ends
        #[arg(long)]
        minutes: Option<u64>,
    },
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let app_dir = get_app_dir()?;

    match command {
        ConfigCommands::Show { json } => {
            let config = Config::load(&app_dir)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "base_url": config.base_url,
                        "timeout_secs": config.timeout.as_secs(),
                        "idle_timeout": {
                            "enabled": config.idle_enabled,
                            "threshold_minutes": config.idle_threshold.as_secs() / 60,
                            "check_interval_secs": config.idle_check_interval.as_secs(),
                        },
                        "app_dir": app_dir.to_string_lossy(),
                    }))?
                );
                return Ok(());
            }

            println!("{}", "Settings".bold());
            println!("  API URL:          {}", config.base_url);
            println!("  Request timeout:  {}s", config.timeout.as_secs());
            let idle = if config.idle_enabled {
                format!("on ({} min)", config.idle_threshold.as_secs() / 60).green()
            } else {
                "off".yellow()
            };
            println!("  Idle timeout:     {}", idle);
            println!("  App directory:    {}", app_dir.display());
            println!(
                "{}",
                format!("Environment overrides: {}, {}", ENV_API_URL, ENV_IDLE_TIMEOUT).dimmed()
            );
        }
        ConfigCommands::SetUrl { url } => {
            let mut config = Config::load_file(&app_dir)?;
            config.set_base_url(&url)?;
            config.save(&app_dir)?;
            output::success(&format!("✓ API URL set to {}", config.base_url));
        }
        ConfigCommands::Idle { state, minutes } => {
            if state.is_none() && minutes.is_none() {
                anyhow::bail!("Nothing to change. Pass 'on', 'off' or --minutes <N>.");
            }
            let mut config = Config::load_file(&app_dir)?;
            if let Some(state) = state {
                config.idle_enabled = matches!(state, Toggle::On);
            }
            if let Some(minutes) = minutes {
                config.set_idle_threshold_minutes(minutes)?;
            }
            config.save(&app_dir)?;

            if config.idle_enabled {
                output::success(&format!(
                    "✓ Idle timeout on: sessions end after {} minute(s) without activity",
                    config.idle_threshold.as_secs() / 60
                ));
            } else {
                output::warning("Idle timeout off: sessions stay open until you log out");
            }
        }
    }

    Ok(())
}
