//! # popup-stack - Popup overlay stack manager
//!
//! Replays a scripted scenario against a popup context and prints what each
//! manager shows per anchor after every step.
//!
//! ## Architecture Overview
//!
//! - `config`: Configuration parsing and management
//! - `context`: Process-wide context, dispatcher and main loop
//! - `scenario`: Scripted steps and per-step reports

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

use popup_stack::scenario::{Scenario, ScenarioRunner};
use popup_stack::{NoopFocus, PopupContext, StackConfig};

#[derive(Parser)]
#[command(name = "popup-stack")]
#[command(about = "Replay popup show/dismiss scenarios against a stacked overlay manager")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/popup-stack/popup-stack.toml")]
    config: String,

    /// Scenario file to replay
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Override the debounce cooldown in milliseconds
    #[arg(long)]
    cooldown_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging so `general.debug` can raise the filter
    let loaded = StackConfig::load(&cli.config);
    let debug = cli.debug || loaded.as_ref().map(|c| c.general.debug).unwrap_or(false);

    // Initialize logging
    if debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("Starting popup-stack {}", popup_stack::VERSION);

    let mut config = match loaded {
        Ok(config) => {
            info!("Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            info!("Using default configuration");
            StackConfig::default()
        }
    };

    // Override config with CLI flags
    if let Some(cooldown_ms) = cli.cooldown_ms {
        config.engine.cooldown_ms = cooldown_ms;
        config.validate().context("Invalid --cooldown-ms")?;
        info!("Debounce cooldown set to {}ms via CLI flag", cooldown_ms);
    }

    let Some(path) = cli.scenario else {
        info!("No scenario given, nothing to replay");
        return Ok(());
    };
    let scenario = Scenario::load(&path)?;

    let (context, main_loop) = PopupContext::new(&config, Arc::new(NoopFocus));
    let main_loop = tokio::spawn(main_loop.run());

    let runner = ScenarioRunner::new(context);
    let reports = runner.run(&scenario).await?;
    for report in &reports {
        println!("{}", report);
    }

    // Dropping the last dispatcher stops the main loop
    drop(runner);
    main_loop.await.context("Popup main loop panicked")?;

    info!("Replayed {} step(s) from {}", reports.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["popup-stack"]).unwrap();
        assert!(!cli.debug);
        assert!(cli.scenario.is_none());
        assert!(cli.cooldown_ms.is_none());
        assert_eq!(cli.config, "~/.config/popup-stack/popup-stack.toml");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "popup-stack",
            "--debug",
            "--scenario",
            "demos/basic.toml",
            "--cooldown-ms",
            "0",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.scenario, Some(PathBuf::from("demos/basic.toml")));
        assert_eq!(cli.cooldown_ms, Some(0));
    }
}
