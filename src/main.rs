// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::Result;
use chrono::Utc;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use xtream_proxy::cache::RefreshOutcome;
use xtream_proxy::server::{self, AppState};
use xtream_proxy::xtream_api::CatalogAction;
use xtream_proxy::{CacheManager, Config};

fn cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Parser)]
#[command(name = "xtream-proxy")]
#[command(about = "A caching, filtering reverse proxy for XTream Codes servers")]
#[command(version)]
#[command(styles = cargo_style())]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging to file (xtream_proxy_debug.log)
    #[arg(long, global = true)]
    debug_log: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server (default if no command given)
    Serve {
        /// Address to listen on, overrides proxy.listen
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Run one refresh cycle and print the result
    Refresh {
        /// Print the filtered payload of this action instead of a summary
        #[arg(short, long)]
        action: Option<String>,
    },
}

fn init_logging(cli: &Cli) -> Result<()> {
    if cli.debug_log {
        let file = File::create("xtream_proxy_debug.log")?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                EnvFilter::from_default_env()
                    .add_directive("xtream_proxy=debug".parse()?)
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive(tracing::Level::DEBUG.into())
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"))
            .add_directive("hyper_util=error".parse()?);
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
    Ok(())
}

async fn run_refresh(cache: &CacheManager, action: Option<String>) -> Result<()> {
    let outcome = cache.maybe_refresh(Utc::now()).await?;

    if let Some(action) = action {
        let catalog = if action == "server_info" {
            CatalogAction::ServerInfo
        } else {
            CatalogAction::from_action(&action)
                .ok_or_else(|| anyhow::anyhow!("Unknown catalog action: {}", action))?
        };
        let payload = cache.lookup(catalog).await;
        println!("{}", serde_json::to_string_pretty(payload.as_ref())?);
        return Ok(());
    }

    if let RefreshOutcome::Refreshed(summary) = outcome {
        println!("Refreshed at {}", summary.refreshed_at.to_rfc3339());
        for count in &summary.counts {
            println!("  {:<24} {:>7} / {:<7}", count.action, count.kept, count.total);
        }
        println!("  discovered categories    {:>7}", summary.discovered_categories);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = if cli.config.is_some() {
        Config::load(&config_path)?
    } else {
        Config::load_or_default(&config_path)?
    };
    tracing::debug!("Using configuration from {}", config_path.display());

    match cli.command {
        Some(Commands::Refresh { action }) => {
            let cache = CacheManager::from_config(&config)?;
            run_refresh(&cache, action).await?;
        }
        Some(Commands::Serve { listen }) => {
            if let Some(listen) = listen {
                config.proxy.listen = listen;
            }
            let cache = CacheManager::from_config(&config)?;
            server::serve(AppState::new(cache), &config.proxy.listen).await?;
        }
        None => {
            let cache = CacheManager::from_config(&config)?;
            server::serve(AppState::new(cache), &config.proxy.listen).await?;
        }
    }

    Ok(())
}
