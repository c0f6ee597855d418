//! chainsim CLI — run a controllable fake EVM / Solana node.
//!
//! # Commands
//! ```bash
//! chainsim serve --port 8545 --config chains.yaml
//! chainsim default-config > chains.yaml
//! chainsim chains --config chains.yaml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chainsim_core::{SimConfig, Simulator};
use chainsim_server::{init_tracing, serve, AppState, ServerError};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "chainsim",
    about = "Controllable fake blockchain node for testing RPC clients",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-RPC over WebSocket and HTTP
    Serve {
        /// YAML chain table (default: built-in table)
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, env = "RPC_PORT", default_value_t = 8545)]
        port: u16,
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Emit JSON log lines
        #[arg(long)]
        log_json: bool,
    },

    /// Print the built-in configuration as YAML
    #[command(name = "default-config")]
    DefaultConfig {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the chains a configuration serves
    Chains {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            config,
            port,
            host,
            log_json,
        } => cmd_serve(config, &host, port, log_json).await,
        Commands::DefaultConfig { output } => cmd_default_config(output),
        Commands::Chains { config } => cmd_chains(config),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<SimConfig> {
    match path {
        Some(path) => SimConfig::load(&path).with_context(|| format!("loading {}", path.display())),
        None => Ok(SimConfig::default()),
    }
}

async fn cmd_serve(config: Option<PathBuf>, host: &str, port: u16, log_json: bool) -> Result<()> {
    let mut config = load_config(config)?;
    config.log.json |= log_json;
    init_tracing(&config.log).context("initialising tracing")?;

    let sim = Arc::new(Simulator::new(&config)?);
    let clocks = sim.start();

    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    let signal_sim = Arc::clone(&sim);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("ctrl-c received, shutting down");
                signal_sim.shutdown();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for ctrl-c"),
        }
    });

    serve(listener, AppState::new(Arc::clone(&sim)), sim.shutdown_token()).await?;
    for clock in clocks {
        let _ = clock.await;
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn cmd_default_config(output: Option<PathBuf>) -> Result<()> {
    let config = SimConfig::default();
    match output {
        Some(path) => {
            config.save(&path)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", config.to_yaml()?),
    }
    Ok(())
}

fn cmd_chains(config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let sim = Simulator::new(&config)?;
    println!("{:<8} {:<12} {:<8} {:>10}", "KEY", "NAME", "FAMILY", "INTERVAL");
    for chain in sim.chains().iter() {
        println!(
            "{:<8} {:<12} {:<8} {:>8}ms",
            chain.key(),
            chain.name(),
            chain.family().to_string(),
            chain.state().interval().as_millis()
        );
    }
    Ok(())
}
