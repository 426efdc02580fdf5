// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod dummy;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use trx_app::{init_logging, ConfigFile};
use trx_core::DynResult;
use trx_frontend_tci::TciServer;

use config::ServerConfig;
use dummy::DummyRadio;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - TCI rig state server");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// IP address for the TCI listener
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
    /// Port for the TCI listener
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
    /// Report only the transmit frequency to TCI clients
    #[arg(long = "tx-only")]
    tx_only: bool,
}

impl Cli {
    fn apply_overrides(&self, cfg: &mut ServerConfig) {
        if let Some(listen) = self.listen {
            cfg.tci.listen = listen;
        }
        if let Some(port) = self.port {
            cfg.tci.port = port;
        }
        if self.tx_only {
            cfg.tci.tx_only = true;
        }
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_combined_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = ServerConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };
    cli.apply_overrides(&mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }
    if let Some(ref cs) = cfg.general.callsign {
        info!("Callsign: {}", cs);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (radio, state_rx) = DummyRadio::new(cfg.initial_state());
    let radio_task = tokio::spawn(radio.run(shutdown_rx));

    let server = if cfg.tci.enabled {
        match TciServer::bind(&cfg.tci, state_rx) {
            Ok(server) => Some(server),
            Err(e) => {
                error!("TCI server failed to start on {}: {}", cfg.tci.listen_addr(), e);
                let _ = shutdown_tx.send(true);
                let _ = radio_task.await;
                return Err(e.into());
            }
        }
    } else {
        info!("TCI server disabled in configuration");
        None
    };

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");

    if let Some(server) = server {
        server.shutdown().await;
    }
    let _ = shutdown_tx.send(true);
    let _ = radio_task.await;
    Ok(())
}
