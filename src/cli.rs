use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api;
use crate::simulate::{self, SimConfig};
use crate::state::AppState;
use crate::utils;

/// Marketplace engine: fixed-price sales and timed auctions over HTTP.
#[derive(Parser)]
#[command(name = "marketplace-engine")]
#[command(version, about = "Auction bidding, closure and order API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0:3000")]
        bind: SocketAddr,

        /// Directory holding the durable order archive
        #[arg(long, default_value = "market-data")]
        data_dir: PathBuf,
    },

    /// Drive randomized auction traffic against a running server
    Simulate {
        /// Base URL of the API under load
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        api_base: String,

        /// Stop after this many seconds; omit to run until ctrl-c
        #[arg(long)]
        run_secs: Option<u64>,

        /// Poisson arrival rate for bids, per second
        #[arg(long, default_value_t = 4.0)]
        rate_hz: f64,

        /// Auction items to seed before bidding starts
        #[arg(long, default_value_t = 4)]
        auctions: usize,

        /// Fixed-price items to seed for buy-now traffic
        #[arg(long, default_value_t = 2)]
        listings: usize,

        /// Bidder principals to rotate through
        #[arg(long, default_value_t = 6)]
        bidders: usize,

        /// Mean increment above the current highest bid
        #[arg(long, default_value_t = 12.5)]
        mean_increment: f64,
    },
}

pub async fn run_cli() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { bind, data_dir } => serve(bind, data_dir).await,
        Commands::Simulate {
            api_base,
            run_secs,
            rate_hz,
            auctions,
            listings,
            bidders,
            mean_increment,
        } => {
            let cfg = SimConfig {
                api_base,
                run_secs,
                rate_hz,
                auctions,
                listings,
                bidders,
                mean_increment,
            };
            let token = utils::shutdown_token();
            simulate::run_simulation(cfg, token).await
        }
    }
}

async fn serve(bind: SocketAddr, data_dir: PathBuf) -> anyhow::Result<()> {
    let state = AppState::open(&data_dir)?;
    let app = api::router(state);
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, archive = %data_dir.display(), "marketplace listening");

    let token = utils::shutdown_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;
    info!("shutdown complete");
    Ok(())
}
