//! WPS API server.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use wps_api::config::ServiceConfig;
use wps_api::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "wps-api")]
#[command(about = "Web Processing Service for data-cube timeseries drills")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1:8000", env = "WPS_LISTEN_ADDR")]
    listen: SocketAddr,

    /// Bind every interface on the listen port instead of the given address
    #[arg(long)]
    all_addresses: bool,

    /// Process catalogue
    #[arg(long, default_value = "datacube-wps-config.yaml", env = "WPS_CATALOG")]
    catalog: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "WPS_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

impl Args {
    fn bind_address(&self) -> SocketAddr {
        if self.all_addresses {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.listen.port()))
        } else {
            self.listen
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }
    let runtime = runtime_builder
        .build()
        .context("failed to create Tokio runtime")?;

    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    info!("Starting WPS API server");

    let config = ServiceConfig::from_env(&args.catalog)?;
    let state = Arc::new(AppState::from_config(&config)?.with_metrics(prometheus));

    let app = wps_api::router(state);

    let addr = args.bind_address();
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
