mod error;
mod handlers;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use alerting::AlertsClientFactory;
use clap::Parser;
use tracing::{info, warn};

use crate::state::{bootstrap, create_default_config, load_config};

static FACTORY: AlertsClientFactory = AlertsClientFactory::new();

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "alerting.toml")]
    config: PathBuf,
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if !args.config.exists() {
        warn!("config file missing, creating default config");
        create_default_config(&args.config)?;
    }

    let config = load_config(&args.config)?;
    let state = Arc::new(bootstrap(&config, &FACTORY)?);
    let app = routes::router(state);

    info!("alerting-server listening on {}", args.listen);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
