//! Identity gateway entry point.

use anyhow::Result;
use clap::Parser;
use identity_gateway::PingoraGateway;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Configuration file path. When omitted, falls back to `GATEWAY_CONFIG`,
  /// well-known paths, then built-in defaults (see `GatewayConfig::load`).
  #[arg(short, long)]
  config: Option<String>,

  /// Enable debug logging.
  #[arg(long)]
  debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let filter = if args.debug {
    EnvFilter::new("debug,identity_gateway=debug,pingora=info")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,identity_gateway=debug,pingora=warn"))
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_target(false))
    .with(filter)
    .init();

  let gateway = match &args.config {
    Some(path) => PingoraGateway::new(path).await?,
    None => PingoraGateway::new_from_env().await?,
  };

  let status = gateway.get_status().await;
  info!(
    listen_addr = %status.listen_addr,
    total_upstreams = status.total_upstreams,
    healthy_upstreams = status.healthy_upstreams,
    "gateway configured"
  );

  if status.healthy_upstreams == 0 {
    warn!("no healthy upstreams configured; requests will 503 until backends register");
  }

  gateway.run().await
}
