//! Entry point: load configuration, build `AppState` against Mongo/Redis, and
//! serve the auth surface (spec 6).

use identity_server::state::AppState;
use identity_server::{config::AppConfig, get_router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let config = AppConfig::load().expect("failed to load configuration");

  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer())
    .with(tracing_subscriber::EnvFilter::new(&config.observability.log_level))
    .init();

  let port = config.server.port;
  let state = AppState::build(config).await?;
  let app = get_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], port));
  info!("identity server listening on {}", addr);

  let listener = TcpListener::bind(addr).await?;
  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await?;

  Ok(())
}
