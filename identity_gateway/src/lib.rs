//! Identity gateway: a Pingora-native reverse proxy implementing the front
//! half of the authentication flow (spec 4.G) — dynamic path classification,
//! a bearer-token auth gate in front of `/api/*`, and internal-token minting
//! for the services it forwards to.
//!
//! Core Pingora features used:
//! - `ProxyHttp` trait implementation (see `proxy`)
//! - Built-in load balancing over configured upstream servers
//! - Connection pooling via the Pingora runtime

pub mod config;
pub mod proxy;
pub mod upstream;

use anyhow::Result;
use pingora::prelude::*;
use pingora_proxy::http_proxy_service;
use std::sync::Arc;
use tracing::{error, info};

pub use config::GatewayConfig;
pub use proxy::GatewayProxy;
pub use upstream::UpstreamManager;

/// Pingora-native gateway application with complete lifecycle management.
pub struct PingoraGateway {
  pub config: Arc<GatewayConfig>,
  pub upstream_manager: Arc<UpstreamManager>,
  pub proxy: GatewayProxy,
}

impl PingoraGateway {
  /// Create a new gateway instance from a configuration file.
  pub async fn new(config_path: &str) -> Result<Self> {
    info!("loading gateway configuration from {}", config_path);
    let config = Arc::new(GatewayConfig::from_file(config_path)?);
    Self::from_config_arc(config).await
  }

  /// Load configuration from `GATEWAY_CONFIG`/well-known paths/defaults (see
  /// `GatewayConfig::load`).
  pub async fn new_from_env() -> Result<Self> {
    let config = Arc::new(GatewayConfig::load()?);
    Self::from_config_arc(config).await
  }

  /// Create a new gateway instance from a configuration object (for testing).
  pub async fn new_from_config(config: GatewayConfig) -> Result<Self> {
    config.validate()?;
    Self::from_config_arc(Arc::new(config)).await
  }

  async fn from_config_arc(config: Arc<GatewayConfig>) -> Result<Self> {
    info!("configuration loaded with {} upstreams", config.upstreams.len());

    let upstream_manager = Arc::new(UpstreamManager::new(config.clone()).await?);
    info!("upstream manager initialized");

    let proxy = GatewayProxy::new(config.clone(), upstream_manager.clone());

    Ok(Self {
      config,
      upstream_manager,
      proxy,
    })
  }

  /// Start the gateway server using the Pingora runtime. Blocks until shutdown.
  pub async fn run(self) -> Result<()> {
    info!("starting gateway on {}", self.config.server.listen_addr);

    let mut server = Server::new(None).map_err(|e| anyhow::anyhow!("server creation failed: {}", e))?;
    server.bootstrap();

    let mut proxy_service = http_proxy_service(&server.configuration, self.proxy);
    proxy_service.add_tcp(&self.config.server.listen_addr);
    server.add_service(proxy_service);

    info!("gateway listening, press Ctrl+C to shut down");
    server.run_forever();
  }

  /// Get gateway runtime status for monitoring.
  pub async fn get_status(&self) -> GatewayStatus {
    let upstream_statuses = self.upstream_manager.get_upstream_status();
    let total_upstreams = upstream_statuses.len();
    let healthy_upstreams = upstream_statuses
      .values()
      .filter(|status| status.healthy_peers > 0)
      .count();

    GatewayStatus {
      listen_addr: self.config.server.listen_addr.clone(),
      total_upstreams,
      healthy_upstreams,
      healthy: healthy_upstreams > 0,
      upstreams: upstream_statuses,
    }
  }

  pub fn validate_config(&self) -> Result<()> {
    self.config.validate()
  }
}

/// Runtime status information for monitoring and health checks.
#[derive(Debug, Clone)]
pub struct GatewayStatus {
  pub listen_addr: String,
  pub total_upstreams: usize,
  pub healthy_upstreams: usize,
  pub healthy: bool,
  pub upstreams: std::collections::HashMap<String, upstream::UpstreamStatus>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn gateway_creation_from_config_object() {
    let config = config::testing::create_test_config();
    let gateway = PingoraGateway::new_from_config(config).await;
    assert!(gateway.is_ok());
  }

  #[tokio::test]
  async fn gateway_status_reports_configured_upstreams() {
    let config = config::testing::create_test_config();
    let gateway = PingoraGateway::new_from_config(config).await.unwrap();
    let status = gateway.get_status().await;

    assert_eq!(status.listen_addr, "127.0.0.1:8080");
    assert_eq!(status.total_upstreams, 3);
  }

  #[tokio::test]
  async fn config_validation_passes_for_test_config() {
    let config = config::testing::create_test_config();
    let gateway = PingoraGateway::new_from_config(config).await.unwrap();
    assert!(gateway.validate_config().is_ok());
  }
}
