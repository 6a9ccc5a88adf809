//! Gateway configuration (spec 4.G): an upstream registry plus the auth gate's
//! own settings. The routing rule is fixed (see `proxy::classify_path`) and
//! needs only a name -> servers map, so there is no route list to configure.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
  pub server: ServerConfig,
  pub upstreams: HashMap<String, UpstreamConfig>,
  pub auth: AuthConfig,
  pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
  pub listen_addr: String,
  pub worker_threads: Option<usize>,
  pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
  pub servers: Vec<String>,
  pub health_check: Option<HealthCheckConfig>,
  pub load_balancing: Option<LoadBalancingType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
  pub interval: u64,
  pub timeout: u64,
  pub path: String,
  pub expected_status: Vec<u16>,
  pub healthy_threshold: Option<u32>,
  pub unhealthy_threshold: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoadBalancingType {
  RoundRobin,
  Random,
  LeastConnections,
  WeightedRoundRobin,
  ConsistentHash,
}

/// The auth gate's own settings (spec 4.G steps 1-3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
  /// Base URL of the Token Service's `/api/v1/auth/validate` endpoint.
  pub validate_url: String,
  pub validate_timeout_ms: u64,
  /// HS256 secret used to mint the internal token handed to downstream services.
  pub internal_token_secret: String,
  pub internal_token_ttl_secs: i64,
  /// Local bearer-validation cache TTL. MUST NOT exceed the session TTL (spec
  /// 4.G "Cache coherence").
  pub bearer_cache_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
  pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      listen_addr: "0.0.0.0:8080".to_string(),
      worker_threads: Some(4),
      request_timeout_secs: Some(30),
    }
  }
}

impl Default for AuthConfig {
  fn default() -> Self {
    Self {
      validate_url: "http://127.0.0.1:8000/api/v1/auth/validate".to_string(),
      validate_timeout_ms: 2_000,
      internal_token_secret: "change-me-in-production-32-bytes".to_string(),
      internal_token_ttl_secs: 60,
      bearer_cache_ttl_secs: 60,
    }
  }
}

impl Default for CorsConfig {
  fn default() -> Self {
    Self {
      allowed_origins: vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
      ],
    }
  }
}

impl GatewayConfig {
  /// Search well-known paths, then `GATEWAY_CONFIG`, then fall back to defaults.
  pub fn load() -> Result<Self> {
    if let Ok(path) = std::env::var("GATEWAY_CONFIG") {
      return Self::from_file(&path);
    }
    for candidate in ["/etc/identity-gateway/gateway.yml", "gateway.yml", "config/gateway.yml"] {
      if let Some(config) = Self::try_load_from_path(candidate) {
        return Ok(config);
      }
    }
    Ok(Self::default())
  }

  fn try_load_from_path(path: &str) -> Option<Self> {
    Self::from_file(path).ok()
  }

  pub fn from_file(path: &str) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    let config: GatewayConfig = serde_yaml::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }

  /// Validate configuration. The upstream registry is consulted dynamically by
  /// path segment at request time, so there is nothing to cross-reference here
  /// beyond the upstreams' own shape.
  pub fn validate(&self) -> Result<()> {
    for (name, upstream) in &self.upstreams {
      if upstream.servers.is_empty() {
        return Err(anyhow::anyhow!("upstream '{}' has no servers configured", name));
      }
      for server in &upstream.servers {
        if server.is_empty() {
          return Err(anyhow::anyhow!("server in upstream '{}' has empty address", name));
        }
      }
    }
    if self.auth.internal_token_secret.len() < 16 {
      return Err(anyhow::anyhow!(
        "auth.internal_token_secret must be at least 16 bytes"
      ));
    }
    Ok(())
  }

  pub fn is_cors_origin_allowed(&self, origin: &str) -> bool {
    self.cors.allowed_origins.iter().any(|o| o == origin)
  }
}

impl Default for GatewayConfig {
  fn default() -> Self {
    let mut upstreams = HashMap::new();
    upstreams.insert(
      "identity".to_string(),
      UpstreamConfig {
        servers: vec!["127.0.0.1:8000".to_string()],
        health_check: Some(HealthCheckConfig {
          interval: 30,
          timeout: 5,
          path: "/health".to_string(),
          expected_status: vec![200],
          healthy_threshold: Some(2),
          unhealthy_threshold: Some(3),
        }),
        load_balancing: Some(LoadBalancingType::RoundRobin),
      },
    );

    Self {
      server: ServerConfig::default(),
      upstreams,
      auth: AuthConfig::default(),
      cors: CorsConfig::default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_validates() {
    assert!(GatewayConfig::default().validate().is_ok());
  }

  #[test]
  fn short_internal_secret_rejected() {
    let mut config = GatewayConfig::default();
    config.auth.internal_token_secret = "short".to_string();
    assert!(config.validate().is_err());
  }

  #[test]
  fn empty_upstream_servers_rejected() {
    let mut config = GatewayConfig::default();
    config.upstreams.insert(
      "broken".to_string(),
      UpstreamConfig {
        servers: vec![],
        health_check: None,
        load_balancing: None,
      },
    );
    assert!(config.validate().is_err());
  }
}

/// Test configuration helpers shared by unit and integration tests.
pub mod testing {
  use super::*;

  pub fn create_test_config() -> GatewayConfig {
    let mut upstreams = HashMap::new();
    upstreams.insert(
      "identity".to_string(),
      UpstreamConfig {
        servers: vec!["127.0.0.1:6688".to_string()],
        health_check: None,
        load_balancing: Some(LoadBalancingType::RoundRobin),
      },
    );
    upstreams.insert(
      "chat".to_string(),
      UpstreamConfig {
        servers: vec!["127.0.0.1:7788".to_string()],
        health_check: None,
        load_balancing: Some(LoadBalancingType::RoundRobin),
      },
    );
    upstreams.insert(
      "file-service".to_string(),
      UpstreamConfig {
        servers: vec!["127.0.0.1:7789".to_string()],
        health_check: None,
        load_balancing: Some(LoadBalancingType::RoundRobin),
      },
    );

    GatewayConfig {
      server: ServerConfig {
        listen_addr: "127.0.0.1:8080".to_string(),
        worker_threads: Some(1),
        request_timeout_secs: Some(5),
      },
      upstreams,
      auth: AuthConfig {
        validate_url: "http://127.0.0.1:6688/api/v1/auth/validate".to_string(),
        validate_timeout_ms: 500,
        internal_token_secret: "test-internal-secret-32-bytes!!".to_string(),
        internal_token_ttl_secs: 60,
        bearer_cache_ttl_secs: 60,
      },
      cors: CorsConfig {
        allowed_origins: vec!["http://localhost:3000".to_string()],
      },
    }
  }
}
