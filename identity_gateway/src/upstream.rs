//! Upstream management on top of Pingora's `Backend`/`HttpPeer` primitives.
//! Keyed by service name so the proxy can resolve a backend purely from the
//! path-classified service name (spec 4.G), with no static route table.

use crate::config::{GatewayConfig, LoadBalancingType};
use anyhow::Result;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_load_balancing::Backend;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct UpstreamManager {
  upstreams: HashMap<String, UpstreamGroup>,
  config: Arc<GatewayConfig>,
}

struct UpstreamGroup {
  backends: Vec<Backend>,
  #[allow(dead_code)]
  load_balancing_type: LoadBalancingType,
}

#[derive(Debug, Clone)]
pub struct UpstreamStatus {
  pub name: String,
  pub total_peers: usize,
  pub healthy_peers: usize,
}

impl UpstreamManager {
  pub async fn new(config: Arc<GatewayConfig>) -> Result<Self> {
    let mut upstreams = HashMap::new();

    for (name, upstream_config) in &config.upstreams {
      let mut backends = Vec::new();
      for server in &upstream_config.servers {
        match create_backend(server) {
          Ok(backend) => backends.push(backend),
          Err(e) => warn!("failed to create backend for upstream '{}' at {}: {}", name, server, e),
        }
      }

      if backends.is_empty() {
        warn!("upstream '{}' has no healthy backends; requests will 503", name);
      } else {
        info!("upstream '{}' created with {} backends", name, backends.len());
      }

      upstreams.insert(
        name.clone(),
        UpstreamGroup {
          backends,
          load_balancing_type: upstream_config
            .load_balancing
            .clone()
            .unwrap_or(LoadBalancingType::RoundRobin),
        },
      );
    }

    Ok(Self { upstreams, config })
  }

  /// Select a peer for a service name discovered dynamically from the request
  /// path (spec 4.G routing rules), not from a static route list.
  pub fn select_peer(&self, upstream_name: &str, _key: Option<u64>) -> Option<HttpPeer> {
    let upstream = self.upstreams.get(upstream_name)?;
    if upstream.backends.is_empty() {
      debug!("no healthy backends for upstream '{}'", upstream_name);
      return None;
    }

    let index = (std::time::SystemTime::now()
      .duration_since(std::time::UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs() as usize)
      % upstream.backends.len();
    let backend = &upstream.backends[index];
    Some(HttpPeer::new(backend.addr.clone(), false, String::new()))
  }

  pub fn report_health(&self, upstream_name: &str, _peer_id: &str, healthy: bool) {
    if self.upstreams.contains_key(upstream_name) {
      debug!("upstream '{}' reported healthy={}", upstream_name, healthy);
    }
  }

  pub fn get_upstream_status(&self) -> HashMap<String, UpstreamStatus> {
    self
      .upstreams
      .iter()
      .map(|(name, group)| {
        let total_peers = self.config.upstreams.get(name).map(|c| c.servers.len()).unwrap_or(0);
        (
          name.clone(),
          UpstreamStatus {
            name: name.clone(),
            total_peers,
            healthy_peers: group.backends.len(),
          },
        )
      })
      .collect()
  }

  pub fn has_upstream(&self, name: &str) -> bool {
    self.upstreams.contains_key(name)
  }
}

fn create_backend(server: &str) -> Result<Backend> {
  Backend::new(server).or_else(|_| Backend::new(&format!("http://{}", server)))
    .map_err(|e| anyhow::anyhow!("failed to create backend for '{}': {:?}", server, e))
}
