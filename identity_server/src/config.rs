//! Unified configuration, loaded from a single YAML/TOML/JSON file and layered
//! across a search path (spec 6 ambient stack: "configuration").

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
  pub server: ServerConfig,
  pub mongo: MongoConfig,
  pub redis: RedisConfig,
  pub token: TokenConfig,
  pub rate_limiting: RateLimitConfig,
  pub observability: ObservabilityConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
  pub port: u16,
  pub request_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MongoConfig {
  pub uri: String,
  pub database: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RedisConfig {
  pub url: String,
  /// Upper bound on keys scanned per `SCAN` batch (spec 4.C: "bounded-batch SCAN,
  /// never a blocking KEYS scan").
  #[serde(default = "default_scan_batch_size")]
  pub scan_batch_size: u32,
}

fn default_scan_batch_size() -> u32 {
  200
}

/// Signing algorithm and material for the refresh token and the gateway's internal
/// token (spec 4.F: "HS256 ... or RS256").
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum TokenConfig {
  Hs256 {
    secret: String,
  },
  Rs256 {
    private_key_path: PathBuf,
    public_key_path: PathBuf,
  },
}

/// A single fixed-window threshold: `max_requests` per `window_seconds`, per IP
/// (spec 5: "Redis-backed fixed-window counters").
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct RateLimitThreshold {
  pub max_requests: u32,
  pub window_seconds: u64,
}

/// Per-endpoint thresholds (spec 5). Defaults match the values named in spec.md §5
/// exactly: login 5/min, register 3/hour, refresh 10/min, OAuth callback 5/min.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitConfig {
  pub enabled: bool,
  #[serde(default = "default_login_threshold")]
  pub login: RateLimitThreshold,
  #[serde(default = "default_register_threshold")]
  pub register: RateLimitThreshold,
  #[serde(default = "default_refresh_threshold")]
  pub refresh: RateLimitThreshold,
  #[serde(default = "default_oauth_callback_threshold")]
  pub oauth_callback: RateLimitThreshold,
}

fn default_login_threshold() -> RateLimitThreshold {
  RateLimitThreshold {
    max_requests: 5,
    window_seconds: 60,
  }
}

fn default_register_threshold() -> RateLimitThreshold {
  RateLimitThreshold {
    max_requests: 3,
    window_seconds: 3600,
  }
}

fn default_refresh_threshold() -> RateLimitThreshold {
  RateLimitThreshold {
    max_requests: 10,
    window_seconds: 60,
  }
}

fn default_oauth_callback_threshold() -> RateLimitThreshold {
  RateLimitThreshold {
    max_requests: 5,
    window_seconds: 60,
  }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
  pub log_level: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("YAML parsing error: {0}")]
  YamlParse(#[from] serde_yaml::Error),
  #[error("TOML parsing error: {0}")]
  TomlParse(#[from] toml::de::Error),
  #[error("JSON parsing error: {0}")]
  JsonParse(#[from] serde_json::Error),
}

impl AppConfig {
  /// `IDENTITY_CONFIG` overrides everything; otherwise search a fixed list of
  /// conventional locations, in priority order, and use the first that parses.
  pub fn load() -> Result<Self> {
    if let Ok(config_path) = env::var("IDENTITY_CONFIG") {
      return Self::from_file(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load config from IDENTITY_CONFIG ({config_path}): {e}"));
    }

    for path in Self::search_locations() {
      if path.exists() {
        match Self::from_file(path.to_str().unwrap_or_default()) {
          Ok(config) => return Ok(config),
          Err(e) => {
            tracing::warn!("config candidate {} failed to parse: {e}", path.display());
            continue;
          }
        }
      }
    }

    anyhow::bail!("no valid configuration file found in any search location")
  }

  fn search_locations() -> Vec<PathBuf> {
    let mut locations = vec![
      PathBuf::from("/app/config/identity.yml"),
      PathBuf::from("/etc/identity-engine/identity.yml"),
    ];

    if let Ok(cwd) = env::current_dir() {
      locations.push(cwd.join("identity.yml"));
      locations.push(cwd.join("config").join("identity.yml"));
      locations.push(cwd.join("identity_server").join("identity.yml"));
    }

    if let Ok(home) = env::var("HOME") {
      locations.push(PathBuf::from(home).join(".config/identity-engine/identity.yml"));
    }

    locations
  }

  pub fn from_file(path: &str) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    if path.ends_with(".toml") {
      Ok(toml::from_str(&content)?)
    } else if path.ends_with(".json") {
      Ok(serde_json::from_str(&content)?)
    } else {
      serde_yaml::from_str(&content).map_err(ConfigError::YamlParse)
    }
  }
}
