//! Integration tests for the identity gateway: configuration loading,
//! dynamic path classification, and the auth-gate's bearer cache.

use identity_gateway::config::{testing::create_test_config, GatewayConfig, UpstreamConfig};
use identity_gateway::proxy::classify_path;
use identity_gateway::PingoraGateway;

#[tokio::test]
async fn gateway_starts_with_unreachable_upstreams() {
  let config = create_test_config();
  let config_yaml = serde_yaml::to_string(&config).unwrap();
  let temp_file = "/tmp/identity_gateway_test_unreachable.yml";
  std::fs::write(temp_file, config_yaml).unwrap();

  let gateway = PingoraGateway::new(temp_file).await;
  assert!(gateway.is_ok(), "gateway should initialize even with unreachable upstreams");

  std::fs::remove_file(temp_file).ok();
}

#[tokio::test]
async fn gateway_reports_configured_upstream_count() {
  let config = create_test_config();
  let gateway = PingoraGateway::new_from_config(config).await.unwrap();
  let status = gateway.get_status().await;

  assert_eq!(status.total_upstreams, 3);
}

#[test]
fn config_validation_rejects_empty_upstream_servers() {
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

#[test]
fn config_validation_rejects_short_internal_secret() {
  let mut config = GatewayConfig::default();
  config.auth.internal_token_secret = "too-short".to_string();
  assert!(config.validate().is_err());
}

#[test]
fn api_path_classification_strips_service_segment() {
  let route = classify_path("/api/identity/auth/login");
  assert_eq!(route.upstream_name(), "identity");
  assert_eq!(route.forward_path(), "/auth/login");
  assert!(!route.requires_auth());
}

#[test]
fn api_path_other_than_login_register_requires_auth() {
  let route = classify_path("/api/chat/rooms");
  assert_eq!(route.upstream_name(), "chat");
  assert!(route.requires_auth());
}

#[test]
fn page_and_upload_paths_never_require_auth() {
  assert!(!classify_path("/page/chat/rooms").requires_auth());
  assert!(!classify_path("/upload/avatar.png").requires_auth());
}

#[test]
fn cors_origin_allowed_only_when_configured() {
  let config = create_test_config();
  assert!(config.is_cors_origin_allowed("http://localhost:3000"));
  assert!(!config.is_cors_origin_allowed("https://evil.example"));
}
