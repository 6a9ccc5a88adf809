//! OpenAPI surface (spec 2 ambient stack: "OpenAPI surface"), grounded on the
//! teacher's `utoipa` + Swagger/Redoc/RapiDoc serving setup.

use axum::response::{Html, Json};
use axum::routing::get;
use axum::{Router, response::Redirect};
use utoipa::{
  Modify, OpenApi,
  openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::error::ErrorOutput;
use crate::handlers::auth::{
  AuthResponse, LoginRequest, MfaRequiredResponse, OAuthLoginRequest, RefreshRequest,
  RegisterRequest, UserSummary, ValidateRequest, ValidateResponse,
};
use crate::handlers::health::{HealthStatus, ReadinessStatus};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
  components(
    schemas(
      ErrorOutput,
      RegisterRequest,
      LoginRequest,
      RefreshRequest,
      AuthResponse,
      UserSummary,
      MfaRequiredResponse,
      OAuthLoginRequest,
      ValidateRequest,
      ValidateResponse,
      HealthStatus,
      ReadinessStatus,
    )
  ),
  modifiers(&SecurityAddon),
  tags(
    (name = "auth", description = "Registration, login, refresh, logout, and token validation"),
    (name = "health", description = "Liveness and readiness probes"),
  )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
  fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
    if let Some(components) = openapi.components.as_mut() {
      components.add_security_scheme(
        "access_token",
        SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
      );
      components.add_security_scheme(
        "refresh_token",
        SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Refresh-Token"))),
      );
    }
  }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
  Json(ApiDoc::openapi())
}

async fn swagger_redirect() -> Redirect {
  Redirect::permanent("/swagger-ui/")
}

async fn swagger_ui() -> Html<&'static str> {
  Html(
    r#"<!DOCTYPE html>
<html>
<head>
  <title>Identity Engine API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.1.0/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5.1.0/swagger-ui-bundle.js"></script>
  <script>
    SwaggerUIBundle({
      url: '/api-docs/openapi.json',
      dom_id: '#swagger-ui',
      presets: [SwaggerUIBundle.presets.apis, SwaggerUIBundle.presets.standalone],
    });
  </script>
</body>
</html>"#,
  )
}

async fn redoc_ui() -> Html<&'static str> {
  Html(
    r#"<!DOCTYPE html>
<html>
<head><title>Identity Engine API - Redoc</title></head>
<body>
  <redoc spec-url="/api-docs/openapi.json"></redoc>
  <script src="https://cdn.jsdelivr.net/npm/redoc@2.1.3/bundles/redoc.standalone.js"></script>
</body>
</html>"#,
  )
}

async fn rapidoc_ui() -> Html<&'static str> {
  Html(
    r#"<!DOCTYPE html>
<html>
<head>
  <title>Identity Engine API - RapiDoc</title>
  <script type="module" src="https://unpkg.com/rapidoc@9.3.4/dist/rapidoc-min.js"></script>
</head>
<body>
  <rapi-doc spec-url="/api-docs/openapi.json" theme="dark" render-style="read"></rapi-doc>
</body>
</html>"#,
  )
}

pub trait OpenApiRouter {
  fn openapi_routes(self) -> Self;
}

impl OpenApiRouter for Router<AppState> {
  fn openapi_routes(self) -> Self {
    self
      .route("/api-docs/openapi.json", get(openapi_json))
      .route("/docs", get(swagger_redirect))
      .route("/swagger-ui", get(swagger_ui))
      .route("/swagger-ui/", get(swagger_ui))
      .route("/redoc", get(redoc_ui))
      .route("/rapidoc", get(rapidoc_ui))
  }
}
