//! Bearer-token authentication middleware for routes that sit behind the Token
//! Service directly (as opposed to the gateway's header-injection model). Checks
//! against the concrete `TokenService` rather than a generic verifier trait, since
//! validating a token here is a store lookup rather than a pure cryptographic
//! check (spec 4.F).

use std::sync::Arc;

use axum::{
  body::Body,
  extract::{FromRequestParts, Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
};
use axum_extra::{
  TypedHeader,
  headers::{Authorization, authorization::Bearer},
};
use tracing::warn;

use crate::services::token_service::TokenService;

pub async fn bearer_auth_middleware(
  State(token_service): State<Arc<TokenService>>,
  req: Request<Body>,
  next: Next,
) -> Response {
  let (mut parts, body) = req.into_parts();
  let token =
    match TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &token_service).await {
      Ok(bearer) => bearer.token().to_string(),
      Err(e) => {
        warn!("missing or malformed Authorization header: {e}");
        return (StatusCode::UNAUTHORIZED, "unauthenticated").into_response();
      }
    };

  match token_service.verify_token(&token).await {
    Ok(session) => {
      let mut req = Request::from_parts(parts, body);
      req.extensions_mut().insert(session);
      next.run(req).await
    }
    Err(e) => {
      warn!("token verification failed: {e}");
      (StatusCode::UNAUTHORIZED, "unauthenticated").into_response()
    }
  }
}
