mod bearer_auth;
mod request_id;

use axum::{Router, middleware::from_fn};
use tower::ServiceBuilder;
use tower_http::{
  LatencyUnit,
  compression::CompressionLayer,
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub use self::bearer_auth::bearer_auth_middleware;
pub use self::request_id::{REQUEST_ID_HEADER, request_id_middleware};

/// Apply the common middleware stack (tracing, compression, request id) to a
/// router, outermost layer first.
pub trait SetLayer {
  fn set_layer(self) -> Self;
}

impl<S> SetLayer for Router<S>
where
  S: Clone + Send + Sync + 'static,
{
  fn set_layer(self) -> Self {
    self.layer(
      ServiceBuilder::new()
        .layer(
          TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().include_headers(true))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
              DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Micros),
            ),
        )
        .layer(CompressionLayer::new().gzip(true).br(true).deflate(true))
        .layer(from_fn(request_id_middleware)),
    )
  }
}
