//! Inbound HTTP surface.
//!
//! Every method and path is accepted and relayed verbatim; the
//! balancer deliberately exposes no routes of its own, so `/health`
//! requests reach the backends like any other traffic.

use crate::error::BalancerError;
use crate::forward::Forwarder;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::StatusCode;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Largest request body the balancer will buffer (64 MB).
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Builds the balancer router: a catch-all proxy with request tracing.
pub fn router(forwarder: Arc<Forwarder>) -> Router {
    Router::new()
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(forwarder)
}

/// Relays one inbound request to the selected backend.
async fn proxy(State(forwarder): State<Arc<Forwarder>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(error) => {
            warn!(%error, "failed to read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str())
        .to_owned();

    match forwarder
        .dispatch(parts.method, &path_and_query, parts.headers, body)
        .await
    {
        Ok(upstream) => {
            let mut builder = Response::builder().status(upstream.status);
            if let Some(headers) = builder.headers_mut() {
                *headers = upstream.headers;
            }
            builder
                .body(Body::from(upstream.body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(BalancerError::NoBackend) => {
            warn!("no live backend available");
            (StatusCode::BAD_GATEWAY, "no live backend available\n").into_response()
        }
        Err(error) => {
            warn!(%error, "forward failed");
            (StatusCode::BAD_GATEWAY, "upstream request failed\n").into_response()
        }
    }
}
