//! HTTP routes
//!
//! ```text
//! GET /api/{credential}/{key}   → 200 value | 401 | 404
//! PUT /api/{credential}/{key}   → 200 empty | 401 | 404
//! ```
//!
//! `/api/{credential}/` (empty key) is routed too, so the credential is
//! still checked first. Path segments are decoded to bytes by hand; neither
//! the credential nor the key has to be UTF-8.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handler::{RequestError, RequestHandler};

/// Build the application router
pub fn router(handler: Arc<RequestHandler>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT])
        .allow_headers(Any);

    // The URI carries the credential, so spans record the method only
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::debug_span!("request", method = %request.method())
    });

    Router::new()
        .route("/api/{credential}/{key}", get(get_value).put(set_value))
        .route("/api/{credential}/", get(get_value).put(set_value))
        .layer(trace)
        .layer(cors)
        .with_state(handler)
}

async fn get_value(State(handler): State<Arc<RequestHandler>>, uri: Uri) -> Response {
    let (credential, key) = path_params(&uri);
    value_response(handler.get(credential, key).await)
}

async fn set_value(
    State(handler): State<Arc<RequestHandler>>,
    uri: Uri,
    body: Body,
) -> Response {
    let (credential, key) = path_params(&uri);
    empty_response(handler.set(credential, key, body).await)
}

/// Credential and key segments of `/api/{credential}/{key}`, percent-decoded
/// to raw bytes
///
/// Decoding happens here rather than in `Path`, which insists on UTF-8 and
/// would answer before the credential is checked. A missing key segment
/// decodes to an empty key.
fn path_params(uri: &Uri) -> (Vec<u8>, Vec<u8>) {
    let rest = uri.path().strip_prefix("/api/").unwrap_or_default();
    let (credential, key) = rest.split_once('/').unwrap_or((rest, ""));
    (decode_segment(credential), decode_segment(key))
}

fn decode_segment(segment: &str) -> Vec<u8> {
    urlencoding::decode_binary(segment.as_bytes()).into_owned()
}

fn value_response(result: Result<Vec<u8>, RequestError>) -> Response {
    match result {
        Ok(value) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            value,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

fn empty_response(result: Result<(), RequestError>) -> Response {
    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        match &self {
            RequestError::Storage(e) => tracing::error!("Storage failure: {}", e),
            RequestError::InvalidInput(reason) => tracing::debug!("Invalid input: {}", reason),
            RequestError::Unauthorized | RequestError::NotFound => {}
        }
        self.status_code().into_response()
    }
}
