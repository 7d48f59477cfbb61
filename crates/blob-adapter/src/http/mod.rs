//! HTTP surface for static file serving.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;

mod outcome;

pub use outcome::{StaticError, StaticOutcome};

use crate::adapter::CollectionAdapter;
use crate::host::{GeneratedAdapter, PrefixResolver, QueryPrefixResolver};

/// Route the static handler is mounted at.
pub const FILE_ROUTE: &str = "/:collection/file/*filename";

/// Collections served by the router, keyed by slug.
#[derive(Clone)]
pub struct StaticState {
    collections: Arc<HashMap<String, CollectionAdapter>>,
    resolver: Arc<dyn PrefixResolver>,
}

impl StaticState {
    pub fn new(resolver: impl PrefixResolver + 'static) -> Self {
        Self {
            collections: Arc::new(HashMap::new()),
            resolver: Arc::new(resolver),
        }
    }

    pub fn with_collection(mut self, adapter: CollectionAdapter) -> Self {
        Arc::make_mut(&mut self.collections).insert(adapter.collection().slug.clone(), adapter);
        self
    }

    fn collection(&self, slug: &str) -> Option<&CollectionAdapter> {
        self.collections.get(slug)
    }
}

impl Default for StaticState {
    fn default() -> Self {
        Self::new(QueryPrefixResolver)
    }
}

/// Serve a stored file, forwarding failures to [`StaticError`].
pub async fn serve_file(
    State(state): State<StaticState>,
    Path((collection, filename)): Path<(String, String)>,
    request: Request,
) -> Result<Response, StaticError> {
    let Some(adapter) = state.collection(&collection) else {
        return Err(StaticError::UnknownCollection(collection));
    };

    let (parts, _body) = request.into_parts();
    adapter
        .static_handler(&parts, &filename, state.resolver.as_ref())
        .await
        .into_result()
}

/// Fallback for unrouted requests. Same body as a missing file, as JSON when
/// the client asks for it.
pub async fn not_found_handler(headers: HeaderMap) -> Response {
    let wants_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"));

    if wants_json {
        (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
    } else {
        outcome::not_found()
    }
}

/// Router serving every collection in `state` at [`FILE_ROUTE`].
pub fn router(state: StaticState, log_level: tracing::Level) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    Router::new()
        .route(FILE_ROUTE, get(serve_file))
        .fallback(not_found_handler)
        .with_state(state)
        .layer(trace_layer)
}
