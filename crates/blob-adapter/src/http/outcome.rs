//! Static request outcomes and the error stage they are forwarded to.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;

use crate::error::AdapterError;
use crate::key::StorageKey;
use crate::store::{ObjectStream, StoreError};

/// Result of serving one static request.
///
/// Exactly one variant is produced per request, so exactly one party writes
/// the response: the stream, or the error stage it is forwarded to.
#[derive(Debug)]
pub enum StaticOutcome {
    /// Headers are set and the body streams from the store
    Streamed(Response),
    /// The object does not exist
    NotFound(AdapterError),
    /// Any other failure
    Failed(AdapterError),
}

impl StaticOutcome {
    /// Wrap an open object in a streaming response.
    pub(crate) fn stream(key: &StorageKey, object: ObjectStream) -> Self {
        let mut builder = Response::builder().status(StatusCode::OK);
        if let Some(content_type) = &object.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type.as_str());
        }
        if let Some(size) = object.size {
            builder = builder.header(header::CONTENT_LENGTH, size);
        }

        // Headers are gone by the time the body fails; all that is left is to
        // cut the connection and say why.
        let log_key = key.to_string();
        let body = object.body.inspect_err(move |e| {
            tracing::warn!(key = %log_key, error = %e, "object stream aborted mid-response");
        });

        match builder.body(Body::from_stream(body)) {
            Ok(response) => StaticOutcome::Streamed(response),
            Err(e) => StaticOutcome::Failed(AdapterError::FetchFailed {
                key: key.to_string(),
                source: StoreError::Decode(e.to_string()),
            }),
        }
    }

    /// Classify a fetch failure.
    pub(crate) fn from_error(err: AdapterError) -> Self {
        if err.is_not_found() {
            StaticOutcome::NotFound(err)
        } else {
            StaticOutcome::Failed(err)
        }
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self, StaticOutcome::Streamed(_))
    }

    /// Split into the response or the error to forward downstream.
    pub fn into_result(self) -> Result<Response, StaticError> {
        match self {
            StaticOutcome::Streamed(response) => Ok(response),
            StaticOutcome::NotFound(err) => Err(StaticError::NotFound(err)),
            StaticOutcome::Failed(err) => Err(StaticError::Failed(err)),
        }
    }
}

/// Plain 404 shared by the error stage and the router fallback.
pub(crate) fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}

/// The error stage for static requests.
#[derive(Debug, thiserror::Error)]
pub enum StaticError {
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error(transparent)]
    NotFound(AdapterError),
    #[error(transparent)]
    Failed(AdapterError),
}

impl IntoResponse for StaticError {
    fn into_response(self) -> Response {
        match self {
            StaticError::UnknownCollection(_) | StaticError::NotFound(_) => not_found(),
            StaticError::Failed(AdapterError::InvalidKey(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid path: {}", msg),
            )
                .into_response(),
            StaticError::Failed(err) => {
                tracing::error!(error = %err, "static request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Unexpected error".to_string(),
                )
                    .into_response()
            }
        }
    }
}
