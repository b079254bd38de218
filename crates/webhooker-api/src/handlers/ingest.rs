//! Webhook ingestion: validate, authenticate, persist.
//!
//! A request moves through `Received → Validated → Authenticated →
//! Persisted` and is rejected at the first gate it fails. Nothing is written
//! before the last step, and a completed append is never undone.

use std::error::Error as _;

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::LengthLimitError;
use thiserror::Error;
use tracing::{error, info, instrument, warn, Span};
use webhooker_core::{CoreError, MessageId};

use crate::{
    state::AppState,
    validation::{InboundRequest, ValidationError},
};

/// Body returned for an accepted message.
pub const ACCEPTED_BODY: &str = "message created";

/// Progress of a single ingestion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    /// Request arrived, nothing checked yet.
    Received,
    /// Passed media type, size and schema checks.
    Validated,
    /// Token matched a provisioned credential.
    Authenticated,
    /// Message appended to the store.
    Persisted,
}

/// Reasons an ingestion request is rejected.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Request failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Token is unknown or could not be checked.
    #[error("User token is invalid")]
    Unauthorized,

    /// The message store refused the append.
    #[error("Internal server error")]
    StorageFailure(#[source] CoreError),

    /// Anything else, such as a body that could not be read.
    #[error("Internal server error")]
    Internal(String),
}

impl IngestError {
    /// Stable name of the rejection kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.kind(),
            Self::Unauthorized => "Unauthorized",
            Self::StorageFailure(_) => "StorageFailure",
            Self::Internal(_) => "Internal",
        }
    }

    /// HTTP status for this rejection.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(e) => e.status(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::StorageFailure(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Accepts a webhook message.
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 415: Content type is not `application/json`
/// - 413: Body larger than the configured cap
/// - 400: Malformed JSON, unknown, invalid or missing fields, empty body
/// - 401: Unknown token
/// - 500: Storage or internal errors
#[instrument(
    name = "ingest_webhook",
    skip_all,
    fields(
        content_length = headers.get("content-length").and_then(|v| v.to_str().ok()).unwrap_or("unknown"),
        channel = tracing::field::Empty,
        message_len = tracing::field::Empty,
    )
)]
pub async fn ingest_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let mut stage = IngestStage::Received;

    match ingest(&state, &headers, body, &mut stage).await {
        Ok(message_id) => {
            info!(message_id = %message_id, "message accepted");
            (StatusCode::CREATED, ACCEPTED_BODY).into_response()
        },
        Err(e) => {
            match &e {
                IngestError::StorageFailure(source) => {
                    error!(stage = ?stage, kind = e.kind(), error = %source, "message not stored");
                },
                IngestError::Internal(detail) => {
                    error!(stage = ?stage, kind = e.kind(), error = %detail, "webhook failed");
                },
                _ => warn!(stage = ?stage, kind = e.kind(), "webhook rejected"),
            }
            e.into_response()
        },
    }
}

/// Runs one request through every gate, recording how far it got.
///
/// # Errors
///
/// Returns the first gate that rejected the request.
pub async fn ingest(
    state: &AppState,
    headers: &HeaderMap,
    body: Body,
    stage: &mut IngestStage,
) -> Result<MessageId, IngestError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    state.validator.check_media_type(content_type)?;

    let bytes = read_body(body, state.validator.max_body_bytes()).await?;
    let InboundRequest { token, channel, message } =
        state.validator.validate(content_type, &bytes)?;

    let span = Span::current();
    span.record("channel", channel.as_str());
    span.record("message_len", message.len());
    *stage = IngestStage::Validated;

    if !state.authenticator.authenticate(&token).await.is_valid() {
        return Err(IngestError::Unauthorized);
    }
    *stage = IngestStage::Authenticated;

    let received_at = state.clock.now_utc();
    let message_id =
        state.messages.append(message, received_at).await.map_err(IngestError::StorageFailure)?;
    *stage = IngestStage::Persisted;

    Ok(message_id)
}

/// Buffers the body, refusing to read past `limit` bytes.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, IngestError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if is_length_limit(&e) {
            IngestError::Validation(ValidationError::PayloadTooLarge { limit })
        } else {
            IngestError::Internal(format!("failed to read request body: {e}"))
        }
    })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.is::<LengthLimitError>() {
            return true;
        }
        source = cause.source();
    }
    false
}
