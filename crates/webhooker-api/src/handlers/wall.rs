//! Plain-text listing of every accepted message.
//!
//! Entries are streamed as they come off the store. A read failure before
//! the first entry yields a 500; once the response has started, a failure
//! aborts the connection so a truncated wall is never mistaken for a
//! complete one.

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::SecondsFormat;
use futures::{stream, StreamExt};
use thiserror::Error;
use tracing::{debug, error, instrument};
use webhooker_core::{CoreError, StoredMessage};

use crate::state::AppState;

/// Content type of the wall.
pub const WALL_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Failure to produce the wall.
#[derive(Debug, Error)]
pub enum WallError {
    /// The message store could not be read.
    #[error("Internal server error")]
    ReadFailure(#[source] CoreError),
}

impl WallError {
    /// Stable name of the failure kind, used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ReadFailure(_) => "ReadFailure",
        }
    }

    /// HTTP status for this failure.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ReadFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WallError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Renders one wall entry.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use webhooker_api::handlers::wall::format_entry;
/// use webhooker_core::{MessageId, StoredMessage};
///
/// let entry = StoredMessage {
///     id: MessageId::new(),
///     message: "hello".into(),
///     received_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
/// };
/// assert_eq!(format_entry(&entry), "Time: 2024-03-01T09:30:00.000000Z\nMessage: hello\n\n");
/// ```
pub fn format_entry(entry: &StoredMessage) -> String {
    format!(
        "Time: {}\nMessage: {}\n\n",
        entry.received_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        entry.message
    )
}

/// Streams the wall as plain text.
#[instrument(name = "read_wall", skip_all)]
pub async fn read_wall(State(state): State<AppState>) -> Response {
    let mut messages = state.messages.list_all();

    let first = match messages.next().await {
        Some(Err(e)) => {
            error!(error = %e, "wall read failed");
            return WallError::ReadFailure(e).into_response();
        },
        first => first,
    };

    let entries = stream::iter(first).chain(messages).map(|item| match item {
        Ok(entry) => Ok(Bytes::from(format_entry(&entry))),
        Err(e) => {
            error!(error = %e, "wall read failed mid-stream, aborting response");
            Err(e)
        },
    });

    debug!("streaming wall");
    (StatusCode::OK, [(CONTENT_TYPE, WALL_CONTENT_TYPE)], Body::from_stream(entries)).into_response()
}
