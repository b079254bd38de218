//! Request validation for inbound webhook calls.
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. declared media type must be `application/json`
//! 2. body size must not exceed the configured cap
//! 3. body must be a single JSON object with only `token`, `channel` and
//!    `message` keys, each holding a string
//! 4. all three fields must be present and non-empty
//!
//! Validation is pure. It never touches the stores.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, Visitor};
use serde_json::error::Category;
use thiserror::Error;

/// Default request body cap (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

/// The only accepted media type.
pub const JSON_MEDIA_TYPE: &str = "application/json";

const FIELDS: &[&str] = &["token", "channel", "message"];

/// A webhook call that passed validation.
#[derive(Clone, PartialEq, Eq)]
pub struct InboundRequest {
    /// Bearer token presented by the caller
    pub token: String,
    /// Channel name, accepted and logged but not persisted
    pub channel: String,
    /// Message body to store
    pub message: String,
}

impl fmt::Debug for InboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundRequest")
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .field("message_len", &self.message.len())
            .finish()
    }
}

/// Reasons a request is rejected before authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Content type is missing or not `application/json`.
    #[error("Content-Type header set to application/json is required")]
    UnsupportedMediaType,

    /// Body exceeds the configured cap.
    #[error("Request body must not be larger than {limit} bytes")]
    PayloadTooLarge {
        /// Configured cap in bytes
        limit: usize,
    },

    /// Body is not well-formed JSON, or not a single JSON object.
    #[error("Request body contains badly-formed JSON (at position {position})")]
    MalformedJson {
        /// Byte offset where parsing failed
        position: usize,
    },

    /// A known field holds something other than a string.
    #[error("Request body contains an invalid value for the \"{field}\" field (at position {position})")]
    InvalidFieldType {
        /// Offending field
        field: &'static str,
        /// Byte offset where parsing failed
        position: usize,
    },

    /// The object contains a key outside `token`, `channel`, `message`.
    #[error("Request body contains unknown field \"{field}\"")]
    UnknownField {
        /// Offending key as sent
        field: String,
    },

    /// The body is empty or whitespace only.
    #[error("Request body must not be empty")]
    EmptyBody,

    /// A required field is absent, null or empty.
    #[error("Request body is missing required field \"{field}\"")]
    MissingRequiredField {
        /// Missing field
        field: &'static str,
    },
}

impl ValidationError {
    /// Stable name of the rejection kind, used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType => "UnsupportedMediaType",
            Self::PayloadTooLarge { .. } => "PayloadTooLarge",
            Self::MalformedJson { .. } => "MalformedJson",
            Self::InvalidFieldType { .. } => "InvalidFieldType",
            Self::UnknownField { .. } => "UnknownField",
            Self::EmptyBody => "EmptyBody",
            Self::MissingRequiredField { .. } => "MissingRequiredField",
        }
    }

    /// HTTP status for this rejection.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MalformedJson { .. }
            | Self::InvalidFieldType { .. }
            | Self::UnknownField { .. }
            | Self::EmptyBody
            | Self::MissingRequiredField { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Validates inbound webhook calls against a body size cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestValidator {
    max_body_bytes: usize,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_BYTES)
    }
}

impl RequestValidator {
    /// Creates a validator with the given body cap.
    pub const fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }

    /// Configured body cap in bytes.
    pub const fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Runs every check in order over a fully buffered request.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn validate(
        &self,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<InboundRequest, ValidationError> {
        self.check_media_type(content_type)?;
        self.check_size(body.len())?;
        self.parse(body)
    }

    /// Checks the declared media type.
    ///
    /// Only the primary token counts: it is trimmed, compared without regard
    /// to case, and any parameters after `;` are ignored.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMediaType` for anything but `application/json`.
    pub fn check_media_type(&self, content_type: Option<&str>) -> Result<(), ValidationError> {
        let media_type = content_type.unwrap_or_default().split(';').next().unwrap_or_default();

        if media_type.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE) {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedMediaType)
        }
    }

    /// Checks a body length against the cap.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if `len` exceeds the cap.
    pub fn check_size(&self, len: usize) -> Result<(), ValidationError> {
        if len > self.max_body_bytes {
            Err(ValidationError::PayloadTooLarge { limit: self.max_body_bytes })
        } else {
            Ok(())
        }
    }

    /// Parses and schema-checks a body.
    ///
    /// # Errors
    ///
    /// Returns `EmptyBody`, `UnknownField`, `InvalidFieldType`,
    /// `MalformedJson` or `MissingRequiredField`.
    pub fn parse(&self, body: &[u8]) -> Result<InboundRequest, ValidationError> {
        if body.iter().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
            return Err(ValidationError::EmptyBody);
        }

        let mut fault = None;
        let mut deserializer = serde_json::Deserializer::from_slice(body);
        let parsed = RequestSeed { fault: &mut fault }
            .deserialize(&mut deserializer)
            .and_then(|raw| deserializer.end().map(|()| raw));

        let raw = parsed.map_err(|err| {
            let position = byte_offset(body, err.line(), err.column());
            match (err.classify(), fault) {
                (Category::Data, Some(FieldFault::Unknown(field))) => {
                    ValidationError::UnknownField { field }
                },
                (Category::Data, Some(FieldFault::InvalidType(field))) => {
                    ValidationError::InvalidFieldType { field, position }
                },
                _ => ValidationError::MalformedJson { position },
            }
        })?;

        raw.into_request()
    }
}

/// Fields as read off the wire, before the presence check.
#[derive(Default)]
struct RawRequest {
    token: Option<String>,
    channel: Option<String>,
    message: Option<String>,
}

impl RawRequest {
    fn into_request(self) -> Result<InboundRequest, ValidationError> {
        let token = required(self.token, "token")?;
        let channel = required(self.channel, "channel")?;
        let message = required(self.message, "message")?;

        Ok(InboundRequest { token, channel, message })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value.filter(|v| !v.is_empty()).ok_or(ValidationError::MissingRequiredField { field })
}

/// What the visitor saw when it bailed out.
///
/// serde_json only reports a category and a position, so the visitor records
/// the field it was working on for the error mapping in `parse`.
enum FieldFault {
    Unknown(String),
    InvalidType(&'static str),
}

struct RequestSeed<'a> {
    fault: &'a mut Option<FieldFault>,
}

impl<'de> DeserializeSeed<'de> for RequestSeed<'_> {
    type Value = RawRequest;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for RequestSeed<'_> {
    type Value = RawRequest;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let fault = self.fault;
        let mut raw = RawRequest::default();

        while let Some(key) = map.next_key::<String>()? {
            let (field, slot) = match key.as_str() {
                "token" => ("token", &mut raw.token),
                "channel" => ("channel", &mut raw.channel),
                "message" => ("message", &mut raw.message),
                _ => {
                    let err = de::Error::unknown_field(&key, FIELDS);
                    *fault = Some(FieldFault::Unknown(key));
                    return Err(err);
                },
            };

            match map.next_value::<Option<String>>() {
                Ok(value) => *slot = value,
                Err(err) => {
                    *fault = Some(FieldFault::InvalidType(field));
                    return Err(err);
                },
            }
        }

        Ok(raw)
    }
}

/// Converts serde_json's 1-based line and byte column into a byte offset.
fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    let line_start: usize =
        body.split(|&b| b == b'\n').take(line.saturating_sub(1)).map(|l| l.len() + 1).sum();

    (line_start + column).min(body.len())
}
