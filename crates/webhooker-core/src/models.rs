//! Persisted domain models and strongly-typed identifiers.
//!
//! Messages and credentials are immutable once written. Credentials only ever
//! carry the digest of a token; the raw secret has no representation here.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use uuid::Uuid;

use crate::error::CoreError;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Length of a hex-encoded SHA-512 digest.
pub const DIGEST_HEX_LEN: usize = 128;

/// Strongly-typed identifier of a stored message.
///
/// # Example
///
/// ```
/// use webhooker_core::models::MessageId;
/// let id = MessageId::new();
/// println!("stored message {id}");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for MessageId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for MessageId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for MessageId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Hex-encoded one-way digest of a bearer token.
///
/// Always [`DIGEST_HEX_LEN`] lowercase hex characters. Has no `Display`
/// impl; the `Debug` form is truncated.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenDigest(String);

impl TokenDigest {
    /// Hashes a raw token with SHA-512.
    ///
    /// Deterministic and unsalted: the same token always yields the same
    /// digest, which is what makes equality lookup in the credential store
    /// work.
    ///
    /// # Example
    ///
    /// ```
    /// use webhooker_core::TokenDigest;
    /// let digest = TokenDigest::of_token("s3cret");
    /// assert_eq!(digest, TokenDigest::of_token("s3cret"));
    /// assert_eq!(digest.as_str().len(), 128);
    /// ```
    pub fn of_token(raw: &str) -> Self {
        Self(hex::encode(Sha512::digest(raw.as_bytes())))
    }

    /// Wraps an already computed hex digest.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if the value is not a lowercase hex
    /// string of the expected length.
    pub fn from_hex(hex: impl Into<String>) -> crate::Result<Self> {
        let hex = hex.into();
        let well_formed = hex.len() == DIGEST_HEX_LEN
            && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

        if well_formed {
            Ok(Self(hex))
        } else {
            Err(CoreError::InvalidInput("token digest must be 128 lowercase hex characters".into()))
        }
    }

    /// Returns the hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenDigest({}…)", &self.0[..8.min(self.0.len())])
    }
}

/// A provisioned credential. Only the digest of the token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    /// Unique identifier of the credential row
    pub id: Uuid,
    /// Digest of the issued token
    pub token_hash: TokenDigest,
    /// When the credential was provisioned
    pub created_at: DateTime<Utc>,
}

/// A message accepted through the webhook endpoint.
///
/// `received_at` is the server clock at acceptance time, never a client
/// supplied value, so ordering by it reflects arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredMessage {
    /// Unique identifier of the message
    pub id: MessageId,
    /// Message body as submitted
    pub message: String,
    /// Acceptance timestamp
    pub received_at: DateTime<Utc>,
}
