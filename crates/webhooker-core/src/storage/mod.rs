//! Storage collaborators for credentials and messages.
//!
//! The HTTP layer only sees the [`CredentialStore`] and [`MessageStore`]
//! traits. Production wires in the PostgreSQL repositories held by
//! [`Storage`]; tests use the in-memory doubles from [`memory`].
//!
//! Both stores are expected to be safe under concurrent use: credential
//! lookups are single-row reads and message appends are single-row inserts.

use std::{future::Future, pin::Pin, sync::Arc};

use chrono::{DateTime, Utc};
use futures::Stream;
use sqlx::PgPool;

pub mod memory;
pub mod messages;
pub mod tokens;

use crate::{
    error::Result,
    models::{MessageId, StoredCredential, StoredMessage, TokenDigest},
};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Stream of stored messages in arrival order.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<StoredMessage>> + Send + 'static>>;

/// Holds token digests. Raw tokens never reach this trait.
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns whether a credential with this digest exists.
    fn lookup(&self, digest: TokenDigest) -> StoreFuture<'_, bool>;

    /// Persists a newly issued credential.
    fn register(&self, digest: TokenDigest) -> StoreFuture<'_, StoredCredential>;

    /// Verifies the store is reachable.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

/// Append-only log of accepted messages.
pub trait MessageStore: Send + Sync + 'static {
    /// Appends a message stamped with its acceptance time.
    fn append(&self, message: String, received_at: DateTime<Utc>) -> StoreFuture<'_, MessageId>;

    /// Streams every stored message, oldest first.
    ///
    /// Items are yielded as they are read; an `Err` item ends the stream.
    fn list_all(&self) -> MessageStream;

    /// Verifies the store is reachable.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

/// PostgreSQL-backed repositories sharing one connection pool.
#[derive(Clone)]
pub struct Storage {
    /// Repository for provisioned token digests.
    pub tokens: Arc<tokens::Repository>,

    /// Repository for accepted messages.
    pub messages: Arc<messages::Repository>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);

        Self {
            tokens: Arc::new(tokens::Repository::new(pool.clone())),
            messages: Arc::new(messages::Repository::new(pool)),
        }
    }

    /// Creates the `tokens` and `messages` tables if they do not exist.
    ///
    /// `messages.seq` is assigned at insert time and breaks ties between
    /// messages accepted within the same microsecond.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if any DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        let pool = self.tokens.pool();

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tokens (
                id UUID PRIMARY KEY,
                token_hash TEXT NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL
            )
            ",
        )
        .execute(&*pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id UUID PRIMARY KEY,
                seq BIGSERIAL NOT NULL,
                message TEXT NOT NULL,
                received_at TIMESTAMPTZ NOT NULL
            )
            ",
        )
        .execute(&*pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_arrival
            ON messages(received_at, seq)
            ",
        )
        .execute(&*pool)
        .await?;

        Ok(())
    }

    /// Closes the underlying connection pool.
    pub async fn close(&self) {
        self.tokens.pool().close().await;
    }
}
