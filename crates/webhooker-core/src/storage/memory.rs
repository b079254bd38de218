//! In-memory store implementations for testing.
//!
//! Deterministic stand-ins for the PostgreSQL repositories. Both support
//! injecting failures so callers can exercise their error paths without a
//! database.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CredentialStore, MessageStore, MessageStream, StoreFuture};
use crate::{
    error::{CoreError, Result},
    models::{MessageId, StoredCredential, StoredMessage, TokenDigest},
};

/// In-memory credential store.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    credentials: Arc<RwLock<Vec<StoredCredential>>>,
    lookup_error: Arc<RwLock<Option<String>>>,
    register_error: Arc<RwLock<Option<String>>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent lookup fail with a database error.
    pub async fn fail_lookups(&self, reason: impl Into<String>) {
        *self.lookup_error.write().await = Some(reason.into());
    }

    /// Makes every subsequent registration fail with a database error.
    pub async fn fail_registrations(&self, reason: impl Into<String>) {
        *self.register_error.write().await = Some(reason.into());
    }

    /// Number of stored credentials.
    pub async fn len(&self) -> usize {
        self.credentials.read().await.len()
    }

    /// Returns whether no credentials are stored.
    pub async fn is_empty(&self) -> bool {
        self.credentials.read().await.is_empty()
    }

    async fn insert(&self, digest: TokenDigest) -> Result<StoredCredential> {
        if let Some(reason) = self.register_error.read().await.clone() {
            return Err(CoreError::Database(reason));
        }

        let mut credentials = self.credentials.write().await;
        if credentials.iter().any(|c| c.token_hash == digest) {
            return Err(CoreError::ConstraintViolation("token digest already exists".into()));
        }

        let credential =
            StoredCredential { id: Uuid::new_v4(), token_hash: digest, created_at: Utc::now() };
        credentials.push(credential.clone());
        Ok(credential)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn lookup(&self, digest: TokenDigest) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            if let Some(reason) = self.lookup_error.read().await.clone() {
                return Err(CoreError::Database(reason));
            }
            Ok(self.credentials.read().await.iter().any(|c| c.token_hash == digest))
        })
    }

    fn register(&self, digest: TokenDigest) -> StoreFuture<'_, StoredCredential> {
        Box::pin(self.insert(digest))
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            match self.lookup_error.read().await.clone() {
                Some(reason) => Err(CoreError::Database(reason)),
                None => Ok(()),
            }
        })
    }
}

/// Where a listing should break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListFailure {
    /// Fail before yielding anything.
    Immediately,
    /// Yield this many messages, then fail.
    After(usize),
}

/// In-memory append-only message store.
#[derive(Clone, Default)]
pub struct MemoryMessageStore {
    messages: Arc<RwLock<Vec<StoredMessage>>>,
    append_error: Arc<RwLock<Option<String>>>,
    list_failure: Arc<RwLock<Option<ListFailure>>>,
}

impl MemoryMessageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent append fail with a database error.
    pub async fn fail_appends(&self, reason: impl Into<String>) {
        *self.append_error.write().await = Some(reason.into());
    }

    /// Makes listings fail before the first message.
    pub async fn fail_listing(&self) {
        *self.list_failure.write().await = Some(ListFailure::Immediately);
    }

    /// Makes listings fail after `count` messages have been yielded.
    pub async fn fail_listing_after(&self, count: usize) {
        *self.list_failure.write().await = Some(ListFailure::After(count));
    }

    /// Snapshot of stored messages in arrival order.
    pub async fn messages(&self) -> Vec<StoredMessage> {
        self.messages.read().await.clone()
    }

    /// Number of stored messages.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Returns whether no messages are stored.
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl MessageStore for MemoryMessageStore {
    fn append(&self, message: String, received_at: DateTime<Utc>) -> StoreFuture<'_, MessageId> {
        Box::pin(async move {
            if let Some(reason) = self.append_error.read().await.clone() {
                return Err(CoreError::Database(reason));
            }

            let id = MessageId::new();
            self.messages.write().await.push(StoredMessage { id, message, received_at });
            Ok(id)
        })
    }

    fn list_all(&self) -> MessageStream {
        let messages = self.messages.clone();
        let list_failure = self.list_failure.clone();

        let listing = async move {
            let snapshot = messages.read().await.clone();
            let failure = *list_failure.read().await;

            let mut items: Vec<Result<StoredMessage>> = match failure {
                Some(ListFailure::Immediately) => Vec::new(),
                Some(ListFailure::After(count)) => {
                    snapshot.into_iter().take(count).map(Ok).collect()
                },
                None => snapshot.into_iter().map(Ok).collect(),
            };
            if failure.is_some() {
                items.push(Err(CoreError::Database("injected listing failure".into())));
            }

            futures::stream::iter(items)
        };

        Box::pin(futures::stream::once(listing).flatten())
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { Ok(()) })
    }
}
