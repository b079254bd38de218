//! Repository for accepted webhook messages.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::{MessageStore, MessageStream, StoreFuture};
use crate::{
    error::{CoreError, Result},
    models::{MessageId, StoredMessage},
};

/// Rows buffered between the database cursor and the consumer.
const STREAM_BUFFER: usize = 64;

/// PostgreSQL repository for the `messages` table.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Inserts a message.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn create(&self, message: &str, received_at: DateTime<Utc>) -> Result<MessageId> {
        let id = MessageId::new();

        sqlx::query("INSERT INTO messages (id, message, received_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(message)
            .bind(received_at)
            .execute(&*self.pool)
            .await?;

        Ok(id)
    }

    /// Streams all messages in arrival order.
    ///
    /// A background task drains the database cursor into a bounded channel.
    /// Dropping the returned stream closes the channel, which cancels the
    /// query even while it is waiting on the database.
    pub fn stream_all(&self) -> MessageStream {
        let pool = self.pool.clone();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            let rows = sqlx::query_as::<_, StoredMessage>(
                "SELECT id, message, received_at FROM messages ORDER BY received_at, seq",
            )
            .fetch(&*pool);

            forward_rows(rows, tx).await;
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

/// Moves rows into `tx` until the cursor is exhausted or the receiver is
/// dropped. A failed row is forwarded and ends the stream.
async fn forward_rows<S>(mut rows: S, tx: mpsc::Sender<Result<StoredMessage>>)
where
    S: Stream<Item = std::result::Result<StoredMessage, sqlx::Error>> + Unpin,
{
    loop {
        let row = tokio::select! {
            row = rows.next() => row,
            () = tx.closed() => {
                debug!("message stream consumer went away");
                return;
            },
        };

        let Some(row) = row else {
            return;
        };

        let failed = row.is_err();
        if tx.send(row.map_err(CoreError::from)).await.is_err() {
            debug!("message stream consumer went away");
            return;
        }
        if failed {
            return;
        }
    }
}

impl MessageStore for Repository {
    fn append(&self, message: String, received_at: DateTime<Utc>) -> StoreFuture<'_, MessageId> {
        Box::pin(async move { self.create(&message, received_at).await })
    }

    fn list_all(&self) -> MessageStream {
        self.stream_all()
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.pool).await?;
            Ok(())
        })
    }
}
