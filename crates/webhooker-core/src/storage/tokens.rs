//! Repository for provisioned token digests.
//!
//! Rows are written once at issuance and never updated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{CredentialStore, StoreFuture};
use crate::{
    error::Result,
    models::{StoredCredential, TokenDigest},
};

/// PostgreSQL repository for the `tokens` table.
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

    /// Returns whether a token with this digest has been provisioned.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn exists(&self, digest: &TokenDigest) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM tokens WHERE token_hash = $1)")
            .bind(digest.as_str())
            .fetch_one(&*self.pool)
            .await?;

        Ok(row.try_get::<bool, _>(0)?)
    }

    /// Inserts a new digest.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConstraintViolation` if the digest already exists.
    pub async fn create(&self, digest: &TokenDigest) -> Result<StoredCredential> {
        let id = Uuid::new_v4();
        let created_at: DateTime<Utc> = Utc::now();

        sqlx::query("INSERT INTO tokens (id, token_hash, created_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(digest.as_str())
            .bind(created_at)
            .execute(&*self.pool)
            .await?;

        Ok(StoredCredential { id, token_hash: digest.clone(), created_at })
    }

    /// Counts provisioned tokens.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tokens").fetch_one(&*self.pool).await?;

        Ok(count.0)
    }
}

impl CredentialStore for Repository {
    fn lookup(&self, digest: TokenDigest) -> StoreFuture<'_, bool> {
        Box::pin(async move { self.exists(&digest).await })
    }

    fn register(&self, digest: TokenDigest) -> StoreFuture<'_, StoredCredential> {
        Box::pin(async move { self.create(&digest).await })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.pool).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repository_can_be_created() {
        let pool = sqlx::PgPool::connect_lazy("postgresql://test").unwrap();
        let repo = Repository::new(Arc::new(pool));
        let _store: &dyn CredentialStore = &repo;
    }
}
