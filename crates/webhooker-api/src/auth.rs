//! Bearer token authentication against the credential store.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{debug, warn};
use webhooker_core::CredentialStore;

use crate::crypto::hash_token;

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// The token matches a provisioned credential.
    Valid,
    /// The token is unknown or could not be checked.
    Invalid,
}

impl AuthDecision {
    /// Returns whether the token was accepted.
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Checks raw tokens by hashing them and looking the digest up.
///
/// Store failures are logged and collapse to [`AuthDecision::Invalid`], so a
/// caller cannot tell an unknown token from an unreachable store.
#[derive(Clone)]
pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
}

impl Authenticator {
    /// Creates an authenticator over the given credential store.
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }

    /// Decides whether `raw_token` is a provisioned credential.
    pub async fn authenticate(&self, raw_token: &str) -> AuthDecision {
        if raw_token.is_empty() {
            return AuthDecision::Invalid;
        }

        match self.credentials.lookup(hash_token(raw_token)).await {
            Ok(true) => AuthDecision::Valid,
            Ok(false) => {
                debug!("token not found");
                AuthDecision::Invalid
            },
            Err(e) => {
                warn!(error = %e, "credential lookup failed");
                AuthDecision::Invalid
            },
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use webhooker_core::storage::memory::MemoryCredentialStore;

    use super::*;

    async fn authenticator_with(token: &str) -> (Authenticator, MemoryCredentialStore) {
        let store = MemoryCredentialStore::new();
        store.register(hash_token(token)).await.expect("register");
        (Authenticator::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn known_token_is_valid() {
        let (auth, _) = authenticator_with("known").await;
        assert_eq!(auth.authenticate("known").await, AuthDecision::Valid);
        assert!(auth.authenticate("known").await.is_valid());
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let (auth, _) = authenticator_with("known").await;
        assert_eq!(auth.authenticate("unknown").await, AuthDecision::Invalid);
        assert_eq!(auth.authenticate("").await, AuthDecision::Invalid);
        assert!(!AuthDecision::Invalid.is_valid());
    }

    #[tokio::test]
    async fn store_failure_collapses_to_invalid() {
        let (auth, store) = authenticator_with("known").await;
        store.fail_lookups("connection refused").await;

        assert_eq!(auth.authenticate("known").await, AuthDecision::Invalid);
    }

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn missing_or_malformed_header_yields_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
