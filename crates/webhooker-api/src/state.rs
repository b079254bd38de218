//! Shared application state injected into the router.

use std::sync::Arc;

use webhooker_core::{Clock, CredentialStore, MessageStore, RealClock, Storage};

use crate::{auth::Authenticator, validation::RequestValidator};

/// Collaborators and settings every handler needs.
///
/// Built once at startup and cloned per request; all fields are cheap
/// handles.
#[derive(Clone)]
pub struct AppState {
    /// Provisioned token digests
    pub credentials: Arc<dyn CredentialStore>,
    /// Accepted messages
    pub messages: Arc<dyn MessageStore>,
    /// Source of acceptance timestamps
    pub clock: Arc<dyn Clock>,
    /// Request validation rules
    pub validator: RequestValidator,
    /// Token checks against `credentials`
    pub authenticator: Authenticator,
    /// Whether `GET /wall` needs a bearer token
    pub wall_requires_token: bool,
}

impl AppState {
    /// Creates state over the given stores with the default validator and a
    /// real clock.
    pub fn new(credentials: Arc<dyn CredentialStore>, messages: Arc<dyn MessageStore>) -> Self {
        Self {
            authenticator: Authenticator::new(credentials.clone()),
            credentials,
            messages,
            clock: Arc::new(RealClock::new()),
            validator: RequestValidator::default(),
            wall_requires_token: false,
        }
    }

    /// Creates state backed by the PostgreSQL repositories.
    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(storage.tokens.clone(), storage.messages.clone())
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the body size cap.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.validator = RequestValidator::new(max_body_bytes);
        self
    }

    /// Gates the wall behind bearer authentication.
    #[must_use]
    pub fn with_wall_auth(mut self, required: bool) -> Self {
        self.wall_requires_token = required;
        self
    }
}
