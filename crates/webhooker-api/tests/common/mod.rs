//! Shared fixtures for HTTP-level tests.
//!
//! Wires the router over in-memory stores and a frozen clock, with one
//! provisioned token ready to use.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, Response, StatusCode},
    Router,
};
use tower::ServiceExt;
use webhooker_api::{crypto::hash_token, create_router, AppState};
use webhooker_core::{
    storage::memory::{MemoryCredentialStore, MemoryMessageStore},
    CredentialStore, TestClock,
};

/// Token provisioned in every test environment.
pub const TOKEN: &str = "integration-test-token";

/// In-memory application with handles to its collaborators.
pub struct TestEnv {
    pub credentials: MemoryCredentialStore,
    pub messages: MemoryMessageStore,
    pub clock: TestClock,
    state: AppState,
}

impl TestEnv {
    /// Creates an environment with [`TOKEN`] registered.
    pub async fn new() -> Self {
        let credentials = MemoryCredentialStore::new();
        credentials.register(hash_token(TOKEN)).await.expect("register token");

        let messages = MemoryMessageStore::new();
        let clock = TestClock::new();
        let state = AppState::new(Arc::new(credentials.clone()), Arc::new(messages.clone()))
            .with_clock(Arc::new(clock.clone()));

        Self { credentials, messages, clock, state }
    }

    /// Applies a change to the application state before building the router.
    pub fn configure(mut self, f: impl FnOnce(AppState) -> AppState) -> Self {
        self.state = f(self.state);
        self
    }

    /// Builds a fresh router over this environment.
    pub fn app(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Sends one request through a fresh router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app().oneshot(request).await.expect("request execution")
    }

    /// Posts a JSON body to `/webhook`.
    pub async fn post_webhook(&self, body: impl Into<Body>) -> Response<Body> {
        self.send(webhook_request("application/json", body)).await
    }

    /// Posts a valid message with [`TOKEN`].
    pub async fn post_message(&self, message: &str) -> Response<Body> {
        let body = serde_json::json!({"token": TOKEN, "channel": "general", "message": message});
        let response = self.post_webhook(body.to_string()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response
    }

    /// Fetches `/wall`.
    pub async fn get_wall(&self) -> Response<Body> {
        self.send(Request::builder().uri("/wall").body(Body::empty()).expect("request build"))
            .await
    }
}

/// Builds a `POST /webhook` request with the given content type.
pub fn webhook_request(content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header(CONTENT_TYPE, content_type)
        .body(body.into())
        .expect("request build")
}

/// Reads a response body to a string.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes =
        axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body extraction");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
