//! Bearer token gate for read endpoints.
//!
//! Uses the same [`Authenticator`](crate::auth::Authenticator) as ingestion
//! and answers with the same generic 401, so callers learn nothing about why
//! a token was refused.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{auth::extract_bearer_token, state::AppState};

/// Errors that can occur during bearer authentication.
#[derive(Debug)]
pub enum AuthError {
    /// The Authorization header is missing or not a bearer token.
    MissingHeader,
    /// The token is unknown or could not be checked.
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, "User token is invalid").into_response()
    }
}

/// Axum middleware that requires a valid bearer token.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_bearer_token(req.headers()).ok_or_else(|| {
        warn!("bearer token missing");
        AuthError::MissingHeader
    })?;

    if !state.authenticator.authenticate(token).await.is_valid() {
        warn!("bearer token rejected");
        return Err(AuthError::InvalidToken);
    }

    Ok(next.run(req).await)
}
