//! Webhooker HTTP API.
//!
//! `POST /webhook` runs a request through validation, bearer token
//! authentication and persistence; `GET /wall` streams every accepted message
//! as plain text. The stores are injected through [`AppState`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod crypto;
pub mod handlers;
pub mod middleware;
pub mod provision;
pub mod server;
pub mod state;
pub mod tls;
pub mod validation;

pub use auth::{AuthDecision, Authenticator};
pub use config::Config;
pub use server::{create_router, create_router_with_timeout, serve_tls, shutdown_signal};
pub use state::AppState;
pub use validation::{InboundRequest, RequestValidator, ValidationError};
