//! Health check handlers for service monitoring.
//!
//! `/health` pings both stores and reports 503 if either is down; `/live`
//! only proves the process is answering.

use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, instrument};
use webhooker_core::storage::StoreFuture;

use crate::state::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks
    pub checks: HealthChecks,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All stores reachable
    Healthy,
    /// At least one store unreachable
    Unhealthy,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Credential store reachability
    pub credentials: ComponentHealth,
    /// Message store reachability
    pub messages: ComponentHealth,
}

/// Health status for individual components.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Optional error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

/// Component-level health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Up,
    /// Component is experiencing issues
    Down,
}

async fn check_component(name: &'static str, ping: StoreFuture<'_, ()>) -> ComponentHealth {
    let started = Instant::now();
    let result = ping.await;
    let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(()) => {
            debug!(component = name, "health check passed");
            ComponentHealth { status: ComponentStatus::Up, message: None, response_time_ms }
        },
        Err(e) => {
            error!(component = name, error = %e, "health check failed");
            ComponentHealth {
                status: ComponentStatus::Down,
                message: Some(format!("{name} store unreachable")),
                response_time_ms,
            }
        },
    }
}

/// Health check endpoint handler.
#[instrument(name = "health_check", skip_all)]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let timestamp = state.clock.now_utc();
    let (credentials, messages) = futures::join!(
        check_component("credential", state.credentials.ping()),
        check_component("message", state.messages.ping()),
    );

    let status = if credentials.status == ComponentStatus::Up
        && messages.status == ComponentStatus::Up
    {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    let status_code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        timestamp,
        checks: HealthChecks { credentials, messages },
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response)).into_response()
}

/// Liveness check endpoint.
///
/// Does not touch any store.
#[instrument(name = "liveness_check", skip_all)]
pub async fn liveness_check(State(state): State<AppState>) -> Response {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": state.clock.now_utc(),
        "service": "webhooker",
    });

    (StatusCode::OK, Json(response)).into_response()
}
