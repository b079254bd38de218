//! Integration tests for `GET /wall`.

mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Request, StatusCode,
    },
};
use chrono::{TimeZone, Utc};
use common::{body_text, TestEnv, TOKEN};
use webhooker_core::MessageStore;

/// A posted message shows up on the wall.
#[tokio::test]
async fn posted_message_appears_on_wall() {
    let env = TestEnv::new().await;
    env.post_message("hello").await;

    let response = env.get_wall().await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("text/plain; charset=utf-8")
    );
    assert!(body_text(response).await.contains("Message: hello\n"));
}

/// Entries are rendered in arrival order with their server timestamps.
#[tokio::test]
async fn wall_lists_entries_in_arrival_order() {
    let env = TestEnv::new().await;
    env.clock.jump_to(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
    env.post_message("first").await;
    env.clock.advance(Duration::from_secs(61));
    env.post_message("second").await;

    let body = body_text(env.get_wall().await).await;

    assert_eq!(
        body,
        "Time: 2024-05-01T08:00:00.000000Z\nMessage: first\n\n\
         Time: 2024-05-01T08:01:01.000000Z\nMessage: second\n\n"
    );
}

/// An empty store yields an empty, successful wall.
#[tokio::test]
async fn empty_wall_is_ok() {
    let env = TestEnv::new().await;

    let response = env.get_wall().await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "");
}

/// A read failure before any entry is a 500.
#[tokio::test]
async fn read_failure_is_internal_error() {
    let env = TestEnv::new().await;
    env.post_message("hidden").await;
    env.messages.fail_listing().await;

    let response = env.get_wall().await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Internal server error");
}

/// A failure after entries were sent aborts the body instead of ending it
/// cleanly.
#[tokio::test]
async fn mid_stream_failure_aborts_body() {
    let env = TestEnv::new().await;
    for message in ["one", "two", "three"] {
        env.post_message(message).await;
    }
    env.messages.fail_listing_after(2).await;

    let response = env.get_wall().await;
    assert_eq!(response.status(), StatusCode::OK);

    let result = axum::body::to_bytes(response.into_body(), usize::MAX).await;
    assert!(result.is_err());
}

/// Messages stored directly are rendered the same way as posted ones.
#[tokio::test]
async fn wall_reads_from_the_store() {
    let env = TestEnv::new().await;
    let at = Utc.with_ymd_and_hms(2020, 2, 29, 12, 0, 0).unwrap();
    env.messages.append("direct".into(), at).await.expect("append");

    let body = body_text(env.get_wall().await).await;

    assert_eq!(body, "Time: 2020-02-29T12:00:00.000000Z\nMessage: direct\n\n");
}

/// With wall authentication on, a bearer token is required.
#[tokio::test]
async fn wall_auth_requires_valid_token() {
    let env = TestEnv::new().await.configure(|state| state.with_wall_auth(true));
    env.post_message("secret").await;

    let response = env.get_wall().await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/wall")
        .header(AUTHORIZATION, "Bearer wrong-token")
        .body(Body::empty())
        .expect("request build");
    let response = env.send(wrong).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, "User token is invalid");

    let right = Request::builder()
        .uri("/wall")
        .header(AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .expect("request build");
    let response = env.send(right).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Message: secret"));
}

/// Without wall authentication, no header is needed.
#[tokio::test]
async fn wall_is_open_by_default() {
    let env = TestEnv::new().await;

    assert_eq!(env.get_wall().await.status(), StatusCode::OK);
}
