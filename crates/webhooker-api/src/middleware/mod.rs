//! HTTP middleware.
//!
//! Bearer authentication for routes that are not authenticated by their
//! request body, currently the optional gate in front of `GET /wall`.
pub mod auth;
