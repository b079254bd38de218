//! HTTP request handlers.
//!
//! - `ingest` - `POST /webhook`
//! - `wall` - `GET /wall`
//! - `health` - `GET /health` and `GET /live`
//!
//! Every handler turns its failures into a plain-text response; collaborator
//! errors are logged in full and answered generically.

pub mod health;
pub mod ingest;
pub mod wall;

pub use health::{health_check, liveness_check};
pub use ingest::ingest_webhook;
pub use wall::read_wall;
