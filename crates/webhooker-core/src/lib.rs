//! Core domain types and storage collaborators.
//!
//! Provides the persisted message and credential models, the storage error
//! taxonomy, the clock abstraction used to stamp accepted messages, and the
//! credential and message store seams the HTTP layer depends on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{MessageId, StoredMessage, TokenDigest};
pub use storage::{CredentialStore, MessageStore, MessageStream, Storage};
pub use time::{Clock, RealClock, TestClock};
