//! Token issuance.

use std::fmt;

use tracing::info;
use webhooker_core::{CredentialStore, Result};

use crate::crypto::{generate_token, hash_token};

/// A freshly issued token. The raw secret exists only in this value.
pub struct IssuedToken {
    /// The secret to hand to the client
    pub token: String,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken").field("token", &"<redacted>").finish()
    }
}

/// Generates a token and registers its digest.
///
/// # Errors
///
/// Returns the store's error if the digest could not be persisted; no token
/// is returned in that case.
pub async fn issue_token(credentials: &dyn CredentialStore) -> Result<IssuedToken> {
    let token = generate_token();
    let credential = credentials.register(hash_token(&token)).await?;

    info!(credential_id = %credential.id, "token issued");
    Ok(IssuedToken { token })
}
