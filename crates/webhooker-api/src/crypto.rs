//! Token generation and hashing.
//!
//! Issued tokens are 64 characters drawn without repetition: every digit,
//! two symbols and the remaining positions filled with letters, then
//! shuffled. Only the SHA-512 digest of a token is ever persisted.

use rand::{rngs::OsRng, seq::SliceRandom, CryptoRng, Rng};
use webhooker_core::TokenDigest;

/// Length of an issued token.
pub const TOKEN_LEN: usize = 64;

/// Digits in an issued token.
pub const TOKEN_DIGITS: usize = 10;

/// Symbols in an issued token.
pub const TOKEN_SYMBOLS: usize = 2;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"~!@#$%^&*()_+-={}[]:<>?,./";

/// Hashes a raw token into its stored form.
///
/// # Example
///
/// ```
/// use webhooker_api::crypto::hash_token;
///
/// assert_eq!(hash_token("token"), hash_token("token"));
/// assert_ne!(hash_token("token"), hash_token("other"));
/// ```
pub fn hash_token(raw: &str) -> TokenDigest {
    TokenDigest::of_token(raw)
}

/// Generates a fresh token from the operating system RNG.
pub fn generate_token() -> String {
    generate_token_with(&mut OsRng)
}

/// Generates a token from the given cryptographic RNG.
pub fn generate_token_with<R: Rng + CryptoRng + ?Sized>(rng: &mut R) -> String {
    let letters = TOKEN_LEN - TOKEN_DIGITS - TOKEN_SYMBOLS;

    let mut chars: Vec<u8> = Vec::with_capacity(TOKEN_LEN);
    chars.extend(LETTERS.choose_multiple(rng, letters));
    chars.extend(DIGITS.choose_multiple(rng, TOKEN_DIGITS));
    chars.extend(SYMBOLS.choose_multiple(rng, TOKEN_SYMBOLS));
    chars.shuffle(rng);

    chars.into_iter().map(char::from).collect()
}
