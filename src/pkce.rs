//! PKCE (Proof Key for Code Exchange) helpers for the Spotify authorization
//! code flow.
//!
//! All randomness comes from the operating system's secure generator. When
//! that source is unavailable the helpers fail with
//! [`CryptoError::CryptoUnavailable`] instead of falling back to a weaker
//! generator; login cannot proceed without it.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::errors::CryptoError;

/// Number of random bytes behind a code verifier (43 base64url characters).
pub const VERIFIER_BYTES: usize = 32;

/// Number of random bytes behind an OAuth `state` nonce.
pub const STATE_BYTES: usize = 16;

/// A verifier together with the challenge derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkcePair {
    /// Generates a fresh verifier and derives its S256 challenge.
    pub fn generate() -> Result<Self, CryptoError> {
        let code_verifier = generate_code_verifier()?;
        let code_challenge = generate_code_challenge(&code_verifier);
        Ok(Self {
            code_verifier,
            code_challenge,
        })
    }
}

fn secure_random_string(len: usize) -> Result<String, CryptoError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::CryptoUnavailable(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generates a code verifier from 32 bytes of OS randomness, base64url
/// encoded without padding.
///
/// # Errors
///
/// Returns [`CryptoError::CryptoUnavailable`] if the secure random source
/// cannot be read.
pub fn generate_code_verifier() -> Result<String, CryptoError> {
    secure_random_string(VERIFIER_BYTES)
}

/// Computes the S256 code challenge for a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generates the single-use `state` nonce sent with the authorization
/// request.
pub fn generate_state() -> Result<String, CryptoError> {
    secure_random_string(STATE_BYTES)
}
