//! ID token claim decoding and checks
//!
//! Decodes the payload of a compact JWT and checks the claims an implicit
//! flow relying party is responsible for: issuer, audience, nonce, validity
//! window and the `at_hash` binding between ID token and access token.
//!
//! Signature verification is not performed here.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{OidcWebError, Result};

/// Allowed clock skew for `exp` and `iat` checks.
pub const CLOCK_SKEW_SECONDS: i64 = 60;

/// `aud` is either a single client id or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == client_id,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Claims of an OpenID Connect ID token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Audience,
    pub exp: i64,
    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// What the relying party expects to find in the claims.
#[derive(Debug, Clone)]
pub struct ClaimExpectations<'a> {
    pub issuer: &'a str,
    pub client_id: &'a str,
    pub nonce: &'a str,
    /// Current time, seconds since the epoch.
    pub now: i64,
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    OidcWebError::ResponseValidation(message.into()).into()
}

/// Decodes the payload of `id_token` into typed claims and the raw JSON.
pub fn decode_claims(id_token: &str) -> Result<(IdTokenClaims, Value)> {
    let parts: Vec<&str> = id_token.split('.').collect();
    if parts.len() != 3 {
        return Err(invalid("id_token is not a compact JWT"));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| invalid(format!("id_token payload is not base64url: {e}")))?;

    let raw: Value = serde_json::from_slice(&payload)
        .map_err(|e| invalid(format!("id_token payload is not JSON: {e}")))?;

    let claims: IdTokenClaims = serde_json::from_value(raw.clone())
        .map_err(|e| invalid(format!("id_token is missing required claims: {e}")))?;

    Ok((claims, raw))
}

/// Checks issuer, audience, nonce and validity window.
pub fn verify_claims(claims: &IdTokenClaims, expected: &ClaimExpectations<'_>) -> Result<()> {
    if claims.iss.trim_end_matches('/') != expected.issuer.trim_end_matches('/') {
        return Err(invalid(format!(
            "issuer mismatch: expected {}, got {}",
            expected.issuer, claims.iss
        )));
    }

    if !claims.aud.contains(expected.client_id) {
        return Err(invalid(format!(
            "id_token audience does not include client {}",
            expected.client_id
        )));
    }

    match claims.nonce.as_deref() {
        None => return Err(invalid("id_token carries no nonce")),
        Some(nonce) if nonce != expected.nonce => {
            return Err(invalid("nonce mismatch"));
        }
        Some(_) => {}
    }

    if claims.exp.saturating_add(CLOCK_SKEW_SECONDS) < expected.now {
        return Err(invalid(format!("id_token expired at {}", claims.exp)));
    }

    if claims.iat > expected.now.saturating_add(CLOCK_SKEW_SECONDS) {
        return Err(invalid(format!("id_token issued in the future at {}", claims.iat)));
    }

    Ok(())
}

/// Computes the `at_hash` value for `access_token`: the left half of its
/// SHA-256 digest, base64url encoded without padding.
pub fn access_token_hash(access_token: &str) -> String {
    let digest = Sha256::digest(access_token.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

/// Checks `at_hash` against `access_token` when the claim is present.
pub fn verify_at_hash(claims: &IdTokenClaims, access_token: &str) -> Result<()> {
    match claims.at_hash.as_deref() {
        None => Ok(()),
        Some(expected) if expected == access_token_hash(access_token) => Ok(()),
        Some(_) => Err(invalid("at_hash does not match access_token")),
    }
}
