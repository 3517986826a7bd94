//! OpenID provider metadata discovery
//!
//! Implements OpenID Connect Discovery 1.0 with the RFC 8414 fallback so a
//! relying party can locate the authorization and registration endpoints of
//! a provider from its issuer URI alone.
//!
//! # Candidate order
//!
//! 1. `<issuer>/.well-known/openid-configuration` (path appending)
//! 2. `<origin>/.well-known/openid-configuration<path>` (path insertion)
//! 3. `<origin>/.well-known/oauth-authorization-server<path>` (RFC 8414)
//!
//! For an issuer without a path the three candidates collapse to two.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OidcWebError, Result};

/// Metadata document describing an OpenID provider.
///
/// # Examples
///
/// ```
/// use oidc_web::rp::ProviderMetadata;
///
/// let json = r#"{
///     "issuer": "https://oidc.example.com",
///     "authorization_endpoint": "https://oidc.example.com/authorize",
///     "registration_endpoint": "https://oidc.example.com/register",
///     "response_types_supported": ["id_token token"]
/// }"#;
///
/// let meta: ProviderMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(meta.issuer, "https://oidc.example.com");
/// assert!(meta.token_endpoint.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// The issuer identifier; ID tokens must carry it as `iss`.
    pub issuer: String,

    pub authorization_endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Dynamic Client Registration endpoint (RFC 7591).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    #[serde(default)]
    pub response_types_supported: Vec<String>,

    /// Additional fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Builds the discovery URLs to try for `issuer`, in order.
pub fn candidate_urls(issuer: &Url) -> Vec<Url> {
    let path = issuer.path().trim_end_matches('/').to_string();
    let mut candidates = Vec::with_capacity(3);

    let mut appended = issuer.clone();
    appended.set_path(&format!("{}/.well-known/openid-configuration", path));
    appended.set_query(None);
    appended.set_fragment(None);
    candidates.push(appended);

    if !path.is_empty() {
        let mut inserted = issuer.clone();
        inserted.set_path(&format!("/.well-known/openid-configuration{}", path));
        inserted.set_query(None);
        inserted.set_fragment(None);
        candidates.push(inserted);
    }

    let mut oauth = issuer.clone();
    oauth.set_path(&format!("/.well-known/oauth-authorization-server{}", path));
    oauth.set_query(None);
    oauth.set_fragment(None);
    candidates.push(oauth);

    candidates
}

/// Fetches the provider metadata for `issuer`.
///
/// Tries each of [`candidate_urls`] in order and returns the first document
/// that parses.
///
/// # Errors
///
/// Returns [`OidcWebError::Discovery`] if `issuer` is not a URL or no
/// candidate yields a metadata document.
pub async fn fetch_provider_metadata(
    http: &reqwest::Client,
    issuer: &str,
) -> Result<ProviderMetadata> {
    let issuer_url = Url::parse(issuer)
        .map_err(|e| OidcWebError::Discovery(format!("invalid issuer url {issuer}: {e}")))?;

    for candidate in candidate_urls(&issuer_url) {
        tracing::debug!(url = %candidate, "Trying provider discovery endpoint");

        let resp = match http.get(candidate.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(url = %candidate, error = %e, "Discovery request failed");
                continue;
            }
        };

        if !resp.status().is_success() {
            continue;
        }

        match resp.json::<ProviderMetadata>().await {
            Ok(meta) => return Ok(meta),
            Err(e) => {
                tracing::debug!(url = %candidate, error = %e, "Discovery document did not parse");
            }
        }
    }

    Err(OidcWebError::Discovery(format!("provider metadata not found for {issuer}")).into())
}
