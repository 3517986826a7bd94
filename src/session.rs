//! The resolved login session
//!
//! A [`Session`] is the credential bundle a provider issued for the current
//! user.  The orchestrator persists it under the `oidc.session` key,
//! replaces it wholesale on every successful login and removes it on logout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Provider-issued credentials for the logged-in user.
///
/// [`Session::default`] is the empty session handed out when nobody is
/// logged in.
///
/// # Examples
///
/// ```
/// use oidc_web::Session;
///
/// let empty = Session::default();
/// assert!(!empty.has_credentials());
///
/// let session = Session {
///     idp: Some("https://oidc.example.com".to_string()),
///     access_token: Some("abc".to_string()),
///     token_type: Some("Bearer".to_string()),
///     ..Session::default()
/// };
/// assert!(session.has_credentials());
/// assert_eq!(session.authorization_header().as_deref(), Some("Bearer abc"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Issuer URI of the provider that authenticated the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idp: Option<String>,

    /// Client id of the relying party the tokens were issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Raw ID token (compact JWT).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Access token, when the response type included `token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Token type reported with the access token, typically `Bearer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Absolute expiry derived from `expires_in`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    /// Subject (`sub`) of the ID token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Decoded ID token claims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_claims: Option<Value>,
}

impl Session {
    /// Rebuilds a session from its stored JSON form.
    ///
    /// Bound as the reconstruction hook of the session store.
    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns `true` when the session carries an ID or access token.
    pub fn has_credentials(&self) -> bool {
        self.id_token.is_some() || self.access_token.is_some()
    }

    /// Returns `true` once `expires_at` has passed.  Sessions without an
    /// expiry never expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => Utc::now() >= expires_at,
        }
    }

    /// Value for an HTTP `Authorization` header, if an access token exists.
    pub fn authorization_header(&self) -> Option<String> {
        let token = self.access_token.as_ref()?;
        let token_type = self.token_type.as_deref().unwrap_or("Bearer");
        Some(format!("{token_type} {token}"))
    }
}
