//! Relying-party capability
//!
//! The orchestrator never speaks the OpenID Connect protocol itself.  It
//! hands registration, authorization request construction and response
//! validation to an implementation of [`RelyingParty`], and only keeps the
//! resulting [`ClientRegistration`] records in storage.
//!
//! # Module Layout
//!
//! - [`discovery`] -- OpenID provider metadata discovery
//! - [`fake`]      -- in-process recording implementation for tests
//! - [`http`]      -- [`HttpRelyingParty`], discovery + dynamic registration
//!   + implicit-flow requests over HTTP
//! - [`id_token`]  -- ID token claim decoding and checks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OidcWebError, Result};
use crate::session::Session;
use crate::storage::StorageMedium;

pub mod discovery;
pub mod fake;
pub mod http;
pub mod id_token;

pub use discovery::ProviderMetadata;
pub use fake::FakeRelyingParty;
pub use http::HttpRelyingParty;

/// Grant type requested for public browser clients.
pub const DEFAULT_GRANT_TYPE: &str = "implicit";

/// Response type requested for public browser clients.
pub const DEFAULT_RESPONSE_TYPE: &str = "id_token token";

/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "openid profile";

// ---------------------------------------------------------------------------
// Registration inputs
// ---------------------------------------------------------------------------

/// Caller-supplied registration settings.
///
/// Every field is optional; unset fields fall back to configured defaults
/// and then to the public-client defaults ([`DEFAULT_GRANT_TYPE`],
/// [`DEFAULT_RESPONSE_TYPE`], [`DEFAULT_SCOPE`], current location).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterOptions {
    /// Provider URI used when no explicit provider is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Redirect URI to register.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types: Option<Vec<String>>,

    /// Space separated scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl RegisterOptions {
    /// Returns these options with unset fields taken from `defaults`.
    pub fn or_defaults(&self, defaults: &RegisterOptions) -> RegisterOptions {
        RegisterOptions {
            issuer: self.issuer.clone().or_else(|| defaults.issuer.clone()),
            redirect_uri: self
                .redirect_uri
                .clone()
                .or_else(|| defaults.redirect_uri.clone()),
            grant_types: self
                .grant_types
                .clone()
                .or_else(|| defaults.grant_types.clone()),
            response_types: self
                .response_types
                .clone()
                .or_else(|| defaults.response_types.clone()),
            scope: self.scope.clone().or_else(|| defaults.scope.clone()),
        }
    }
}

/// Client metadata sent to the provider's registration endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub issuer: String,
    pub grant_types: Vec<String>,
    pub redirect_uris: Vec<String>,
    pub response_types: Vec<String>,
    pub scope: String,
}

/// Defaults applied to every authentication request of a registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticateDefaults {
    pub redirect_uri: String,
    pub response_type: String,
    #[serde(default)]
    pub scope: Vec<String>,
}

/// Relying-party behaviour settings stored with a registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpDefaults {
    /// Use proof-of-possession token semantics.
    #[serde(default)]
    pub pop_token: bool,

    #[serde(default)]
    pub authenticate: AuthenticateDefaults,
}

/// Options handed to [`RelyingParty::register`] next to the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpOptions {
    pub defaults: RpDefaults,
}

/// Per-request overrides for [`RelyingParty::create_request`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthRequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// OIDC `prompt` parameter (e.g. `login`, `consent`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
}

// ---------------------------------------------------------------------------
// ClientRegistration
// ---------------------------------------------------------------------------

/// The provider a registration belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider (issuer) URI; also the key of the registration in storage.
    pub url: String,

    /// Discovered provider metadata, when the relying party fetched it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ProviderMetadata>,
}

/// A dynamically registered OIDC client for one provider.
///
/// Created lazily on the first interaction with a provider and cached under
/// `oidc.clients.<provider>` until storage is cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub provider: ProviderInfo,

    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub redirect_uris: Vec<String>,

    #[serde(default)]
    pub grant_types: Vec<String>,

    #[serde(default)]
    pub response_types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default)]
    pub defaults: RpDefaults,
}

impl ClientRegistration {
    /// Rebuilds a registration from its stored JSON form.
    ///
    /// Bound as the reconstruction hook of the client store.  Records without
    /// a provider URI or client id are rejected.
    pub fn from_json(value: Value) -> Result<Self> {
        let registration: ClientRegistration = serde_json::from_value(value)?;

        if registration.provider.url.is_empty() {
            return Err(
                OidcWebError::Storage("stored registration has no provider url".to_string()).into(),
            );
        }
        if registration.client_id.is_empty() {
            return Err(
                OidcWebError::Storage("stored registration has no client id".to_string()).into(),
            );
        }

        Ok(registration)
    }

    /// Provider (issuer) URI this client is registered with.
    pub fn provider_url(&self) -> &str {
        &self.provider.url
    }

    /// Redirect URI used for authentication requests.
    pub fn redirect_uri(&self) -> Option<&str> {
        let configured = self.defaults.authenticate.redirect_uri.as_str();
        if !configured.is_empty() {
            return Some(configured);
        }
        self.redirect_uris.first().map(String::as_str)
    }

    /// Scope used for authentication requests.
    pub fn request_scope(&self) -> String {
        if !self.defaults.authenticate.scope.is_empty() {
            return self.defaults.authenticate.scope.join(" ");
        }
        self.scope
            .clone()
            .unwrap_or_else(|| DEFAULT_SCOPE.to_string())
    }

    /// Response type used for authentication requests.
    pub fn request_response_type(&self) -> String {
        if !self.defaults.authenticate.response_type.is_empty() {
            return self.defaults.authenticate.response_type.clone();
        }
        self.response_types
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_RESPONSE_TYPE.to_string())
    }
}

// ---------------------------------------------------------------------------
// RelyingParty
// ---------------------------------------------------------------------------

/// The OpenID Connect relying-party protocol, consumed as a capability.
///
/// `store` is the same medium the orchestrator's stores live on, so an
/// implementation can keep per-request state (nonces and the like) next to
/// the correlation records.
#[async_trait]
pub trait RelyingParty: Send + Sync {
    /// Registers a client with `provider` and returns the registration.
    async fn register(
        &self,
        provider: &str,
        registration: &RegistrationRequest,
        options: &RpOptions,
    ) -> Result<ClientRegistration>;

    /// Builds an authorization request URI.
    ///
    /// The URI must carry a `state` query parameter.
    async fn create_request(
        &self,
        rp: &ClientRegistration,
        options: &AuthRequestOptions,
        store: &dyn StorageMedium,
    ) -> Result<String>;

    /// Validates the authentication response found in `response_uri`.
    async fn validate_response(
        &self,
        rp: &ClientRegistration,
        response_uri: &str,
        store: &dyn StorageMedium,
    ) -> Result<Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> ClientRegistration {
        ClientRegistration {
            provider: ProviderInfo {
                url: "https://oidc.example.com".to_string(),
                metadata: None,
            },
            client_id: "client-1".to_string(),
            client_secret: None,
            redirect_uris: vec!["https://app.com/callback".to_string()],
            grant_types: vec![DEFAULT_GRANT_TYPE.to_string()],
            response_types: vec![DEFAULT_RESPONSE_TYPE.to_string()],
            scope: Some(DEFAULT_SCOPE.to_string()),
            defaults: RpDefaults::default(),
        }
    }

    #[test]
    fn test_or_defaults_prefers_explicit_values() {
        let explicit = RegisterOptions {
            redirect_uri: Some("https://app.com/a".to_string()),
            ..RegisterOptions::default()
        };
        let defaults = RegisterOptions {
            redirect_uri: Some("https://app.com/b".to_string()),
            scope: Some("openid".to_string()),
            ..RegisterOptions::default()
        };

        let merged = explicit.or_defaults(&defaults);
        assert_eq!(merged.redirect_uri.as_deref(), Some("https://app.com/a"));
        assert_eq!(merged.scope.as_deref(), Some("openid"));
        assert!(merged.grant_types.is_none());
    }

    #[test]
    fn test_from_json_roundtrip() {
        let original = registration();
        let value = serde_json::to_value(&original).unwrap();
        assert_eq!(ClientRegistration::from_json(value).unwrap(), original);
    }

    #[test]
    fn test_from_json_rejects_missing_client_id() {
        let mut original = registration();
        original.client_id.clear();
        let value = serde_json::to_value(&original).unwrap();
        assert!(ClientRegistration::from_json(value).is_err());
    }

    #[test]
    fn test_request_defaults_fall_back_to_registration() {
        let rp = registration();
        assert_eq!(rp.redirect_uri(), Some("https://app.com/callback"));
        assert_eq!(rp.request_scope(), "openid profile");
        assert_eq!(rp.request_response_type(), "id_token token");
    }

    #[test]
    fn test_authenticate_defaults_take_precedence() {
        let mut rp = registration();
        rp.defaults.authenticate = AuthenticateDefaults {
            redirect_uri: "https://app.com/other".to_string(),
            response_type: "id_token".to_string(),
            scope: vec!["openid".to_string()],
        };
        assert_eq!(rp.redirect_uri(), Some("https://app.com/other"));
        assert_eq!(rp.request_scope(), "openid");
        assert_eq!(rp.request_response_type(), "id_token");
    }
}
