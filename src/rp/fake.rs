//! In-process fake relying party for unit and integration tests
//!
//! [`FakeRelyingParty`] implements [`RelyingParty`] without any network I/O.
//! It records every call so tests can assert on how the orchestrator drives
//! the protocol:
//!
//! - [`FakeRelyingParty::register_calls`] -- providers registered with
//! - [`FakeRelyingParty::create_request_calls`] -- client ids requests were built for
//! - [`FakeRelyingParty::validate_calls`] -- `(provider, response uri)` pairs validated
//!
//! Authorization requests carry a fixed `state` (see
//! [`FakeRelyingParty::with_state`]) so the test knows which correlation
//! record to expect.
//!
//! # Example
//!
//! ```
//! use oidc_web::rp::{FakeRelyingParty, RelyingParty, RegistrationRequest, RpOptions};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let rp = FakeRelyingParty::new();
//! let request = RegistrationRequest {
//!     issuer: "https://oidc.example.com".to_string(),
//!     grant_types: vec!["implicit".to_string()],
//!     redirect_uris: vec!["https://app.com/".to_string()],
//!     response_types: vec!["id_token token".to_string()],
//!     scope: "openid profile".to_string(),
//! };
//!
//! let registration = rp
//!     .register("https://oidc.example.com", &request, &RpOptions::default())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(registration.provider_url(), "https://oidc.example.com");
//! assert_eq!(rp.register_calls(), vec!["https://oidc.example.com".to_string()]);
//! # }
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::error::{OidcWebError, Result};
use crate::rp::{
    AuthRequestOptions, ClientRegistration, ProviderInfo, RegistrationRequest, RelyingParty,
    RpOptions,
};
use crate::session::Session;
use crate::storage::StorageMedium;

/// `state` used by authorization requests unless overridden.
pub const DEFAULT_FAKE_STATE: &str = "fake-state";

#[derive(Debug, Default)]
struct Calls {
    register: Vec<String>,
    create_request: Vec<String>,
    validate: Vec<(String, String)>,
}

/// Recording [`RelyingParty`] for tests.
#[derive(Debug)]
pub struct FakeRelyingParty {
    state: String,
    validation_error: Option<String>,
    calls: Mutex<Calls>,
}

impl Default for FakeRelyingParty {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRelyingParty {
    /// Creates a fake that succeeds on every call.
    pub fn new() -> Self {
        Self {
            state: DEFAULT_FAKE_STATE.to_string(),
            validation_error: None,
            calls: Mutex::new(Calls::default()),
        }
    }

    /// Uses `state` in every authorization request.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Makes [`RelyingParty::validate_response`] fail with `message`.
    pub fn fail_validation(mut self, message: impl Into<String>) -> Self {
        self.validation_error = Some(message.into());
        self
    }

    /// The `state` placed in authorization requests.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Client id assigned to registrations with `provider`.
    pub fn client_id_for(provider: &str) -> String {
        format!("client-for-{}", provider.trim_end_matches('/'))
    }

    pub fn register_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.register.clone())
            .unwrap_or_default()
    }

    pub fn create_request_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.create_request.clone())
            .unwrap_or_default()
    }

    pub fn validate_calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .map(|c| c.validate.clone())
            .unwrap_or_default()
    }

    fn record(&self, f: impl FnOnce(&mut Calls)) {
        if let Ok(mut calls) = self.calls.lock() {
            f(&mut calls);
        }
    }
}

#[async_trait]
impl RelyingParty for FakeRelyingParty {
    async fn register(
        &self,
        provider: &str,
        registration: &RegistrationRequest,
        options: &RpOptions,
    ) -> Result<ClientRegistration> {
        self.record(|c| c.register.push(provider.to_string()));

        Ok(ClientRegistration {
            provider: ProviderInfo {
                url: provider.to_string(),
                metadata: None,
            },
            client_id: Self::client_id_for(provider),
            client_secret: None,
            redirect_uris: registration.redirect_uris.clone(),
            grant_types: registration.grant_types.clone(),
            response_types: registration.response_types.clone(),
            scope: Some(registration.scope.clone()),
            defaults: options.defaults.clone(),
        })
    }

    async fn create_request(
        &self,
        rp: &ClientRegistration,
        options: &AuthRequestOptions,
        _store: &dyn StorageMedium,
    ) -> Result<String> {
        self.record(|c| c.create_request.push(rp.client_id.clone()));

        let base = format!("{}/authorize", rp.provider_url().trim_end_matches('/'));
        let mut url = Url::parse(&base)
            .map_err(|e| OidcWebError::AuthRequest(format!("invalid provider url: {e}")))?;

        let scope = options.scope.clone().unwrap_or_else(|| rp.request_scope());
        url.query_pairs_mut()
            .append_pair("response_type", &rp.request_response_type())
            .append_pair("client_id", &rp.client_id)
            .append_pair("redirect_uri", rp.redirect_uri().unwrap_or_default())
            .append_pair("scope", &scope)
            .append_pair("state", &self.state)
            .append_pair("nonce", "fake-nonce");

        Ok(url.to_string())
    }

    async fn validate_response(
        &self,
        rp: &ClientRegistration,
        response_uri: &str,
        _store: &dyn StorageMedium,
    ) -> Result<Session> {
        self.record(|c| {
            c.validate
                .push((rp.provider_url().to_string(), response_uri.to_string()))
        });

        if let Some(ref message) = self.validation_error {
            return Err(OidcWebError::ResponseValidation(message.clone()).into());
        }

        let fragment = Url::parse(response_uri)
            .ok()
            .and_then(|u| u.fragment().map(str::to_string))
            .unwrap_or_default();
        let param = |name: &str| {
            url::form_urlencoded::parse(fragment.as_bytes())
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        Ok(Session {
            idp: Some(rp.provider_url().to_string()),
            client_id: Some(rp.client_id.clone()),
            id_token: param("id_token"),
            access_token: param("access_token"),
            token_type: param("token_type"),
            expires_at: None,
            subject: Some("fake-subject".to_string()),
            id_claims: None,
        })
    }
}
