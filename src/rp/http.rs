//! HTTP relying party
//!
//! [`HttpRelyingParty`] implements [`RelyingParty`] for public browser
//! clients using the implicit flow:
//!
//! 1. Discover the provider metadata ([`discovery`]).
//! 2. Register a client through Dynamic Client Registration (RFC 7591).
//! 3. Build authorization requests with a random `state` and `nonce`,
//!    remembering both in the storage medium.
//! 4. Validate the fragment response against the remembered request and the
//!    ID token claims ([`id_token`]).
//!
//! # References
//!
//! - OpenID Connect Core 1.0, section 3.2 (Implicit Flow)
//! - RFC 7591 Dynamic Client Registration <https://www.rfc-editor.org/rfc/rfc7591>

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OidcWebError, Result};
use crate::rp::discovery::{self, ProviderMetadata};
use crate::rp::id_token::{self, ClaimExpectations};
use crate::rp::{
    AuthRequestOptions, ClientRegistration, ProviderInfo, RegistrationRequest, RelyingParty,
    RpOptions,
};
use crate::session::Session;
use crate::storage::StorageMedium;

/// Namespace for pending authorization requests kept in the medium.
pub const REQUESTS_NAMESPACE: &str = "oidc.rp.requests";

/// Client name sent during registration when none is configured.
pub const DEFAULT_CLIENT_NAME: &str = "oidc-web";

/// An authorization request awaiting its response, keyed by `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub state: String,
    pub nonce: String,
    pub client_id: String,
    pub provider: String,
    pub redirect_uri: String,
    pub response_type: String,
}

/// Minimal Dynamic Client Registration response (RFC 7591).
#[derive(Debug, Deserialize)]
struct DcrResponse {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uris: Option<Vec<String>>,
}

/// Relying party speaking to providers over HTTP.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use oidc_web::rp::HttpRelyingParty;
///
/// let rp = HttpRelyingParty::new(Arc::new(reqwest::Client::new()))
///     .with_client_name("My App");
/// assert_eq!(rp.client_name(), "My App");
/// ```
pub struct HttpRelyingParty {
    http: Arc<reqwest::Client>,
    client_name: String,
}

impl HttpRelyingParty {
    /// Creates a relying party sharing `http` for all provider calls.
    pub fn new(http: Arc<reqwest::Client>) -> Self {
        Self {
            http,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
        }
    }

    /// Sets the `client_name` sent during registration.
    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Medium key of the pending request for `state`.
    pub fn pending_key(state: &str) -> String {
        format!("{REQUESTS_NAMESPACE}.{state}")
    }

    /// Provider metadata stored with the registration, or freshly discovered.
    async fn metadata_for(&self, rp: &ClientRegistration) -> Result<ProviderMetadata> {
        match rp.provider.metadata {
            Some(ref metadata) => Ok(metadata.clone()),
            None => discovery::fetch_provider_metadata(&self.http, rp.provider_url()).await,
        }
    }

    /// 16 random bytes encoded as base64url without padding.
    fn generate_random() -> String {
        use rand::RngCore as _;
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    fn build_authorization_url(
        metadata: &ProviderMetadata,
        rp: &ClientRegistration,
        options: &AuthRequestOptions,
        pending: &PendingRequest,
    ) -> Result<String> {
        let mut url = Url::parse(&metadata.authorization_endpoint).map_err(|e| {
            OidcWebError::AuthRequest(format!("invalid authorization endpoint URL: {e}"))
        })?;

        let scope = options.scope.clone().unwrap_or_else(|| rp.request_scope());

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", &pending.response_type);
            query.append_pair("client_id", &rp.client_id);
            query.append_pair("redirect_uri", &pending.redirect_uri);
            query.append_pair("scope", &scope);
            query.append_pair("state", &pending.state);
            query.append_pair("nonce", &pending.nonce);
            if let Some(ref prompt) = options.prompt {
                query.append_pair("prompt", prompt);
            }
            if let Some(ref hint) = options.login_hint {
                query.append_pair("login_hint", hint);
            }
        }

        Ok(url.to_string())
    }

    fn load_pending(store: &dyn StorageMedium, state: &str) -> Result<Option<PendingRequest>> {
        match store.get_item(&Self::pending_key(state))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    OidcWebError::ResponseValidation(message.into()).into()
}

/// Absolute expiry for an `expires_in` value, in whole seconds so it matches
/// the stored representation. Unparseable or out of range values give `None`.
fn expires_at_from(now: i64, expires_in: &str) -> Option<DateTime<Utc>> {
    let secs = expires_in.trim().parse::<i64>().ok()?;
    let at = now.checked_add(secs)?;
    Utc.timestamp_opt(at, 0).single()
}

#[async_trait]
impl RelyingParty for HttpRelyingParty {
    async fn register(
        &self,
        provider: &str,
        registration: &RegistrationRequest,
        options: &RpOptions,
    ) -> Result<ClientRegistration> {
        let metadata = discovery::fetch_provider_metadata(&self.http, provider).await?;

        let endpoint = metadata.registration_endpoint.clone().ok_or_else(|| {
            OidcWebError::Registration(format!(
                "{provider} does not advertise a registration endpoint"
            ))
        })?;

        let body = serde_json::json!({
            "client_name": self.client_name,
            "redirect_uris": registration.redirect_uris,
            "grant_types": registration.grant_types,
            "response_types": registration.response_types,
            "scope": registration.scope,
            "application_type": "web",
            "token_endpoint_auth_method": "none",
        });

        tracing::info!(provider = %provider, endpoint = %endpoint, "Registering public client");

        let resp = self
            .http
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| OidcWebError::Registration(format!("registration request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(OidcWebError::Registration(format!(
                "registration endpoint returned {status}: {text}"
            ))
            .into());
        }

        let dcr: DcrResponse = resp.json().await.map_err(|e| {
            OidcWebError::Registration(format!("failed to parse registration response: {e}"))
        })?;

        Ok(ClientRegistration {
            provider: ProviderInfo {
                url: provider.to_string(),
                metadata: Some(metadata),
            },
            client_id: dcr.client_id,
            client_secret: dcr.client_secret,
            redirect_uris: dcr
                .redirect_uris
                .unwrap_or_else(|| registration.redirect_uris.clone()),
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
        store: &dyn StorageMedium,
    ) -> Result<String> {
        let metadata = self.metadata_for(rp).await?;

        let redirect_uri = rp
            .redirect_uri()
            .ok_or_else(|| {
                OidcWebError::AuthRequest("registration has no redirect uri".to_string())
            })?
            .to_string();

        let pending = PendingRequest {
            state: Self::generate_random(),
            nonce: Self::generate_random(),
            client_id: rp.client_id.clone(),
            provider: rp.provider_url().to_string(),
            redirect_uri,
            response_type: rp.request_response_type(),
        };

        let uri = Self::build_authorization_url(&metadata, rp, options, &pending)?;

        store.set_item(
            &Self::pending_key(&pending.state),
            &serde_json::to_string(&pending)?,
        )?;

        Ok(uri)
    }

    async fn validate_response(
        &self,
        rp: &ClientRegistration,
        response_uri: &str,
        store: &dyn StorageMedium,
    ) -> Result<Session> {
        let url = Url::parse(response_uri)
            .map_err(|e| invalid(format!("response uri does not parse: {e}")))?;

        let params: HashMap<String, String> =
            url::form_urlencoded::parse(url.fragment().unwrap_or_default().as_bytes())
                .into_owned()
                .collect();

        if let Some(error) = params.get("error") {
            let description = params
                .get("error_description")
                .map(String::as_str)
                .unwrap_or_default();
            return Err(invalid(format!("provider returned {error}: {description}")));
        }

        let state = params
            .get("state")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("response carries no state"))?;

        let pending = Self::load_pending(store, state)?
            .ok_or_else(|| invalid("no pending authorization request for response state"))?;

        if pending.client_id != rp.client_id {
            return Err(invalid("response state belongs to a different client"));
        }

        let id_token = params
            .get("id_token")
            .ok_or_else(|| invalid("response carries no id_token"))?;

        let (claims, raw_claims) = id_token::decode_claims(id_token)?;

        let now = Utc::now().timestamp();
        let issuer = rp
            .provider
            .metadata
            .as_ref()
            .map(|m| m.issuer.as_str())
            .unwrap_or_else(|| rp.provider_url());

        id_token::verify_claims(
            &claims,
            &ClaimExpectations {
                issuer,
                client_id: &rp.client_id,
                nonce: &pending.nonce,
                now,
            },
        )?;

        let access_token = params.get("access_token").cloned();
        if let Some(ref token) = access_token {
            id_token::verify_at_hash(&claims, token)?;
        }

        let expires_at = params
            .get("expires_in")
            .and_then(|secs| expires_at_from(now, secs));

        tracing::info!(
            provider = %rp.provider_url(),
            subject = %claims.sub,
            "Authentication response validated"
        );

        Ok(Session {
            idp: Some(rp.provider_url().to_string()),
            client_id: Some(rp.client_id.clone()),
            id_token: Some(id_token.clone()),
            access_token,
            token_type: params.get("token_type").cloned(),
            expires_at,
            subject: Some(claims.sub),
            id_claims: Some(raw_claims),
        })
    }
}
