//! Authentication orchestrator
//!
//! [`OidcWebClient`] drives the browser-side login flow against any number of
//! OpenID providers.  Its state is never held in memory; it is derived on
//! every call from three stores on a shared medium and from the current
//! location of the browsing context:
//!
//! ```text
//! NoSession --login(redirect)--> PendingRedirect --provider redirect--> ResponseReceived
//!                                                                             |
//!        SessionEstablished <----------- session_from_response() ------------+
//! ```
//!
//! The `state` of each authorization request is the correlation key: before
//! navigating away, [`OidcWebClient::prepare_auth_request`] stores
//! `oidc.providers.<state> = <provider>` so the response can be matched back
//! to the provider (and its client registration) that issued it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::browser::location::{self, UriPart};
use crate::browser::BrowsingContext;
use crate::error::{OidcWebError, Result};
use crate::rp::{
    AuthRequestOptions, AuthenticateDefaults, ClientRegistration, RegisterOptions,
    RegistrationRequest, RelyingParty, RpDefaults, RpOptions, DEFAULT_GRANT_TYPE,
    DEFAULT_RESPONSE_TYPE, DEFAULT_SCOPE,
};
use crate::session::Session;
use crate::storage::bindings::{client_store, provider_store, session_store};
use crate::storage::{JsonStore, StorageMedium};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How [`OidcWebClient::login`] starts a login.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    /// Open the provider-selection popup.
    #[default]
    Popup,
    /// Navigate the browsing context to the provider.
    Redirect,
}

impl fmt::Display for UiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiMode::Popup => write!(f, "popup"),
            UiMode::Redirect => write!(f, "redirect"),
        }
    }
}

impl FromStr for UiMode {
    type Err = OidcWebError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "popup" => Ok(UiMode::Popup),
            "redirect" => Ok(UiMode::Redirect),
            other => Err(OidcWebError::Config(format!(
                "unknown UI mode '{other}', expected popup or redirect"
            ))),
        }
    }
}

/// Construction options for [`OidcWebClient`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Default provider; falls back to `defaults.issuer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Registration defaults merged under per-call options.
    #[serde(default)]
    pub defaults: RegisterOptions,

    /// Request proof-of-possession token semantics from the relying party.
    #[serde(default)]
    pub pop_token: bool,

    /// Mode used when a login call does not name one.
    #[serde(default)]
    pub mode: UiMode,
}

/// Options for a single [`OidcWebClient::login`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginOptions {
    pub provider: Option<String>,
    pub mode: Option<UiMode>,
    /// Registration settings used if the provider has no cached client yet.
    pub registration: RegisterOptions,
    pub request: AuthRequestOptions,
}

impl LoginOptions {
    /// Redirect login with `provider`.
    pub fn redirect(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            mode: Some(UiMode::Redirect),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// OidcWebClient
// ---------------------------------------------------------------------------

/// The login orchestrator.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use oidc_web::browser::MemoryBrowsingContext;
/// use oidc_web::rp::FakeRelyingParty;
/// use oidc_web::storage::MemoryStorage;
/// use oidc_web::{ClientOptions, LoginOptions, OidcWebClient};
///
/// # #[tokio::main]
/// # async fn main() -> oidc_web::Result<()> {
/// let browser = Arc::new(MemoryBrowsingContext::new("https://app.com/"));
/// let client = OidcWebClient::new(
///     ClientOptions::default(),
///     Arc::new(FakeRelyingParty::new()),
///     Arc::new(MemoryStorage::new()),
///     browser.clone(),
/// );
///
/// client.login(&LoginOptions::redirect("https://oidc.example.com")).await?;
/// assert!(browser
///     .last_navigation()
///     .unwrap()
///     .starts_with("https://oidc.example.com/authorize"));
/// # Ok(())
/// # }
/// ```
pub struct OidcWebClient {
    provider: Option<String>,
    defaults: RegisterOptions,
    pop_token: bool,
    mode: UiMode,
    medium: Arc<dyn StorageMedium>,
    clients: JsonStore<ClientRegistration>,
    session: JsonStore<Session>,
    providers: JsonStore<String>,
    rp: Arc<dyn RelyingParty>,
    browser: Arc<dyn BrowsingContext>,
}

impl OidcWebClient {
    /// Creates a client whose three stores share `medium`.
    pub fn new(
        options: ClientOptions,
        rp: Arc<dyn RelyingParty>,
        medium: Arc<dyn StorageMedium>,
        browser: Arc<dyn BrowsingContext>,
    ) -> Self {
        let provider = options
            .provider
            .filter(|p| !p.is_empty())
            .or_else(|| options.defaults.issuer.clone());

        Self {
            provider,
            defaults: options.defaults,
            pop_token: options.pop_token,
            mode: options.mode,
            clients: client_store(Arc::clone(&medium)),
            session: session_store(Arc::clone(&medium)),
            providers: provider_store(Arc::clone(&medium)),
            medium,
            rp,
            browser,
        }
    }

    /// Replaces the default stores.
    pub fn with_stores(
        mut self,
        clients: JsonStore<ClientRegistration>,
        session: JsonStore<Session>,
        providers: JsonStore<String>,
    ) -> Self {
        self.clients = clients;
        self.session = session;
        self.providers = providers;
        self
    }

    /// The configured default provider, if any.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn mode(&self) -> UiMode {
        self.mode
    }

    pub fn pop_token(&self) -> bool {
        self.pop_token
    }

    pub fn defaults(&self) -> &RegisterOptions {
        &self.defaults
    }

    /// The medium handed to the relying party.
    pub fn medium(&self) -> &Arc<dyn StorageMedium> {
        &self.medium
    }

    pub fn browser(&self) -> &Arc<dyn BrowsingContext> {
        &self.browser
    }

    // -----------------------------------------------------------------------
    // Session resolution
    // -----------------------------------------------------------------------

    /// The session for the current user.
    ///
    /// Tries the cached session, then an authentication response in the
    /// current location, then falls back to an empty session.  Never fails.
    pub async fn current_session(&self) -> Session {
        if let Some(session) = self.session.get(None).await {
            return session;
        }

        if let Some(session) = self.session_from_response().await {
            return session;
        }

        Session::default()
    }

    /// Resolves a session from an authentication response in the current
    /// location.
    ///
    /// Returns `None` without touching storage when the location carries no
    /// response.  Every failure past that point (unknown state, registration
    /// or validation errors, storage errors) is logged and reported as `None`.
    pub async fn session_from_response(&self) -> Option<Session> {
        if !location::current_uri_has_auth_response(self.browser.as_ref()) {
            return None;
        }

        match self.resolve_response().await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(error = %e, "Error determining current session");
                None
            }
        }
    }

    async fn resolve_response(&self) -> Result<Session> {
        let response_uri = location::current_location(self.browser.as_ref())
            .ok_or_else(|| OidcWebError::InvalidUri("no current location".to_string()))?;

        let state = location::state_from_uri(&response_uri, UriPart::Fragment)
            .ok_or_else(|| OidcWebError::InvalidUri("response carries no state".to_string()))?;

        let provider = self
            .providers
            .get(Some(&state))
            .await
            .ok_or_else(|| OidcWebError::MissingCorrelation {
                state: state.clone(),
            })?;

        tracing::debug!(
            state = %state,
            provider = %provider,
            "Resolved provider from response state"
        );

        let rp = self.rp_for(&provider, &RegisterOptions::default()).await?;

        let session = self
            .rp
            .validate_response(&rp, &response_uri, self.medium.as_ref())
            .await?;

        location::clear_auth_response_from_url(self.browser.as_ref());

        let session = self.session.save(None, session).await?;
        tracing::info!(provider = %provider, "Session established");
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Login / logout
    // -----------------------------------------------------------------------

    /// Starts a login in the requested (or configured) UI mode.
    ///
    /// Returns the authorization URI navigated to for redirect logins.
    pub async fn login(&self, options: &LoginOptions) -> Result<Option<String>> {
        match options.mode.unwrap_or(self.mode) {
            UiMode::Redirect => self.redirect_to(options).await.map(Some),
            UiMode::Popup => {
                self.login_popup();
                Ok(None)
            }
        }
    }

    /// Navigates the browsing context to an authorization request for
    /// `options.provider`.
    ///
    /// # Errors
    ///
    /// Returns [`OidcWebError::Usage`] if no provider is given.  Nothing is
    /// read from or written to storage in that case.
    pub async fn redirect_to(&self, options: &LoginOptions) -> Result<String> {
        let provider = options
            .provider
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                OidcWebError::Usage("Missing provider argument for redirect_to()".to_string())
            })?;

        let rp = self.rp_for(provider, &options.registration).await?;
        let auth_uri = self
            .prepare_auth_request(None, Some(rp), &options.request)
            .await?;

        location::redirect_to(self.browser.as_ref(), &auth_uri);
        Ok(auth_uri)
    }

    /// Opens the provider-selection popup.
    pub fn login_popup(&self) {
        tracing::info!("Opening login popup");
        self.browser.open_login_popup();
    }

    /// Forgets client registrations and the session.
    ///
    /// The provider is not contacted.  Clearing goes through the stores, so
    /// the whole shared medium is wiped (see [`JsonStore::clear`]).
    pub async fn logout(&self) -> Result<()> {
        self.clients.clear().await?;
        self.session.clear().await?;
        tracing::info!("Logged out");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Client registration
    // -----------------------------------------------------------------------

    /// The cached registration for `provider`, registering on a miss.
    pub async fn rp_for(
        &self,
        provider: &str,
        options: &RegisterOptions,
    ) -> Result<ClientRegistration> {
        if let Some(rp) = self.clients.get(Some(provider)).await {
            tracing::debug!(provider = %provider, "Using cached client registration");
            return Ok(rp);
        }
        self.register(provider, options).await
    }

    /// Registers a public client with `provider` and caches it.
    pub async fn register(
        &self,
        provider: &str,
        options: &RegisterOptions,
    ) -> Result<ClientRegistration> {
        let rp = self.register_public_client(Some(provider), options).await?;
        self.clients.save(Some(provider), rp).await
    }

    /// Builds the registration request and relying-party options for a
    /// public client.
    ///
    /// `options` are merged over the configured defaults.  The redirect URI
    /// falls back to the current location.
    pub fn registration_request(
        &self,
        provider: Option<&str>,
        options: &RegisterOptions,
    ) -> Result<(RegistrationRequest, RpOptions)> {
        let options = options.or_defaults(&self.defaults);

        let provider = provider
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .or_else(|| options.issuer.clone())
            .ok_or_else(|| {
                OidcWebError::Usage("Missing provider argument for registration".to_string())
            })?;

        let redirect_uri = options
            .redirect_uri
            .clone()
            .or_else(|| location::current_location(self.browser.as_ref()))
            .ok_or_else(|| {
                OidcWebError::Usage(
                    "Missing redirect_uri and no current location to default to".to_string(),
                )
            })?;

        let scope = options
            .scope
            .clone()
            .unwrap_or_else(|| DEFAULT_SCOPE.to_string());

        let registration = RegistrationRequest {
            issuer: provider,
            grant_types: options
                .grant_types
                .clone()
                .unwrap_or_else(|| vec![DEFAULT_GRANT_TYPE.to_string()]),
            redirect_uris: vec![redirect_uri.clone()],
            response_types: options
                .response_types
                .clone()
                .unwrap_or_else(|| vec![DEFAULT_RESPONSE_TYPE.to_string()]),
            scope: scope.clone(),
        };

        let rp_options = RpOptions {
            defaults: RpDefaults {
                pop_token: self.pop_token,
                authenticate: AuthenticateDefaults {
                    redirect_uri,
                    response_type: DEFAULT_RESPONSE_TYPE.to_string(),
                    scope: scope.split_whitespace().map(str::to_string).collect(),
                },
            },
        };

        Ok((registration, rp_options))
    }

    /// Registers a public client through the relying party without caching.
    pub async fn register_public_client(
        &self,
        provider: Option<&str>,
        options: &RegisterOptions,
    ) -> Result<ClientRegistration> {
        let (registration, rp_options) = self.registration_request(provider, options)?;
        tracing::info!(provider = %registration.issuer, "Registering public client");
        self.rp
            .register(&registration.issuer, &registration, &rp_options)
            .await
    }

    // -----------------------------------------------------------------------
    // Authorization requests
    // -----------------------------------------------------------------------

    /// Builds an authorization request URI and records which provider its
    /// `state` belongs to.
    ///
    /// The correlation record is written before this returns, so the caller
    /// may navigate away immediately.
    ///
    /// # Errors
    ///
    /// [`OidcWebError::Usage`] if neither `provider` nor `rp` is given,
    /// [`OidcWebError::AuthRequest`] if the URI carries no `state`.
    pub async fn prepare_auth_request(
        &self,
        provider: Option<&str>,
        rp: Option<ClientRegistration>,
        options: &AuthRequestOptions,
    ) -> Result<String> {
        let rp = match rp {
            Some(rp) => rp,
            None => {
                let provider = provider.filter(|p| !p.is_empty()).ok_or_else(|| {
                    OidcWebError::Usage(
                        "prepare_auth_request needs a provider or a registration".to_string(),
                    )
                })?;
                self.rp_for(provider, &RegisterOptions::default()).await?
            }
        };

        let auth_uri = self
            .rp
            .create_request(&rp, options, self.medium.as_ref())
            .await?;

        let state = location::state_from_uri(&auth_uri, UriPart::Query)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                OidcWebError::AuthRequest("authorization request carries no state".to_string())
            })?;

        self.providers
            .save(Some(&state), rp.provider_url().to_string())
            .await?;
        tracing::debug!(state = %state, provider = %rp.provider_url(), "Saved provider by state");

        Ok(auth_uri)
    }
}
