/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

Every handler builds an [`OidcWebClient`] over the configured storage
medium, an [`HttpRelyingParty`] and an in-memory browsing context whose
location stands in for the browser window:

- `login`   : Start a login and print the authorization request URI
- `callback`: Resolve a session from a provider response URI
- `session` : Show the cached session
- `logout`  : Forget registrations and the session
- `scrub`   : Remove authentication parameters from a URI
*/

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use crate::browser::{BrowsingContext, MemoryBrowsingContext};
use crate::client::{LoginOptions, OidcWebClient, UiMode};
use crate::config::{ClientConfig, Config, StorageBackend, StorageConfig};
use crate::error::{OidcWebError, Result};
use crate::rp::{HttpRelyingParty, RegisterOptions, RelyingParty};
use crate::session::Session;
use crate::storage::{MemoryStorage, SqliteStorage, StorageMedium};

/// Opens the storage medium selected by `storage`
pub fn open_medium(storage: &StorageConfig) -> Result<Arc<dyn StorageMedium>> {
    match storage.backend {
        StorageBackend::Memory => {
            tracing::debug!("Using in-memory storage");
            Ok(Arc::new(MemoryStorage::new()))
        }
        StorageBackend::Sqlite => {
            let storage = match storage.path {
                Some(ref path) => SqliteStorage::new_with_path(path)?,
                None => SqliteStorage::new()?,
            };
            tracing::debug!("Using SQLite storage at {}", storage.path().display());
            Ok(Arc::new(storage))
        }
    }
}

/// Builds the HTTP relying party from the client configuration
pub fn http_relying_party(client: &ClientConfig) -> Result<Arc<dyn RelyingParty>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(client.http_timeout_seconds))
        .build()
        .map_err(OidcWebError::from)?;

    Ok(Arc::new(
        HttpRelyingParty::new(Arc::new(http)).with_client_name(client.client_name.clone()),
    ))
}

/// Builds the orchestrator for a command
pub fn build_client(
    config: &Config,
    rp: Arc<dyn RelyingParty>,
    medium: Arc<dyn StorageMedium>,
    browser: Arc<dyn BrowsingContext>,
) -> OidcWebClient {
    OidcWebClient::new(config.client.client_options(), rp, medium, browser)
}

fn print_session(session: &Session) {
    if !session.has_credentials() {
        println!("{}", "No active session.".yellow());
        return;
    }

    println!("\n{}\n", "Session".bold());
    println!("Provider:     {}", session.idp.as_deref().unwrap_or("-"));
    println!("Client ID:    {}", session.client_id.as_deref().unwrap_or("-"));
    println!("Subject:      {}", session.subject.as_deref().unwrap_or("-"));
    println!("Token Type:   {}", session.token_type.as_deref().unwrap_or("-"));
    match session.expires_at {
        Some(at) if session.is_expired() => {
            println!("Expires At:   {} {}", at.to_rfc3339(), "(expired)".red())
        }
        Some(at) => println!("Expires At:   {}", at.to_rfc3339()),
        None => println!("Expires At:   -"),
    }
    println!();
}

// Login command handler
pub mod login {
    //! Starts a login.
    //!
    //! In redirect mode the orchestrator registers (or reuses) a client,
    //! records the request `state` and "navigates" the in-memory browsing
    //! context; the URI it navigated to is printed for the user to open.

    use super::*;

    /// Run the login command
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration
    /// * `provider` - Provider override; falls back to the configured provider
    /// * `redirect_uri` - Redirect URI override
    /// * `mode` - UI mode override (`popup` or `redirect`)
    pub async fn run_login(
        config: &Config,
        provider: Option<String>,
        redirect_uri: Option<String>,
        mode: Option<String>,
    ) -> Result<()> {
        let medium = open_medium(&config.storage)?;
        let rp = http_relying_party(&config.client)?;
        login_with(config, rp, medium, provider, redirect_uri, mode)
            .await
            .map(|_| ())
    }

    /// Login against explicit collaborators; returns the navigated URI
    pub async fn login_with(
        config: &Config,
        rp: Arc<dyn RelyingParty>,
        medium: Arc<dyn StorageMedium>,
        provider: Option<String>,
        redirect_uri: Option<String>,
        mode: Option<String>,
    ) -> Result<Option<String>> {
        let mode = mode.map(|m| m.parse::<UiMode>()).transpose()?;

        let location = redirect_uri
            .clone()
            .or_else(|| config.client.defaults.redirect_uri.clone());
        let browser = Arc::new(match location {
            Some(ref uri) => MemoryBrowsingContext::new(uri.clone()),
            None => MemoryBrowsingContext::empty(),
        });

        let client = build_client(config, rp, medium, browser.clone());

        let options = LoginOptions {
            provider: provider.or_else(|| client.provider().map(str::to_string)),
            mode,
            registration: RegisterOptions {
                redirect_uri,
                ..RegisterOptions::default()
            },
            ..LoginOptions::default()
        };

        let auth_uri = client.login(&options).await?;

        match auth_uri {
            Some(ref uri) => {
                println!("{}", "Open this URI to log in:".green());
                println!("{}", uri);
            }
            None if browser.popups_opened() > 0 => {
                println!(
                    "{}",
                    "Popup login requested; run with --mode redirect to get a login URI."
                        .yellow()
                );
            }
            None => {}
        }

        Ok(auth_uri)
    }
}

// Callback command handler
pub mod callback {
    //! Hands a provider response URI to the orchestrator.

    use super::*;

    /// Run the callback command
    pub async fn run_callback(config: &Config, response_uri: &str) -> Result<()> {
        let medium = open_medium(&config.storage)?;
        let rp = http_relying_party(&config.client)?;
        callback_with(config, rp, medium, response_uri)
            .await
            .map(|_| ())
    }

    /// Resolves the response against explicit collaborators
    ///
    /// Returns the session and the scrubbed location.
    pub async fn callback_with(
        config: &Config,
        rp: Arc<dyn RelyingParty>,
        medium: Arc<dyn StorageMedium>,
        response_uri: &str,
    ) -> Result<(Session, Option<String>)> {
        let browser = Arc::new(MemoryBrowsingContext::new(response_uri));
        let client = build_client(config, rp, medium, browser.clone());

        let session = client.session_from_response().await.ok_or_else(|| {
            OidcWebError::ResponseValidation(
                "no session could be resolved from the response (run with -v for details)"
                    .to_string(),
            )
        })?;

        print_session(&session);

        let location = browser.current_uri();
        if let Some(ref uri) = location {
            println!("Location:     {}", uri.cyan());
        }

        Ok((session, location))
    }
}

// Session command handler
pub mod session {
    //! Prints the cached session.

    use super::*;

    /// Run the session command
    pub async fn show_session(config: &Config, json: bool) -> Result<()> {
        let medium = open_medium(&config.storage)?;
        let rp = http_relying_party(&config.client)?;
        let client = build_client(config, rp, medium, Arc::new(MemoryBrowsingContext::empty()));

        let session = client.current_session().await;

        if json {
            println!("{}", serde_json::to_string_pretty(&session)?);
        } else {
            print_session(&session);
        }

        Ok(())
    }
}

// Logout command handler
pub mod logout {
    //! Clears local login state.

    use super::*;

    /// Run the logout command
    pub async fn run_logout(config: &Config) -> Result<()> {
        let medium = open_medium(&config.storage)?;
        let rp = http_relying_party(&config.client)?;
        let client = build_client(config, rp, medium, Arc::new(MemoryBrowsingContext::empty()));

        client.logout().await?;
        println!("{}", "Logged out.".green());
        Ok(())
    }
}

// Scrub command handler
pub mod scrub {
    //! Removes authentication response parameters from a URI.

    use super::*;
    use crate::browser::location::strip_auth_params;

    /// Run the scrub command
    pub fn run_scrub(uri: &str) -> Result<String> {
        let scrubbed = strip_auth_params(uri)?;
        println!("{}", scrubbed);
        Ok(scrubbed)
    }
}
