//! oidc-web - browser-side OpenID Connect login helper library
//!
//! This library lets a web client log a user in with any OpenID provider
//! without a pre-registered client.  It registers a public client with each
//! provider on first use, keeps the registration, the current session and
//! the provider of every in-flight request in a key-value medium, and turns
//! the provider's redirect response back into a session.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `client`: The login orchestrator ([`OidcWebClient`])
//! - `storage`: Storage media, the namespaced JSON store and its bindings
//! - `browser`: Browsing context abstraction and location helpers
//! - `rp`: Relying-party capability and its HTTP implementation
//! - `session`: The resolved session
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: CLI command handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use oidc_web::browser::MemoryBrowsingContext;
//! use oidc_web::rp::HttpRelyingParty;
//! use oidc_web::storage::MemoryStorage;
//! use oidc_web::{ClientOptions, LoginOptions, OidcWebClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let browser = Arc::new(MemoryBrowsingContext::new("https://app.com/"));
//!     let client = OidcWebClient::new(
//!         ClientOptions::default(),
//!         Arc::new(HttpRelyingParty::new(Arc::new(reqwest::Client::new()))),
//!         Arc::new(MemoryStorage::new()),
//!         browser.clone(),
//!     );
//!
//!     client
//!         .login(&LoginOptions::redirect("https://oidc.example.com"))
//!         .await?;
//!     println!("navigated to {:?}", browser.last_navigation());
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod rp;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use client::{ClientOptions, LoginOptions, OidcWebClient, UiMode};
pub use config::Config;
pub use error::{OidcWebError, Result};
pub use session::Session;
pub use storage::{JsonStore, MemoryStorage, StorageMedium};
