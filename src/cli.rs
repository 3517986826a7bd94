//! Command-line interface definition for oidc-web
//!
//! This module defines the CLI structure using clap's derive API.  The
//! binary drives the login orchestrator against a durable storage medium
//! and an in-memory browsing context, so each step of a browser login
//! (start, provider callback, inspect, logout) can be run separately.

use clap::{Parser, Subcommand};

/// oidc-web - browser-style OpenID Connect login helper
///
/// Registers public clients with OpenID providers, builds authorization
/// requests and resolves sessions from authentication responses.
#[derive(Parser, Debug, Clone)]
#[command(name = "oidc-web")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/oidc-web.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to the SQLite storage database
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Default provider (issuer) URI
    #[arg(long)]
    pub provider: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for oidc-web
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a login and print the authorization request URI
    Login {
        /// Provider to log in with; defaults to the configured provider
        #[arg(short, long)]
        provider: Option<String>,

        /// Redirect URI to register; defaults to the configured one
        #[arg(short, long)]
        redirect_uri: Option<String>,

        /// UI mode: popup or redirect
        #[arg(short, long)]
        mode: Option<String>,
    },

    /// Resolve a session from an authentication response URI
    Callback {
        /// The URI the provider redirected back to
        response_uri: String,
    },

    /// Show the current session
    Session {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget client registrations and the session
    Logout,

    /// Print a URI with authentication response parameters removed
    Scrub {
        /// URI to scrub
        uri: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/oidc-web.yaml".to_string()),
            verbose: false,
            storage_path: None,
            provider: None,
            command: Commands::Session { json: false },
        }
    }
}
