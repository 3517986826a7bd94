//! Configuration management for oidc-web
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! ```yaml
//! client:
//!   provider: https://oidc.example.com
//!   defaults:
//!     redirect_uri: https://app.com/callback
//!   pop_token: false
//!   mode: redirect
//!   client_name: My App
//!   http_timeout_seconds: 30
//! storage:
//!   backend: sqlite
//!   path: /var/lib/oidc-web/storage.db
//! ```

use crate::client::{ClientOptions, UiMode};
use crate::error::{OidcWebError, Result};
use crate::rp::http::DEFAULT_CLIENT_NAME;
use crate::rp::RegisterOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/oidc-web.yaml";

/// Main configuration structure for oidc-web
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Login orchestrator and relying party settings
    #[serde(default)]
    pub client: ClientConfig,
    /// Storage medium settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default provider (issuer) URI
    #[serde(default)]
    pub provider: Option<String>,

    /// Registration defaults
    #[serde(default)]
    pub defaults: RegisterOptions,

    /// Use proof-of-possession token semantics
    #[serde(default)]
    pub pop_token: bool,

    /// Default login UI mode
    #[serde(default)]
    pub mode: UiMode,

    /// `client_name` sent during dynamic registration
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Timeout for provider HTTP calls
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

fn default_http_timeout() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: None,
            defaults: RegisterOptions::default(),
            pop_token: false,
            mode: UiMode::default(),
            client_name: default_client_name(),
            http_timeout_seconds: default_http_timeout(),
        }
    }
}

impl ClientConfig {
    /// Orchestrator options derived from this configuration
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            provider: self.provider.clone(),
            defaults: self.defaults.clone(),
            pop_token: self.pop_token,
            mode: self.mode,
        }
    }
}

/// Which storage medium backs the stores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process map; nothing survives the process
    Memory,
    /// SQLite database file
    #[default]
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database path for the SQLite backend; the user data directory when unset
    #[serde(default)]
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OidcWebError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| OidcWebError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(provider) = std::env::var("OIDC_WEB_PROVIDER") {
            self.client.provider = Some(provider);
        }

        if let Ok(redirect_uri) = std::env::var("OIDC_WEB_REDIRECT_URI") {
            self.client.defaults.redirect_uri = Some(redirect_uri);
        }

        if let Ok(mode) = std::env::var("OIDC_WEB_UI_MODE") {
            match mode.parse::<UiMode>() {
                Ok(value) => self.client.mode = value,
                Err(_) => tracing::warn!("Invalid OIDC_WEB_UI_MODE: {}", mode),
            }
        }

        if let Ok(pop_token) = std::env::var("OIDC_WEB_POP_TOKEN") {
            match pop_token.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.client.pop_token = true,
                "false" | "0" | "no" => self.client.pop_token = false,
                _ => tracing::warn!("Invalid OIDC_WEB_POP_TOKEN: {}", pop_token),
            }
        }

        if let Ok(path) = std::env::var("OIDC_WEB_STORAGE_PATH") {
            self.storage.path = Some(path);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(ref provider) = cli.provider {
            self.client.provider = Some(provider.clone());
        }

        if let Some(ref path) = cli.storage_path {
            self.storage.path = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if a configured URI is not http(s), the client name is
    /// empty or the HTTP timeout is zero
    pub fn validate(&self) -> Result<()> {
        if let Some(ref provider) = self.client.provider {
            validate_http_uri("client.provider", provider)?;
        }

        if let Some(ref issuer) = self.client.defaults.issuer {
            validate_http_uri("client.defaults.issuer", issuer)?;
        }

        if let Some(ref redirect_uri) = self.client.defaults.redirect_uri {
            validate_http_uri("client.defaults.redirect_uri", redirect_uri)?;
        }

        if self.client.client_name.trim().is_empty() {
            return Err(OidcWebError::Config("client_name cannot be empty".to_string()).into());
        }

        if self.client.http_timeout_seconds == 0 {
            return Err(OidcWebError::Config(
                "http_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

fn validate_http_uri(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| OidcWebError::Config(format!("{} is not a valid URI: {}", field, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(OidcWebError::Config(format!(
            "{} must use http or https, got {}",
            field, scheme
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.client.provider.is_none());
        assert_eq!(config.client.client_name, "oidc-web");
        assert_eq!(config.client.http_timeout_seconds, 30);
        assert_eq!(config.client.mode, UiMode::Popup);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn test_config_validation_success() {
        let mut config = Config::default();
        config.client.provider = Some("https://oidc.example.com".to_string());
        config.client.defaults.redirect_uri = Some("http://localhost:8080/".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_non_http_provider() {
        let mut config = Config::default();
        config.client.provider = Some("ftp://oidc.example.com".to_string());
        assert!(config.validate().is_err());

        config.client.provider = Some("not a uri".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_bad_redirect_uri() {
        let mut config = Config::default();
        config.client.defaults.redirect_uri = Some("file:///tmp/callback".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_client_name() {
        let mut config = Config::default();
        config.client.client_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.client.http_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
client:
  provider: https://oidc.example.com
  defaults:
    redirect_uri: https://app.com/callback
    scope: openid profile email
  pop_token: true
  mode: redirect
storage:
  backend: memory
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.client.provider.as_deref(),
            Some("https://oidc.example.com")
        );
        assert_eq!(
            config.client.defaults.scope.as_deref(),
            Some("openid profile email")
        );
        assert!(config.client.pop_token);
        assert_eq!(config.client.mode, UiMode::Redirect);
        assert_eq!(config.client.client_name, "oidc-web");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let mut config = Config::default();
        let cli = crate::cli::Cli {
            provider: Some("https://cli.example.com".to_string()),
            storage_path: Some("/tmp/cli.db".to_string()),
            ..crate::cli::Cli::default()
        };
        config.apply_cli_overrides(&cli);
        assert_eq!(
            config.client.provider.as_deref(),
            Some("https://cli.example.com")
        );
        assert_eq!(config.storage.path.as_deref(), Some("/tmp/cli.db"));
    }

    #[test]
    fn test_client_options_mirror_config() {
        let mut config = Config::default();
        config.client.provider = Some("https://oidc.example.com".to_string());
        config.client.pop_token = true;
        let options = config.client.client_options();
        assert_eq!(options.provider.as_deref(), Some("https://oidc.example.com"));
        assert!(options.pop_token);
    }
}
