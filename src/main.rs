//! oidc-web - browser-style OpenID Connect login helper
//!
#![doc = "oidc-web - browser-style OpenID Connect login helper"]
#![doc = "Main entry point for the oidc-web command-line tool."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use oidc_web::cli::{Cli, Commands};
use oidc_web::commands;
use oidc_web::config::{Config, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Login {
            provider,
            redirect_uri,
            mode,
        } => {
            tracing::info!("Starting login");
            if let Some(p) = &provider {
                tracing::debug!("Using provider override: {}", p);
            }
            commands::login::run_login(&config, provider, redirect_uri, mode).await?;
            Ok(())
        }
        Commands::Callback { response_uri } => {
            tracing::info!("Resolving authentication response");
            commands::callback::run_callback(&config, &response_uri).await?;
            Ok(())
        }
        Commands::Session { json } => {
            commands::session::show_session(&config, json).await?;
            Ok(())
        }
        Commands::Logout => {
            commands::logout::run_logout(&config).await?;
            Ok(())
        }
        Commands::Scrub { uri } => {
            commands::scrub::run_scrub(&uri)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "oidc_web=debug"
    } else {
        "oidc_web=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
