//! Billdesk server.
//!
//! Usage:
//!   billdesk                       # serve (default)
//!   billdesk serve
//!   billdesk set-api-key sk_live_...
//!   billdesk show-settings

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tokio::signal;

use billdesk::{BillingDesk, ConfigBuilder, LiveStripeClient, SettingsStore};

#[derive(Parser)]
#[command(name = "billdesk")]
#[command(version)]
#[command(about = "Cached Stripe catalogue with tiered-discount invoicing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate the cache and serve the HTTP API
    Serve,

    /// Store the Stripe API key in the settings file
    SetApiKey {
        /// Secret or restricted key (sk_... / rk_...)
        key: String,
    },

    /// Print the settings file location and whether a key is stored
    ShowSettings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::SetApiKey { key } => {
            let store = SettingsStore::from_env()?;
            store.set_api_key(&key)?;
            println!("API key saved to {}", store.path().display());
            Ok(())
        }
        Commands::ShowSettings => {
            let store = SettingsStore::from_env()?;
            let settings = store.load()?;
            println!("Settings file: {}", store.path().display());
            println!(
                "API key:       {}",
                if settings.api_key().is_some() { "set" } else { "not set" }
            );
            Ok(())
        }
    }
}

async fn serve() -> Result<()> {
    let config = ConfigBuilder::new()
        .from_env()
        .build()
        .context("invalid configuration")?;
    billdesk::init_tracing_with_config(&config);

    let settings = SettingsStore::from_env()?;
    let api_key: SecretString = match config.stripe_api_key.clone() {
        Some(key) => key,
        None => settings
            .load()?
            .api_key()
            .context("no Stripe API key: set STRIPE_API_KEY or run `billdesk set-api-key`")?,
    };

    let client = LiveStripeClient::new(api_key, config.provider.clone())?;
    tracing::info!(test_mode = client.is_test_mode(), "Stripe client ready");

    let desk = Arc::new(BillingDesk::new(Arc::new(client), &config).with_settings(settings));
    if let Err(e) = desk.start().await {
        tracing::error!(error = %e, "Initial cache refresh failed, exiting");
        return Err(e).context("startup failed");
    }

    let addr = config.server.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server starting on http://{}", addr);

    axum::serve(listener, billdesk::http::router(desk.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    desk.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
