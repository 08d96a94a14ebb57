//! Chat Relay - Entry Point
//!
//! Loads configuration, asks for the shared password if none is configured,
//! and runs the relay until Ctrl-C.

use std::env;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::{ChatError, Server, ServerConfig};

/// Environment variable naming an optional JSON config file
const CONFIG_ENV: &str = "CHAT_RELAY_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let mut config = match env::var(CONFIG_ENV) {
        Ok(path) => {
            info!("Loading config from {}", path);
            ServerConfig::load(&path)?
        }
        Err(_) => ServerConfig::default(),
    };

    // Listen address from command line overrides the config
    if let Some(addr) = env::args().nth(1) {
        config.listen_addr = addr;
    }

    if !config.has_password() {
        config.password = prompt_password().await?;
    }
    if !config.has_password() {
        error!("A password is required to start the server");
        return Err(ChatError::InvalidPassword.into());
    }

    let server = Server::bind(config).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}

/// Read the shared password from stdin
async fn prompt_password() -> std::io::Result<String> {
    println!("Enter a password to start the server: ");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let password = lines.next_line().await?.unwrap_or_default();
    Ok(password.trim().to_string())
}
