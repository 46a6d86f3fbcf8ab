use std::path::PathBuf;

use notion_relay::cli;
use notion_relay::config::{DEFAULT_ENV_FILE, NotionConfig};
use notion_relay::server::{self, AppState};

fn require_config() -> NotionConfig {
    NotionConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("Run `notion-relay serve` and use the admin endpoints,");
        eprintln!("or create a .env file with NOTION_TOKEN and NOTION_DATABASE_ID.");
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Load the local env file, if any, before reading the environment.
    dotenv::dotenv().ok();

    let mode = std::env::args().nth(1);
    match mode.as_deref() {
        Some("serve") => {
            let config = match NotionConfig::from_env() {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(error = %e, "Starting unconfigured; use the admin endpoints to configure");
                    None
                }
            };

            let port = config.as_ref().map(|c| c.port).unwrap_or_else(|| {
                std::env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000)
            });

            eprintln!("📓 notion-relay v{}", env!("CARGO_PKG_VERSION"));
            eprintln!("   Store API: http://0.0.0.0:{port}/store");
            eprintln!("   Health:    http://0.0.0.0:{port}/health");
            eprintln!("   Admin:     http://0.0.0.0:{port}/admin/config");

            let state = AppState::new(config, PathBuf::from(DEFAULT_ENV_FILE));
            server::serve(state, port).await
        }
        Some("check") => {
            let config = require_config();
            cli::run_check(&config).await
        }
        None => {
            let config = require_config();
            cli::run_prompt(&config).await
        }
        Some(other) => {
            eprintln!("Unknown command: {other}");
            eprintln!("Usage: notion-relay [serve|check]");
            std::process::exit(2);
        }
    }
}
