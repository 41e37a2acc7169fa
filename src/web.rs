#![cfg(not(tarpaulin_include))]

use sheetcrm::app;
use sheetcrm::config::Config;

/// Main entry point for the CRM web server
///
/// Reads configuration from the environment (and `.env` when present),
/// sets up logging and serves the page and JSON API.
///
/// # Environment
/// * `CRM_BIND_ADDR` - Listen address, `127.0.0.1:3000` by default
/// * `RUST_LOG` - Log filter, `info` by default
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG may come from .env
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();

    app::run(config).await
}
