pub mod catalog;
pub mod config;
pub mod middleware;
pub mod server;
pub mod upstream;

use axum::{extract::Request, ServiceExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Server error: {0}")]
    Server(String),
}

pub async fn run(config_path: Option<&str>) -> Result<(), ServerError> {
    let config = match config_path {
        Some(path) => {
            info!("Using config file: {}", path);
            config::Config::from_file(path)?
        }
        None => config::Config::default(),
    };
    // Refuse to start without credentials rather than failing every request later.
    let api_token = config.api_token()?;

    let policy = upstream::RetryPolicy::from_config(&config.retry);
    info!(
        "Upstream {} (timeout {:?}, {} retries)",
        config.tmdb.base_url,
        config.timeout(),
        policy.max_retries
    );
    let client = upstream::TmdbClient::new(&config.tmdb, api_token, policy)?;

    let address = config.listen.address.as_deref().unwrap_or("[::]");
    let port = &config.listen.port;
    let addr: SocketAddr = format!("{}:{}", address, port)
        .parse()
        .map_err(|e| ServerError::Server(format!("Invalid address: {}", e)))?;

    info!("Trending cache TTL {:?} ({:?} keys)", config.cache_ttl(), config.cache.key);

    let state = server::AppState::new(&config, Arc::new(client));
    let app = server::build_app(state);

    info!("Serving HTTP on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Server(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .await
        .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;

    Ok(())
}
