//! API Server setup

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::routes::create_router;
use crate::state::{ApiConfig, AppState};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Create the API server
pub fn create_server(config: &ApiConfig, state: AppState) -> Result<(Router, SocketAddr), BoxError> {
    let mut router = create_router(state).layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    Ok((router, addr))
}

/// Periodically purge blacklist rows for tokens that have expired.
pub fn spawn_blacklist_cleanup(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = state.auth.cleanup_expired().await {
                error!(error = %e, "token blacklist cleanup failed");
            }
        }
    })
}

/// Run the API server
pub async fn run_server(config: ApiConfig, state: AppState) -> Result<(), BoxError> {
    if config.blacklist_cleanup_interval_secs > 0 {
        spawn_blacklist_cleanup(
            state.clone(),
            Duration::from_secs(config.blacklist_cleanup_interval_secs),
        );
    }

    let (router, addr) = create_server(&config, state)?;
    info!(%addr, "CPRHub API server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
