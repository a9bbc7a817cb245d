//! Liveness endpoint
//!
//! A single `GET /` route answering with a fixed body so hosting platforms
//! can tell the process is up. It shares nothing with the bot.

use crate::config::ALIVE_MESSAGE;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Errors raised while serving the liveness endpoint
#[derive(Error, Debug)]
pub enum LivenessError {
    /// The listen address could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The server stopped with an error
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Router with the liveness route
pub fn router() -> Router {
    Router::new().route("/", get(|| async { ALIVE_MESSAGE }))
}

/// Serve the liveness router on an already bound listener
///
/// # Errors
///
/// Returns `LivenessError::Serve` if the server stops with an error.
pub async fn serve(listener: TcpListener) -> Result<(), LivenessError> {
    axum::serve(listener, router()).await?;
    Ok(())
}

/// Bind `addr` and serve until the process exits
///
/// # Errors
///
/// Returns `LivenessError::Bind` if the address is unavailable, or
/// `LivenessError::Serve` if the server stops with an error.
pub async fn run(addr: SocketAddr) -> Result<(), LivenessError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| LivenessError::Bind { addr, source })?;
    info!("Liveness endpoint listening on http://{}", addr);
    serve(listener).await
}

/// Run the endpoint in the background, logging a failure instead of
/// propagating it
pub fn spawn(addr: SocketAddr) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run(addr).await {
            error!("Liveness endpoint stopped: {}", e);
        }
    })
}
