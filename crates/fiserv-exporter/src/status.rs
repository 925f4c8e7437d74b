//! Liveness endpoint.

use anyhow::Context;
use axum::{http::StatusCode, routing::get, Router};

pub fn router() -> Router {
    Router::new().route("/status", get(status))
}

async fn status() -> StatusCode {
    StatusCode::OK
}

/// Bind the status listener.
pub async fn bind(host: &str, port: u16) -> anyhow::Result<tokio::net::TcpListener> {
    let url = format!("http://{host}:{port}");
    tracing::info!("attempting to start status server at {url}");
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind status server at {url}"))?;
    tracing::info!("status server listening at {url}");
    Ok(listener)
}

/// Serve `/status` until the process exits.
pub async fn serve(listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    axum::serve(listener, router()).await?;
    Ok(())
}
