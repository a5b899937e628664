//! Transport bindings: stream-framed stdio and SSE-over-HTTP.

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use rmcp::transport::io::stdio;
use rmcp::transport::sse_server::SseServer;

use crate::server::ChameleonServer;

/// Serve on stdio until the client disconnects.
pub async fn serve_stdio(handler: ChameleonServer) -> Result<()> {
    let service = handler
        .serve(stdio())
        .await
        .context("starting stdio transport")?;
    service.waiting().await.context("stdio transport failed")?;
    tracing::info!("server shutting down...");
    Ok(())
}

/// Serve SSE + POST on the configured host/port until interrupted.
/// A failed bind is a startup failure.
pub async fn serve_sse(handler: ChameleonServer, host: &str, port: u16) -> Result<()> {
    let address = format!("{host}:{port}");
    let bind = address
        .parse()
        .with_context(|| format!("invalid SSE address '{address}'"))?;

    let cancel = SseServer::serve(bind)
        .await
        .with_context(|| format!("binding SSE transport on {address}"))?
        .with_service(move || handler.clone());
    tracing::info!("SSE transport listening on {address}");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    cancel.cancel();
    tracing::info!("server shutting down...");
    Ok(())
}
