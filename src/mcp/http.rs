//! Streamable HTTP transport. Each client gets its own session at `/mcp`.

use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use tracing::info;

use super::server::RerankMcpServer;


pub async fn run_http_server(server: RerankMcpServer, addr: &str) -> anyhow::Result<()> {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🌐 Rerank MCP server listening on http://{}/mcp", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("👋 Shutting down HTTP server");
        })
        .await?;

    Ok(())
}
