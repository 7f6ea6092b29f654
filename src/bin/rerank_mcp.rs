use kg_rerank::mcp::run_server;
use kg_rerank::RerankSettings;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,kg_rerank=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let settings = RerankSettings::from_env()?;
    tracing::debug!("Loaded settings: {:?}", settings);

    run_server(settings).await
}
