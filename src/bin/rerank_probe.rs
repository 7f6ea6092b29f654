use kg_rerank::rerank::test_supabase_connection;
use kg_rerank::ProbeSettings;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let settings = ProbeSettings::from_env()?;
    let passed = test_supabase_connection(&settings).await;
    println!(
        "\nSupabase Connection Test: {}",
        if passed { "PASSED" } else { "FAILED" }
    );

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
