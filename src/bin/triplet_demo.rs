use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use kg_rerank::db::Neo4jClient;
use kg_rerank::graph::{
    DemoDataset, EntityEdge, GraphStore, InMemoryGraphStore, KnowledgeGraph, Neo4jGraphStore,
    SearchConfig,
};
use kg_rerank::{Embedder, EmbeddingGenerator, GraphSettings};
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};


#[derive(Parser)]
#[command(name = "triplet-demo")]
#[command(about = "Load AI-industry triplets into a knowledge graph and run sample searches")]
struct Cli {
    /// Demo dataset to load
    #[arg(long, env = "DEMO_FIXTURES", default_value = "fixtures/ai_demo.json")]
    fixtures: PathBuf,

    /// Use a process-local graph instead of Neo4j
    #[arg(long)]
    in_memory: bool,

    /// Do not clear existing graph data before loading
    #[arg(long)]
    keep_data: bool,
}


fn print_results(results: &[EntityEdge], top: usize) {
    for (i, result) in results.iter().take(top).enumerate() {
        println!("{}. UUID: {}", i + 1, result.uuid);
        println!("   Fact: {}", result.fact);
        if let Some(valid_at) = result.valid_at {
            println!("   Valid from: {valid_at}");
        }
        if let Some(invalid_at) = result.invalid_at {
            println!("   Valid until: {invalid_at}");
        }
        println!("   ---");
    }
}


async fn run_demo(graph: &KnowledgeGraph, dataset: &DemoDataset, keep_data: bool) -> anyhow::Result<()> {
    graph.build_indices().await?;

    if !keep_data {
        println!("Clearing existing graph data...");
        graph.clear(None).await?;
        println!("Graph data cleared successfully.");
    }

    println!("Creating complex knowledge graph triplets...");
    let total = dataset.triplets.len();
    for (i, triplet) in dataset.triplets.iter().enumerate() {
        println!("Adding triplet {}/{}: {} -> {}", i + 1, total, triplet.source.name, triplet.target.name);
        graph.add_triplet(&triplet.source, &triplet.edge, &triplet.target).await?;
    }

    let stats = graph.stats().await?;
    println!("Graph now holds {} entities and {} relationships", stats.entities, stats.relationships);

    let base = SearchConfig::default().with_groups(vec![dataset.group_id.clone()]);

    for query in &dataset.searches {
        println!("\nSearching for: '{query}'");
        let results = graph.search(query, &base).await?;
        println!("\nSearch Results for \"{query}\":");
        print_results(&results, 3);
    }

    for search in &dataset.center_searches {
        println!("\n=== {} ===", search.description.to_uppercase());
        println!("Query: \"{}\"", search.query);
        println!("Center Node: {} ({})", search.center.name, search.center.uuid);

        let config = base.clone().centered_on(search.center.uuid);
        let results = graph.search(&search.query, &config).await?;

        println!("\nResults (reranked by distance from {}):", search.center.name);
        for (i, result) in results.iter().take(4).enumerate() {
            println!("{}. {}", i + 1, result.fact);
        }
        println!();
    }

    println!("\n=== MULTI-HOP RELATIONSHIP ANALYSIS ===");
    for query in &dataset.multi_hop_searches {
        println!("\nQuery: \"{query}\"");
        let results = graph.search(query, &base).await?;
        for (i, result) in results.iter().take(3).enumerate() {
            println!("{}. {}", i + 1, result.fact);
        }
    }

    Ok(())
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,kg_rerank=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let settings = GraphSettings::from_env()?;
    let dataset = DemoDataset::from_path(&cli.fixtures)?;
    if dataset.group_id != settings.group_id {
        warn!(
            "Fixture group '{}' differs from GROUP_ID '{}'; searching the fixture group",
            dataset.group_id, settings.group_id
        );
    }

    let embedder: Option<Arc<dyn Embedder>> = match &settings.openai_api_key {
        Some(key) => Some(Arc::new(EmbeddingGenerator::new(
            settings.embedding_model.clone(),
            key.clone(),
            settings.embedding_base_url.clone(),
            settings.request_timeout_secs,
        )?)),
        None => None,
    };

    let store: Arc<dyn GraphStore> = if cli.in_memory {
        Arc::new(InMemoryGraphStore::new())
    } else {
        let client = Neo4jClient::new(
            &settings.neo4j_uri,
            &settings.neo4j_user,
            &settings.neo4j_password,
            &settings.neo4j_database,
            settings.request_timeout_secs,
        )?;
        client.health_check().await?;
        Arc::new(Neo4jGraphStore::new(client))
    };

    let graph = KnowledgeGraph::new(store, embedder);
    let result = run_demo(&graph, &dataset, cli.keep_data).await;

    graph.close().await?;
    println!("\nConnection closed");

    result
}
