use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::config::{RerankSettings, Transport};
use crate::core::error::KgError;
use crate::db::SupabaseClient;
use crate::llm::cross_encoder::RelevanceScorer;
use crate::llm::embeddings::EmbeddingGenerator;
use crate::rerank::{search_and_rerank, RerankContext, RerankError, RerankOutcome, RerankRequest};
use crate::{DEFAULT_COLLECTION, DEFAULT_MATCH_COUNT, DEFAULT_TOP_K, NO_MATCHES_MESSAGE};


const CONFIG_RESOURCE: &str = "config://rerank";

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_match_count() -> usize {
    DEFAULT_MATCH_COUNT
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}


#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct SearchAndRerankParams {
    #[schemars(description = "Natural-language search query")]
    pub query: String,
    #[schemars(description = "Document collection to search (default: documents_reranking)")]
    #[serde(default = "default_collection")]
    pub collection_name: String,
    #[schemars(description = "Candidates fetched by vector similarity (default: 15)")]
    #[serde(default = "default_match_count")]
    pub match_count: usize,
    #[schemars(description = "Results kept after cross-encoder reranking (default: 15)")]
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl From<SearchAndRerankParams> for RerankRequest {
    fn from(p: SearchAndRerankParams) -> Self {
        RerankRequest {
            query: p.query,
            collection_name: p.collection_name,
            match_count: p.match_count,
            top_k: p.top_k,
        }
    }
}


/// Settings that are safe to show to clients.
#[derive(Debug, Clone, Default)]
struct PublicSettings {
    embedding_model: String,
    reranker_model: String,
    transport: String,
    supabase_url: String,
}


#[derive(Clone)]
pub struct RerankMcpServer {
    context: Arc<RerankContext>,
    settings: PublicSettings,
    tool_router: ToolRouter<Self>,
}

impl RerankMcpServer {

    pub fn new(context: RerankContext) -> Self {
        Self {
            context: Arc::new(context),
            settings: PublicSettings::default(),
            tool_router: Self::tool_router(),
        }
    }


    pub fn with_settings(context: RerankContext, settings: &RerankSettings) -> Self {
        let mut server = Self::new(context);
        server.settings = PublicSettings {
            embedding_model: settings.embedding_model.clone(),
            reranker_model: settings.reranker_model.to_string(),
            transport: settings.transport.to_string(),
            supabase_url: settings.supabase_url.clone(),
        };
        server
    }

    /// Embedding failures and bad parameters are protocol errors; anything
    /// that goes wrong after the query is embedded is reported as tool text.
    fn render(result: Result<RerankOutcome, RerankError>) -> Result<String, McpError> {
        match result {
            Ok(RerankOutcome::NoMatches) => Ok(NO_MATCHES_MESSAGE.to_string()),
            Ok(RerankOutcome::Ranked(docs)) => Self::result_to_json(&docs),
            Err(RerankError::InvalidRequest(msg)) => Err(McpError::invalid_params(msg, None)),
            Err(e @ RerankError::Embedding(_)) => Err(McpError::internal_error(e.to_string(), None)),
            Err(e @ (RerankError::Search(_) | RerankError::Scoring(_))) => {
                Ok(format!("Error searching documents: {e}"))
            }
        }
    }


    fn result_to_json<T: serde::Serialize>(result: T) -> Result<String, McpError> {
        serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }
}

#[tool_router]
impl RerankMcpServer {

    #[tool(description = "Search a document collection by vector similarity, then rerank the candidates with a cross-encoder. Returns: [{text, score}] best first, or a message when nothing matched")]
    async fn search_and_rerank(
        &self,
        Parameters(params): Parameters<SearchAndRerankParams>,
    ) -> Result<CallToolResult, McpError> {
        let query_preview: String = params.query.chars().take(50).collect();
        info!(
            "🔍 Reranking: '{}' [collection={}, match_count={}, top_k={}]",
            query_preview, params.collection_name, params.match_count, params.top_k
        );

        let request = RerankRequest::from(params);
        let result = search_and_rerank(&self.context, &request).await;
        match &result {
            Ok(RerankOutcome::Ranked(docs)) => info!("✅ Returning {} documents", docs.len()),
            Ok(RerankOutcome::NoMatches) => info!("📭 No matching documents"),
            Err(e) => warn!("⚠️ Rerank failed: {}", e),
        }

        let text = Self::render(result)?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for RerankMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "mcp-rag-rerank".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Retrieval with cross-encoder reranking. Use search_and_rerank to fetch \
                 candidates from a vector collection and get them back ordered by relevance."
                    .to_string(),
            ),
            ..Default::default()
        }
    }


    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            meta: None,
            resources: vec![RawResource::new(CONFIG_RESOURCE, "rerank-config".to_string()).no_annotation()],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParams { uri, .. }: ReadResourceRequestParams,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match uri.as_str() {
            CONFIG_RESOURCE => {
                let content = Self::result_to_json(json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "embedding_model": self.settings.embedding_model,
                    "reranker_model": self.settings.reranker_model,
                    "transport": self.settings.transport,
                    "supabase_url": self.settings.supabase_url,
                    "defaults": {
                        "collection_name": DEFAULT_COLLECTION,
                        "match_count": DEFAULT_MATCH_COUNT,
                        "top_k": DEFAULT_TOP_K,
                    },
                    "tools": ["search_and_rerank"],
                }))?;

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            _ => Err(McpError::resource_not_found(
                format!("Unknown resource: {}", uri),
                Some(json!({ "uri": uri })),
            )),
        }
    }
}


#[cfg(feature = "cross-encoder")]
async fn load_scorer(settings: &RerankSettings) -> crate::Result<Arc<dyn RelevanceScorer>> {
    use crate::llm::cross_encoder::{CrossEncoder, ScoringError};

    let model = settings.reranker_model;
    info!("   🧮 Loading cross-encoder {}", model);
    let encoder = tokio::task::spawn_blocking(move || CrossEncoder::try_new(model))
        .await
        .map_err(ScoringError::from)??;
    Ok(Arc::new(encoder))
}

#[cfg(not(feature = "cross-encoder"))]
async fn load_scorer(_settings: &RerankSettings) -> crate::Result<Arc<dyn RelevanceScorer>> {
    Err(KgError::Config(
        "built without the `cross-encoder` feature; no reranker available".to_string(),
    ))
}


/// Build the shared clients once and serve until interrupted.
pub async fn run_server(settings: RerankSettings) -> anyhow::Result<()> {
    info!("🚀 Initializing rerank MCP server...");

    let embedder = EmbeddingGenerator::new(
        settings.embedding_model.clone(),
        settings.openai_api_key.clone(),
        settings.embedding_base_url.clone(),
        settings.request_timeout_secs,
    )
    .map_err(KgError::from)?;
    let documents = SupabaseClient::new(
        &settings.supabase_url,
        &settings.supabase_key,
        settings.request_timeout_secs,
    )
    .map_err(KgError::from)?;
    let scorer = load_scorer(&settings).await?;

    let context = RerankContext::new(Arc::new(embedder), Arc::new(documents), scorer);
    let server = RerankMcpServer::with_settings(context, &settings);

    info!("✅ Rerank MCP server ready");
    info!("   📍 Supabase: {}", settings.supabase_url);
    info!("   🤖 Embeddings: {}", settings.embedding_model);
    info!("   🚚 Transport: {}", settings.transport);

    match settings.transport {
        Transport::StreamableHttp => {
            super::http::run_http_server(server, &settings.bind_address()).await?;
        }
        Transport::Stdio => {
            let running = server.serve(stdio()).await.inspect_err(|e| {
                error!("MCP server error: {}", e);
            })?;
            tokio::select! {
                result = running.waiting() => {
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("👋 Interrupted, shutting down");
                }
            }
        }
    }

    Ok(())
}
