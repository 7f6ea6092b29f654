use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use config::{Config, Environment};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use strum::{Display, EnumString, IntoStaticStr};

use crate::core::error::{KgError, Result};
use crate::utils::mask_secret;
use crate::{DEFAULT_COLLECTION, DEFAULT_EMBEDDING_MODEL, DEFAULT_GROUP_ID, DEFAULT_OPENAI_URL};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum Transport {
    /// MCP over streamable HTTP, served with SSE responses.
    #[strum(to_string = "sse", serialize = "http", serialize = "streamable-http")]
    StreamableHttp,
    #[strum(to_string = "stdio")]
    Stdio,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum RerankerModel {
    #[strum(to_string = "bge-reranker-base")]
    BgeRerankerBase,
    #[strum(to_string = "bge-reranker-v2-m3")]
    BgeRerankerV2M3,
    #[strum(to_string = "jina-reranker-v1-turbo-en")]
    JinaRerankerV1TurboEn,
}


/// Raw view of the process environment. `config` lowercases variable names,
/// so `SUPABASE_URL` lands in `supabase_url`. Every value stays a string so
/// secrets like `0123` reach us untouched; numbers are parsed afterwards.
#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    supabase_url: Option<String>,
    supabase_key: Option<String>,
    openai_api_key: Option<String>,
    embedding_model: Option<String>,
    embedding_base_url: Option<String>,
    reranker_model: Option<String>,
    transport: Option<String>,
    host: Option<String>,
    port: Option<String>,
    request_timeout_secs: Option<String>,

    neo4j_uri: Option<String>,
    neo4j_user: Option<String>,
    neo4j_password: Option<String>,
    neo4j_database: Option<String>,
    group_id: Option<String>,

    probe_table: Option<String>,
}


fn load_env<T: DeserializeOwned>(source: Option<HashMap<String, String>>) -> Result<T> {
    let settings = Config::builder()
        .add_source(Environment::default().source(source))
        .build()?;
    Ok(settings.try_deserialize::<T>()?)
}


fn require(value: Option<String>, var: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| KgError::Config(format!("{var} must be set")))
}


fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}


fn parse_or<T: FromStr>(value: Option<String>, var: &str, default: T) -> Result<T> {
    match non_empty(value) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| KgError::Config(format!("{var} must be a non-negative integer, got '{v}'"))),
        None => Ok(default),
    }
}


#[derive(Clone)]
pub struct RerankSettings {
    pub supabase_url: String,
    pub supabase_key: String,
    pub openai_api_key: String,
    pub embedding_model: String,
    pub embedding_base_url: String,
    pub reranker_model: RerankerModel,
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl RerankSettings {

    pub fn from_env() -> Result<Self> {
        Self::from_source(None)
    }

    /// Build from an explicit variable map instead of the process environment.
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_source(Some(vars))
    }

    fn from_source(source: Option<HashMap<String, String>>) -> Result<Self> {
        let raw: RawEnv = load_env(source)?;

        let transport = match raw.transport.as_deref() {
            Some(t) => Transport::from_str(t.trim()).map_err(|_| {
                KgError::Config(format!("TRANSPORT must be 'sse' or 'stdio', got '{t}'"))
            })?,
            None => Transport::StreamableHttp,
        };

        let reranker_model = match raw.reranker_model.as_deref() {
            Some(m) => RerankerModel::from_str(m.trim())
                .map_err(|_| KgError::Config(format!("Unknown RERANKER_MODEL '{m}'")))?,
            None => RerankerModel::BgeRerankerBase,
        };

        Ok(Self {
            supabase_url: require(raw.supabase_url, "SUPABASE_URL")?,
            supabase_key: require(raw.supabase_key, "SUPABASE_KEY")?,
            openai_api_key: require(raw.openai_api_key, "OPENAI_API_KEY")?,
            embedding_model: non_empty(raw.embedding_model)
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_base_url: non_empty(raw.embedding_base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            reranker_model,
            transport,
            host: non_empty(raw.host).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(raw.port, "PORT", 8050)?,
            request_timeout_secs: parse_or(raw.request_timeout_secs, "REQUEST_TIMEOUT_SECS", 30)?,
        })
    }


    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for RerankSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RerankSettings")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &mask_secret(&self.supabase_key))
            .field("openai_api_key", &mask_secret(&self.openai_api_key))
            .field("embedding_model", &self.embedding_model)
            .field("embedding_base_url", &self.embedding_base_url)
            .field("reranker_model", &self.reranker_model)
            .field("transport", &self.transport)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}


#[derive(Clone)]
pub struct GraphSettings {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_database: String,
    /// Enables vector search over relationship facts when present.
    pub openai_api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_base_url: String,
    pub group_id: String,
    pub request_timeout_secs: u64,
}

impl GraphSettings {

    pub fn from_env() -> Result<Self> {
        Self::from_source(None)
    }


    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_source(Some(vars))
    }

    fn from_source(source: Option<HashMap<String, String>>) -> Result<Self> {
        let raw: RawEnv = load_env(source)?;

        Ok(Self {
            neo4j_uri: non_empty(raw.neo4j_uri)
                .unwrap_or_else(|| "http://localhost:7474".to_string()),
            neo4j_user: non_empty(raw.neo4j_user).unwrap_or_else(|| "neo4j".to_string()),
            neo4j_password: non_empty(raw.neo4j_password)
                .unwrap_or_else(|| "password".to_string()),
            neo4j_database: non_empty(raw.neo4j_database).unwrap_or_else(|| "neo4j".to_string()),
            openai_api_key: non_empty(raw.openai_api_key),
            embedding_model: non_empty(raw.embedding_model)
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_base_url: non_empty(raw.embedding_base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            group_id: non_empty(raw.group_id).unwrap_or_else(|| DEFAULT_GROUP_ID.to_string()),
            request_timeout_secs: parse_or(raw.request_timeout_secs, "REQUEST_TIMEOUT_SECS", 30)?,
        })
    }
}

impl fmt::Debug for GraphSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphSettings")
            .field("neo4j_uri", &self.neo4j_uri)
            .field("neo4j_user", &self.neo4j_user)
            .field("neo4j_password", &mask_secret(&self.neo4j_password))
            .field("neo4j_database", &self.neo4j_database)
            .field("openai_api_key", &self.openai_api_key.as_deref().map(mask_secret))
            .field("embedding_model", &self.embedding_model)
            .field("group_id", &self.group_id)
            .finish()
    }
}


/// Credentials stay optional here: the probe reports missing ones instead of failing.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub table: String,
    pub request_timeout_secs: u64,
}

impl ProbeSettings {

    pub fn from_env() -> Result<Self> {
        Self::from_source(None)
    }


    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_source(Some(vars))
    }

    fn from_source(source: Option<HashMap<String, String>>) -> Result<Self> {
        let raw: RawEnv = load_env(source)?;
        Ok(Self {
            supabase_url: non_empty(raw.supabase_url),
            supabase_key: non_empty(raw.supabase_key),
            table: non_empty(raw.probe_table).unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            request_timeout_secs: parse_or(raw.request_timeout_secs, "REQUEST_TIMEOUT_SECS", 30)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn service_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_KEY", "service-role-key"),
            ("OPENAI_API_KEY", "sk-test-key-123"),
        ]
    }

    #[test]
    fn test_rerank_settings_defaults() {
        let settings = RerankSettings::from_map(vars(&service_vars())).unwrap();
        assert_eq!(settings.transport, Transport::StreamableHttp);
        assert_eq!(settings.bind_address(), "0.0.0.0:8050");
        assert_eq!(settings.embedding_model, "text-embedding-3-small");
        assert_eq!(settings.reranker_model, RerankerModel::BgeRerankerBase);
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn test_rerank_settings_overrides() {
        let mut pairs = service_vars();
        pairs.extend([
            ("TRANSPORT", "stdio"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("RERANKER_MODEL", "jina-reranker-v1-turbo-en"),
        ]);
        let settings = RerankSettings::from_map(vars(&pairs)).unwrap();
        assert_eq!(settings.transport, Transport::Stdio);
        assert_eq!(settings.bind_address(), "127.0.0.1:9000");
        assert_eq!(settings.reranker_model, RerankerModel::JinaRerankerV1TurboEn);
    }

    #[test]
    fn test_missing_required_var_is_config_error() {
        let err = RerankSettings::from_map(vars(&[("SUPABASE_URL", "https://x.supabase.co")]))
            .unwrap_err();
        match err {
            KgError::Config(msg) => assert!(msg.contains("SUPABASE_KEY")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let mut pairs = service_vars();
        pairs.push(("TRANSPORT", "carrier-pigeon"));
        assert!(matches!(
            RerankSettings::from_map(vars(&pairs)),
            Err(KgError::Config(_))
        ));
    }

    #[test]
    fn test_transport_aliases() {
        assert_eq!(Transport::from_str("SSE").unwrap(), Transport::StreamableHttp);
        assert_eq!(Transport::from_str("http").unwrap(), Transport::StreamableHttp);
        assert_eq!(Transport::StreamableHttp.to_string(), "sse");
    }

    #[test]
    fn test_debug_masks_secrets() {
        let settings = RerankSettings::from_map(vars(&service_vars())).unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("sk-test-key-123"));
        assert!(!rendered.contains("service-role-key"));
    }

    #[test]
    fn test_graph_settings_defaults() {
        let settings = GraphSettings::from_map(HashMap::new()).unwrap();
        assert_eq!(settings.neo4j_uri, "http://localhost:7474");
        assert_eq!(settings.neo4j_user, "neo4j");
        assert_eq!(settings.group_id, "ai_demo");
        assert!(settings.openai_api_key.is_none());
    }

    #[test]
    fn test_numeric_looking_secrets_kept_verbatim() {
        let graph = GraphSettings::from_map(vars(&[
            ("NEO4J_PASSWORD", "0123"),
            ("GROUP_ID", "007"),
        ]))
        .unwrap();
        assert_eq!(graph.neo4j_password, "0123");
        assert_eq!(graph.group_id, "007");

        let mut pairs = service_vars();
        pairs.retain(|(k, _)| *k != "SUPABASE_KEY");
        pairs.extend([("SUPABASE_KEY", "000123"), ("EMBEDDING_MODEL", "1.50")]);
        let rerank = RerankSettings::from_map(vars(&pairs)).unwrap();
        assert_eq!(rerank.supabase_key, "000123");
        assert_eq!(rerank.embedding_model, "1.50");

        let probe = ProbeSettings::from_map(vars(&[("SUPABASE_KEY", "TRUE"), ("PROBE_TABLE", "nan")])).unwrap();
        assert_eq!(probe.supabase_key.as_deref(), Some("TRUE"));
        assert_eq!(probe.table, "nan");
    }

    #[test]
    fn test_numeric_settings_parsed() {
        let graph = GraphSettings::from_map(vars(&[("REQUEST_TIMEOUT_SECS", " 5 ")])).unwrap();
        assert_eq!(graph.request_timeout_secs, 5);

        let mut pairs = service_vars();
        pairs.push(("PORT", "seventy"));
        match RerankSettings::from_map(vars(&pairs)) {
            Err(KgError::Config(msg)) => assert!(msg.contains("PORT")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_probe_settings_keep_missing_credentials() {
        let settings = ProbeSettings::from_map(HashMap::new()).unwrap();
        assert!(settings.supabase_url.is_none());
        assert_eq!(settings.table, "documents_reranking");
    }
}
