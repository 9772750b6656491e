use crate::qa::QaConfig;
use crate::search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Search backend connection
    #[serde(default)]
    pub elasticsearch: ElasticConfig,

    /// Query composition settings
    #[serde(default)]
    pub search: SearchConfig,

    /// QA validation settings
    #[serde(default)]
    pub qa: QaConfig,

    /// Embedding and summarization provider
    #[serde(default)]
    pub llm: LlmConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string());
        Self::load_from(config_path)
    }

    /// Load configuration layering the embedded defaults, the given file (if it
    /// exists) and `HPS__`-prefixed environment variables.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        let path = path.as_ref().to_string_lossy().to_string();

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&path).required(false))
            // Override with environment variables (prefix: HPS_)
            .add_source(
                config::Environment::with_prefix("HPS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticConfig {
    /// Cluster endpoint, e.g. `https://my-deployment.es.us-east-1.aws.elastic.cloud`
    #[serde(default = "default_elastic_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_elastic_api_key_env")]
    pub api_key_env: Option<String>,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification (self-signed clusters only)
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Index names
    #[serde(default)]
    pub indices: IndexNames,
}

impl ElasticConfig {
    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            endpoint: default_elastic_endpoint(),
            api_key_env: default_elastic_api_key_env(),
            timeout_secs: default_timeout(),
            accept_invalid_certs: false,
            indices: IndexNames::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexNames {
    #[serde(default = "default_health_plans_index")]
    pub health_plans: String,

    #[serde(default = "default_search_events_index")]
    pub search_events: String,

    #[serde(default = "default_curations_index")]
    pub curations: String,

    #[serde(default = "default_search_boosts_index")]
    pub search_boosts: String,

    #[serde(default = "default_suggest_index")]
    pub suggest: String,

    #[serde(default = "default_qa_reports_index")]
    pub qa_reports: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            health_plans: default_health_plans_index(),
            search_events: default_search_events_index(),
            curations: default_curations_index(),
            search_boosts: default_search_boosts_index(),
            suggest: default_suggest_index(),
            qa_reports: default_qa_reports_index(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Summary cache TTL (seconds)
    #[serde(default = "default_summary_cache_ttl")]
    pub summary_cache_ttl_secs: u64,

    #[serde(default = "default_summary_cache_capacity")]
    pub summary_cache_capacity: u64,
}

impl LlmConfig {
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: default_llm_api_key_env(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            timeout_secs: default_llm_timeout(),
            summary_cache_ttl_secs: default_summary_cache_ttl(),
            summary_cache_capacity: default_summary_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_elastic_endpoint() -> String {
    "http://localhost:9200".to_string()
}

fn default_elastic_api_key_env() -> Option<String> {
    Some("ELASTIC_API_KEY".to_string())
}

fn default_timeout() -> u64 {
    10
}

fn default_health_plans_index() -> String {
    "health-plans".to_string()
}

fn default_search_events_index() -> String {
    "search-events".to_string()
}

fn default_curations_index() -> String {
    "search-curations".to_string()
}

fn default_search_boosts_index() -> String {
    "search-boosts".to_string()
}

fn default_suggest_index() -> String {
    "health-plans-suggest".to_string()
}

fn default_qa_reports_index() -> String {
    "qa-reports".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    20
}

fn default_summary_cache_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_summary_cache_capacity() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "health-plan-search".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_http_port(), 3000);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_health_plans_index(), "health-plans");
        assert!(default_true());
    }

    #[test]
    fn test_embedded_defaults_deserialize() {
        let config = Config::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config.elasticsearch.indices.curations, "search-curations");
        assert_eq!(config.search.text_fields.len(), 4);
        assert_eq!(config.qa.endpoints.len(), 3);
        assert_eq!(config.qa.sample_size, 10);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[elasticsearch]\nendpoint = \"https://es.internal:9243\"\n\n[qa]\nenvironment = \"staging\"\nsample_size = 25"
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.elasticsearch.endpoint, "https://es.internal:9243");
        assert_eq!(config.qa.environment, "staging");
        assert_eq!(config.qa.sample_size, 25);
        // untouched sections keep their defaults
        assert_eq!(config.elasticsearch.indices.health_plans, "health-plans");
    }
}
