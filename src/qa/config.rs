use serde::{Deserialize, Serialize};

/// An application endpoint checked by the QA run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointCheck {
    pub name: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Path relative to the app base URL, query string allowed
    pub path: String,
}

impl EndpointCheck {
    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: default_method(),
            path: path.into(),
        }
    }
}

/// QA validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    /// Base URL of the running application for endpoint checks
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,

    /// Environment label stamped on reports
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointCheck>,

    /// Documents sampled by the integrity check
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Fields every sampled document should carry
    #[serde(default = "default_required_document_fields")]
    pub required_document_fields: Vec<String>,

    /// Fields the index mapping should declare
    #[serde(default = "default_required_mapping_fields")]
    pub required_mapping_fields: Vec<String>,

    #[serde(default = "default_search_pass_ms")]
    pub search_pass_ms: u64,

    #[serde(default = "default_search_warn_ms")]
    pub search_warn_ms: u64,

    #[serde(default = "default_count_pass_ms")]
    pub count_pass_ms: u64,

    #[serde(default = "default_count_warn_ms")]
    pub count_warn_ms: u64,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            app_base_url: default_app_base_url(),
            environment: default_environment(),
            endpoints: default_endpoints(),
            sample_size: default_sample_size(),
            required_document_fields: default_required_document_fields(),
            required_mapping_fields: default_required_mapping_fields(),
            search_pass_ms: default_search_pass_ms(),
            search_warn_ms: default_search_warn_ms(),
            count_pass_ms: default_count_pass_ms(),
            count_warn_ms: default_count_warn_ms(),
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_app_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_endpoints() -> Vec<EndpointCheck> {
    vec![
        EndpointCheck::get("Health Check", "/api/health"),
        EndpointCheck::get("Search API", "/api/search?query=health"),
        EndpointCheck::get("Facets API", "/api/facets"),
    ]
}

fn default_sample_size() -> usize {
    10
}

fn default_required_document_fields() -> Vec<String> {
    vec![
        "plan_name".to_string(),
        "state".to_string(),
        "document_url".to_string(),
    ]
}

fn default_required_mapping_fields() -> Vec<String> {
    vec!["plan_name".to_string(), "document_url".to_string()]
}

fn default_search_pass_ms() -> u64 {
    1000
}

fn default_search_warn_ms() -> u64 {
    3000
}

fn default_count_pass_ms() -> u64 {
    500
}

fn default_count_warn_ms() -> u64 {
    1000
}
