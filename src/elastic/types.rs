//! Response shapes of the Elasticsearch REST endpoints we consume

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub name: Option<String>,
    pub cluster_name: String,
    #[serde(default)]
    pub version: Option<VersionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub number: String,
    #[serde(default)]
    pub build_flavor: Option<String>,
}

/// `hits.total` is either a bare number (legacy) or `{value, relation}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Count(u64),
    Object { value: u64, relation: String },
}

impl TotalHits {
    pub fn value(&self) -> u64 {
        match self {
            TotalHits::Count(v) => *v,
            TotalHits::Object { value, .. } => *value,
        }
    }
}

/// A single raw hit from `_search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

/// `POST /{index}/_search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponseBody {
    #[serde(default)]
    pub took: Option<u64>,
    #[serde(default)]
    pub hits: HitsEnvelope,
    #[serde(default)]
    pub aggregations: Option<Value>,
    #[serde(default)]
    pub suggest: Option<Value>,
}

impl SearchResponseBody {
    pub fn total(&self) -> u64 {
        self.hits
            .total
            .as_ref()
            .map(TotalHits::value)
            .unwrap_or(self.hits.hits.len() as u64)
    }
}

/// `GET /{index}/_count`
#[derive(Debug, Clone, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// `PUT|POST /{index}/_doc`
#[derive(Debug, Clone, Deserialize)]
pub struct IndexResponse {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub result: Option<String>,
}

/// `GET /{index}/_doc/{id}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GetResponse {
    #[serde(default)]
    pub found: bool,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

/// `POST /{index}/_delete_by_query`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeleteByQueryResponse {
    #[serde(default)]
    pub deleted: u64,
}

/// One row of `GET /_cat/indices?format=json`; every value arrives as a string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatIndex {
    pub index: String,
    #[serde(rename = "docs.count", default)]
    pub docs_count: Option<String>,
    #[serde(rename = "store.size", default)]
    pub store_size: Option<String>,
    #[serde(rename = "creation.date", default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub health: Option<String>,
}

/// Outcome of removing documents that share a field value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupReport {
    /// Distinct values held by more than one document
    pub duplicate_groups: usize,
    /// Documents deleted, keeping the newest of each group
    pub removed: usize,
}
