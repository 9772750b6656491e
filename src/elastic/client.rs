//! Long-lived REST client for the search backend

use crate::config::{ElasticConfig, IndexNames};
use crate::elastic::error::{ElasticError, ElasticResult};
use crate::elastic::types::{
    CatIndex, ClusterInfo, CountResponse, DedupReport, DeleteByQueryResponse, GetResponse,
    IndexResponse, SearchResponseBody,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Error bodies are truncated to this many bytes before being surfaced.
const MAX_ERROR_BODY: usize = 2048;

/// Columns requested from `_cat/indices`
const CAT_INDEX_COLUMNS: &str = "index,docs.count,store.size,creation.date,health";

/// Duplicate groups inspected by one deduplication pass
const MAX_DUPLICATE_GROUPS: usize = 10_000;

/// Thin typed wrapper over the Elasticsearch REST API.
///
/// One instance is built at startup and shared (behind an `Arc`) by the query
/// composer, the configuration stores and the QA engine, so every component
/// goes through the same connection pool and credentials.
#[derive(Clone)]
pub struct ElasticClient {
    http: Client,
    base: Url,
    api_key: Option<String>,
    indices: IndexNames,
}

impl ElasticClient {
    /// Build a client from configuration, resolving the API key from the environment
    pub fn new(config: &ElasticConfig) -> ElasticResult<Self> {
        Self::with_api_key(config, config.api_key())
    }

    /// Build a client with an explicit API key
    pub fn with_api_key(config: &ElasticConfig, api_key: Option<String>) -> ElasticResult<Self> {
        let base = Url::parse(&config.endpoint)
            .map_err(|e| ElasticError::InvalidUrl(format!("{}: {}", config.endpoint, e)))?;
        if base.cannot_be_a_base() {
            return Err(ElasticError::InvalidUrl(config.endpoint.clone()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ElasticError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base,
            api_key,
            indices: config.indices.clone(),
        })
    }

    /// Configured index names
    pub fn indices(&self) -> &IndexNames {
        &self.indices
    }

    /// Whether calls carry an API key
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Cluster endpoint
    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> ElasticResult<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ElasticError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(reqwest::header::AUTHORIZATION, format!("ApiKey {}", key)),
            None => builder,
        }
    }

    async fn execute(&self, builder: RequestBuilder) -> ElasticResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        Err(ElasticError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ElasticResult<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ElasticError::Decode(e.to_string()))
    }

    /// `GET /`: liveness plus identifying metadata
    pub async fn info(&self) -> ElasticResult<ClusterInfo> {
        let url = self.url(&[])?;
        let response = self.execute(self.request(Method::GET, url)).await?;
        Self::decode(response).await
    }

    /// `GET /_security/_authenticate`, returning the raw status.
    ///
    /// Only transport failures are errors; the caller interprets the status.
    pub async fn authenticate(&self) -> ElasticResult<StatusCode> {
        let url = self.url(&["_security", "_authenticate"])?;
        let response = self.request(Method::GET, url).send().await?;
        Ok(response.status())
    }

    /// `HEAD /{index}`
    pub async fn index_exists(&self, index: &str) -> ElasticResult<bool> {
        let url = self.url(&[index])?;
        let response = self.request(Method::HEAD, url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ElasticError::Status {
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    /// `POST /{index}/_count`
    pub async fn count(&self, index: &str, query: Option<&Value>) -> ElasticResult<u64> {
        let url = self.url(&[index, "_count"])?;
        let mut builder = self.request(Method::POST, url);
        if let Some(query) = query {
            builder = builder.json(&json!({ "query": query }));
        }
        let response = self.execute(builder).await?;
        let body: CountResponse = Self::decode(response).await?;
        Ok(body.count)
    }

    /// `POST /{index}/_search`
    pub async fn search(&self, index: &str, body: &Value) -> ElasticResult<SearchResponseBody> {
        debug!(index = %index, "Executing search");
        let url = self.url(&[index, "_search"])?;
        let response = self
            .execute(self.request(Method::POST, url).json(body))
            .await?;
        Self::decode(response).await
    }

    /// `GET /{index}/_doc/{id}`; `None` when the document (or index) is absent
    pub async fn get_document(&self, index: &str, id: &str) -> ElasticResult<Option<Value>> {
        let url = self.url(&[index, "_doc", id])?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ElasticError::Status { status, body });
        }
        let body: GetResponse = Self::decode(response).await?;
        Ok(if body.found { body.source } else { None })
    }

    /// `PUT /{index}/_doc/{id}` or `POST /{index}/_doc` when no id is given.
    ///
    /// With `refresh` the call waits until the write is visible to searches.
    pub async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        document: &Value,
        refresh: bool,
    ) -> ElasticResult<IndexResponse> {
        let (method, mut url) = match id {
            Some(id) => (Method::PUT, self.url(&[index, "_doc", id])?),
            None => (Method::POST, self.url(&[index, "_doc"])?),
        };
        if refresh {
            url.query_pairs_mut().append_pair("refresh", "wait_for");
        }
        let response = self
            .execute(self.request(method, url).json(document))
            .await?;
        Self::decode(response).await
    }

    /// `DELETE /{index}/_doc/{id}`; returns whether the document existed
    pub async fn delete_document(&self, index: &str, id: &str, refresh: bool) -> ElasticResult<bool> {
        let mut url = self.url(&[index, "_doc", id])?;
        if refresh {
            url.query_pairs_mut().append_pair("refresh", "wait_for");
        }
        let response = self.request(Method::DELETE, url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ElasticError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// `GET /{index}/_mapping`, keyed by concrete index name
    pub async fn get_mapping(&self, index: &str) -> ElasticResult<Value> {
        let url = self.url(&[index, "_mapping"])?;
        let response = self.execute(self.request(Method::GET, url)).await?;
        Self::decode(response).await
    }

    /// `GET /_alias/{name}`; concrete indices behind an alias, empty if `name` is not one
    pub async fn resolve_alias(&self, name: &str) -> ElasticResult<Vec<String>> {
        let url = self.url(&["_alias", name])?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(ElasticError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body: serde_json::Map<String, Value> = Self::decode(response).await?;
        let mut names: Vec<String> = body.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// `POST /{index}/_delete_by_query`; returns the number of deleted documents
    pub async fn delete_by_query(&self, index: &str, query: &Value) -> ElasticResult<u64> {
        let url = self.url(&[index, "_delete_by_query"])?;
        let response = self
            .execute(
                self.request(Method::POST, url)
                    .json(&json!({ "query": query })),
            )
            .await?;
        let body: DeleteByQueryResponse = Self::decode(response).await?;
        Ok(body.deleted)
    }

    /// `GET /_cat/indices/{pattern}?format=json`
    pub async fn cat_indices(&self, pattern: &str) -> ElasticResult<Vec<CatIndex>> {
        let mut url = self.url(&["_cat", "indices", pattern])?;
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("h", CAT_INDEX_COLUMNS);
        let response = self.execute(self.request(Method::GET, url)).await?;
        Self::decode(response).await
    }

    /// `POST /_aliases`; all actions are applied atomically
    pub async fn update_aliases(&self, actions: &[Value]) -> ElasticResult<()> {
        let url = self.url(&["_aliases"])?;
        self.execute(
            self.request(Method::POST, url)
                .json(&json!({ "actions": actions })),
        )
        .await?;
        Ok(())
    }

    /// `DELETE /{index}`; returns whether the index existed
    pub async fn delete_index(&self, index: &str) -> ElasticResult<bool> {
        let url = self.url(&[index])?;
        let response = self.request(Method::DELETE, url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ElasticError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Delete all but the newest document for every value of `field` held by
    /// more than one document. "Newest" is the highest `sort_field`.
    pub async fn deduplicate_by_field(
        &self,
        index: &str,
        field: &str,
        sort_field: &str,
    ) -> ElasticResult<DedupReport> {
        let groups = self
            .search(
                index,
                &json!({
                    "size": 0,
                    "aggs": {
                        "duplicates": {
                            "terms": {
                                "field": field,
                                "min_doc_count": 2,
                                "size": MAX_DUPLICATE_GROUPS
                            }
                        }
                    }
                }),
            )
            .await?;

        let buckets: Vec<(Value, u64)> = groups
            .aggregations
            .as_ref()
            .and_then(|a| a.pointer("/duplicates/buckets"))
            .and_then(Value::as_array)
            .map(|buckets| {
                buckets
                    .iter()
                    .filter_map(|b| {
                        Some((b.get("key")?.clone(), b.get("doc_count")?.as_u64()?))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut report = DedupReport {
            duplicate_groups: buckets.len(),
            removed: 0,
        };

        for (key, doc_count) in buckets {
            let copies = self
                .search(
                    index,
                    &json!({
                        "size": doc_count,
                        "_source": false,
                        "query": { "term": { field: key } },
                        "sort": [{ sort_field: { "order": "desc", "unmapped_type": "date" } }]
                    }),
                )
                .await?;

            for hit in copies.hits.hits.iter().skip(1) {
                let target = hit.index.as_deref().unwrap_or(index);
                if self.delete_document(target, &hit.id, false).await? {
                    report.removed += 1;
                }
            }
        }

        info!(
            index = %index,
            field = %field,
            groups = report.duplicate_groups,
            removed = report.removed,
            "Deduplication finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> ElasticClient {
        let config = ElasticConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        };
        ElasticClient::with_api_key(&config, None).unwrap()
    }

    #[test]
    fn test_url_joins_segments() {
        let client = client("http://localhost:9200");
        let url = client.url(&["health-plans", "_search"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/health-plans/_search");
    }

    #[test]
    fn test_url_keeps_base_path_prefix() {
        let client = client("https://proxy.example.com/es/");
        let url = client.url(&["health-plans", "_count"]).unwrap();
        assert_eq!(url.as_str(), "https://proxy.example.com/es/health-plans/_count");
    }

    #[test]
    fn test_url_escapes_document_ids() {
        let client = client("http://localhost:9200");
        // base64 ids may contain '/' and '='
        let url = client
            .url(&["search-curations", "_doc", "YnJvbnplL3BsYW4="])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9200/search-curations/_doc/YnJvbnplL3BsYW4="
        );
        let url = client.url(&["search-curations", "_doc", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/search-curations/_doc/a%2Fb");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = ElasticConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ElasticClient::with_api_key(&config, None),
            Err(ElasticError::InvalidUrl(_))
        ));
    }
}
