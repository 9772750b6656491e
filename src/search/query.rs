//! Search request types and the query composer

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::{Display, EnumString};

use crate::search::boosts::BoostConfiguration;
use crate::search::config::SearchConfig;
use crate::search::error::{SearchError, SearchResult};

/// Retrieval strategy
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SearchMode {
    /// Lexical only
    Keyword,
    /// Lexical plus nearest-neighbour over the query embedding
    #[default]
    Semantic,
    /// Same composition as `Semantic`; kept as a distinct name for callers
    Hybrid,
}

impl SearchMode {
    pub fn uses_vectors(&self) -> bool {
        !matches!(self, SearchMode::Keyword)
    }
}

/// Result ordering
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SortBy {
    #[default]
    Relevance,
    PlanType,
    County,
}

/// Facet selections applied as non-scoring filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,

    /// Exact plan name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_type: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_type: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tobacco_use: Option<bool>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.clauses().is_empty()
    }

    /// `term`/`terms` clauses for every selected facet
    pub fn clauses(&self) -> Vec<Value> {
        let mut clauses = Vec::new();

        let singles = [
            ("state.keyword", &self.state),
            ("county_code.keyword", &self.county),
            ("plan_name.keyword", &self.plan),
            ("plan_id.keyword", &self.plan_id),
        ];
        for (field, value) in singles {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                clauses.push(json!({ "term": { field: value } }));
            }
        }

        if !self.plan_type.is_empty() {
            clauses.push(json!({ "terms": { "plan_type.keyword": self.plan_type } }));
        }
        if !self.document_type.is_empty() {
            clauses.push(json!({
                "terms": { "metadata.plan_info.document_type.keyword": self.document_type }
            }));
        }
        if let Some(tobacco) = self.tobacco_use {
            clauses.push(json!({ "term": { "tobacco_use": tobacco } }));
        }

        clauses
    }
}

/// A user search, already parsed from the HTTP layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub filters: SearchFilters,
    pub mode: SearchMode,
    pub sort: SortBy,
    /// 1-based page number
    pub page: usize,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filters: SearchFilters::default(),
            mode: SearchMode::default(),
            sort: SortBy::default(),
            page: 1,
            limit: 20,
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sort(mut self, sort: SortBy) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Output of the composer
#[derive(Debug, Clone)]
pub struct ComposedRequest {
    pub body: Value,
    /// Page size actually requested after clamping
    pub size: usize,
    /// Whether a knn clause was included
    pub semantic_applied: bool,
}

const SOURCE_FIELDS: &[&str] = &[
    "title",
    "plan_name",
    "plan_type",
    "plan_id",
    "county_code",
    "state",
    "extracted_text",
    "url",
    "document_url",
    "source",
    "pdf.filename",
    "file_name",
    "metadata",
];

/// Pure translation of a search plus the active boosts into a backend request.
///
/// Deterministic: the same inputs always produce the same body. Boost weights
/// only change per-field multipliers and score functions, never the clause
/// structure or the filters.
#[derive(Debug, Clone)]
pub struct QueryComposer {
    config: SearchConfig,
}

impl QueryComposer {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Lexical clause; `match_all` for blank text
    pub fn text_clause(&self, text: &str, boosts: &BoostConfiguration) -> Value {
        let text = text.trim();
        if text.is_empty() || text == "*" {
            return json!({ "match_all": {} });
        }

        let fields: Vec<String> = self
            .config
            .text_fields
            .iter()
            .map(|field| format!("{}^{}", field, boosts.weight(field)))
            .collect();

        json!({
            "multi_match": {
                "query": text,
                "fields": fields,
                "type": "best_fields",
                "fuzziness": "AUTO"
            }
        })
    }

    fn knn_clause(&self, vector: &[f32], filters: &[Value]) -> Value {
        let mut knn = json!({
            "field": self.config.vector_field,
            "query_vector": vector,
            "k": self.config.knn_k,
            "num_candidates": self.config.knn_num_candidates.max(self.config.knn_k),
        });
        if !filters.is_empty() {
            knn["filter"] = json!(filters);
        }
        json!({ "knn": knn })
    }

    /// The `query` part of the request, including score functions
    pub fn build_query(
        &self,
        query: &SearchQuery,
        boosts: &BoostConfiguration,
        query_vector: Option<&[f32]>,
    ) -> (Value, bool) {
        let lexical = self.text_clause(&query.text, boosts);
        let filters = query.filters.clauses();

        let vector = query_vector
            .filter(|v| !v.is_empty())
            .filter(|_| query.mode.uses_vectors());

        let (inner, semantic_applied) = match vector {
            Some(vector) => (
                json!({
                    "bool": {
                        "should": [lexical, self.knn_clause(vector, &filters)],
                        "minimum_should_match": 1,
                        "filter": filters,
                    }
                }),
                true,
            ),
            None => (
                json!({
                    "bool": {
                        "must": [lexical],
                        "filter": filters,
                    }
                }),
                false,
            ),
        };

        let functions = boosts.score_functions(&self.config.decay);
        if functions.is_empty() {
            return (inner, semantic_applied);
        }

        (
            json!({
                "function_score": {
                    "query": inner,
                    "functions": functions,
                    "score_mode": "multiply",
                    "boost_mode": "multiply",
                }
            }),
            semantic_applied,
        )
    }

    /// Complete `_search` body: query, pagination, collapse, sort and projection
    pub fn build_search_request(
        &self,
        query: &SearchQuery,
        boosts: &BoostConfiguration,
        query_vector: Option<&[f32]>,
    ) -> ComposedRequest {
        let size = self.clamp_limit(query.limit);
        let (q, semantic_applied) = self.build_query(query, boosts, query_vector);

        let mut body = json!({
            "query": q,
            "from": self.offset(query),
            "size": size,
            "track_total_hits": true,
            "_source": SOURCE_FIELDS,
        });

        if let Some(field) = &self.config.collapse_field {
            body["collapse"] = json!({ "field": field });
        }

        match query.sort {
            SortBy::Relevance => {}
            SortBy::PlanType => {
                body["sort"] = json!([{ "plan_id.keyword": { "order": "asc" } }]);
            }
            SortBy::County => {
                body["sort"] = json!([{ "county_code.keyword": { "order": "asc" } }]);
            }
        }

        ComposedRequest {
            body,
            size,
            semantic_applied,
        }
    }

    /// Hits skipped before the requested page; saturates instead of wrapping
    pub fn offset(&self, query: &SearchQuery) -> usize {
        (query.page.max(1) - 1).saturating_mul(self.clamp_limit(query.limit))
    }

    /// Reject pages whose `from + size` exceeds the configured result window
    pub fn check_result_window(&self, query: &SearchQuery) -> SearchResult<()> {
        let end = self.offset(query).saturating_add(self.clamp_limit(query.limit));
        if end > self.config.max_result_window {
            return Err(SearchError::InvalidPage(format!(
                "page {} with limit {} exceeds the result window of {} hits",
                query.page,
                self.clamp_limit(query.limit),
                self.config.max_result_window
            )));
        }
        Ok(())
    }

    pub fn clamp_limit(&self, limit: usize) -> usize {
        let limit = if limit == 0 {
            self.config.default_page_size
        } else {
            limit
        };
        limit.clamp(1, self.config.max_page_size.max(1))
    }
}

static STATE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("TX", r"(?i)\b(texas|tx)\b"),
        ("FL", r"(?i)\b(florida|fl)\b"),
        ("CA", r"(?i)\b(california|ca)\b"),
        ("NY", r"(?i)\b(new york|ny)\b"),
        ("IL", r"(?i)\b(illinois|il)\b"),
        ("PA", r"(?i)\b(pennsylvania|pa)\b"),
        ("OH", r"(?i)\b(ohio|oh)\b"),
        ("GA", r"(?i)\b(georgia|ga)\b"),
        ("NC", r"(?i)\b(north carolina|nc)\b"),
        ("MI", r"(?i)\b(michigan|mi)\b"),
    ]
    .into_iter()
    .map(|(code, pattern)| (code, Regex::new(pattern).expect("valid state pattern")))
    .collect()
});

/// Two-letter code of the first state named in the query, if any
pub fn detect_state_from_query(text: &str) -> Option<&'static str> {
    STATE_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(code, _)| *code)
}
