use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::llm::{Summary, SummaryInput};
use crate::metrics::gather_metrics;
use crate::qa::{render_markdown, QaError, ReportSummary, ValidationReport};
use crate::elastic::DedupReport;
use crate::search::{
    AliasAction, BoostConfiguration, Curation, FacetsResponse, FieldCatalog, IndexSummary,
    SearchFilters, SearchMode, SearchQuery, SearchResponse, SortBy, Suggestion,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

/// Default and maximum number of reports in a history listing
const DEFAULT_REPORT_LIMIT: usize = 10;
const MAX_REPORT_LIMIT: usize = 100;

/// Health check endpoint
///
/// Responds 503 when the search backend is unreachable.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let elasticsearch = match state.client.info().await {
        Ok(_) => "healthy",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the search backend");
            "unhealthy"
        }
    };
    let embeddings = if state.config.llm.api_key().is_some() {
        "configured"
    } else {
        "not_configured"
    };

    let healthy = elasticsearch == "healthy";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: state.config.qa.environment.clone(),
            services: ServiceHealth {
                elasticsearch: elasticsearch.to_string(),
                embeddings: embeddings.to_string(),
            },
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub environment: String,
    pub services: ServiceHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub elasticsearch: String,
    pub embeddings: String,
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

fn require_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(AppError::Validation("Query is required".to_string()));
    }
    Ok(())
}

/// Search with a JSON body
pub async fn search_post(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    request.validate()?;
    require_query(&request.query)?;

    let query = SearchQuery::new(request.query)
        .with_filters(request.filters)
        .with_mode(request.mode)
        .with_sort(request.sort_by)
        .with_page(request.page.unwrap_or(1))
        .with_limit(request.limit.unwrap_or(state.config.search.default_page_size));

    Ok(Json(state.search.search(query).await?))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    #[validate(length(max = 500))]
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[validate(range(min = 1))]
    pub page: Option<usize>,
    #[validate(range(min = 1))]
    pub limit: Option<usize>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub mode: SearchMode,
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Search with query-string parameters; list filters are comma separated
pub async fn search_get(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    params.validate()?;
    require_query(&params.query)?;

    let filters = SearchFilters {
        state: params.state,
        county: params.county,
        plan: params.plan,
        plan_id: params.plan_id,
        plan_type: split_list(params.plan_type),
        document_type: split_list(params.document_type),
        tobacco_use: params.tobacco_use,
    };
    let query = SearchQuery::new(params.query)
        .with_filters(filters)
        .with_mode(params.mode.unwrap_or_default())
        .with_sort(params.sort_by.unwrap_or_default())
        .with_page(params.page.unwrap_or(1))
        .with_limit(params.limit.unwrap_or(state.config.search.default_page_size));

    Ok(Json(state.search.search(query).await?))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    #[validate(length(max = 500))]
    pub query: String,
    pub state: Option<String>,
    pub county: Option<String>,
    pub plan: Option<String>,
    pub plan_id: Option<String>,
    pub plan_type: Option<String>,
    pub document_type: Option<String>,
    pub tobacco_use: Option<bool>,
    pub mode: Option<SearchMode>,
    pub sort_by: Option<SortBy>,
    #[validate(range(min = 1))]
    pub page: Option<usize>,
    #[validate(range(min = 1))]
    pub limit: Option<usize>,
}

/// Facet counts for the current query text
pub async fn facets(
    State(state): State<AppState>,
    Query(params): Query<FacetParams>,
) -> Result<Json<FacetsResponse>> {
    let text = params.query.unwrap_or_default();
    Ok(Json(state.search.facets(&text).await?))
}

#[derive(Debug, Deserialize)]
pub struct FacetParams {
    pub query: Option<String>,
}

/// Completion suggestions; never fails
pub async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Json<SuggestResponse> {
    let prefix = params.q.unwrap_or_default();
    let suggestions = if prefix.trim().is_empty() {
        Vec::new()
    } else {
        state.search.suggest(prefix.trim()).await
    };
    Json(SuggestResponse { suggestions })
}

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<Suggestion>,
}

/// Best-effort summary of the top results
pub async fn ai_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<Summary>> {
    request.validate()?;
    require_query(&request.query)?;
    Ok(Json(
        state
            .summaries
            .summarize(request.query.trim(), &request.results)
            .await,
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SummaryRequest {
    #[serde(default)]
    #[validate(length(max = 500))]
    pub query: String,
    #[serde(default)]
    pub results: Vec<SummaryInput>,
}

/// Active boost configuration, defaults when none is stored or readable
pub async fn get_boosts(State(state): State<AppState>) -> Json<BoostConfiguration> {
    Json(state.search.load_boosts_fail_open().await)
}

/// Store a new boost configuration version
pub async fn save_boosts(
    State(state): State<AppState>,
    Json(config): Json<BoostConfiguration>,
) -> Result<Json<SaveBoostsResponse>> {
    let saved = state.search.save_boosts(config).await?;
    Ok(Json(SaveBoostsResponse {
        ok: true,
        config: saved,
    }))
}

#[derive(Debug, Serialize)]
pub struct SaveBoostsResponse {
    pub ok: bool,
    pub config: BoostConfiguration,
}

/// Fields of the concrete health plan index that boosts can target
pub async fn boost_fields(State(state): State<AppState>) -> Result<Json<FieldCatalog>> {
    Ok(Json(state.search.resolve_field_catalog().await?))
}

/// Every curation, most recently updated first
pub async fn list_curations(State(state): State<AppState>) -> Result<Json<CurationList>> {
    let items = state
        .search
        .list_curations()
        .await?
        .into_iter()
        .map(|curation| CurationItem {
            id: curation.id(),
            curation,
        })
        .collect();
    Ok(Json(CurationList { items }))
}

#[derive(Debug, Serialize)]
pub struct CurationList {
    pub items: Vec<CurationItem>,
}

#[derive(Debug, Serialize)]
pub struct CurationItem {
    pub id: String,
    #[serde(flatten)]
    pub curation: Curation,
}

/// Create or replace the curation for a query
pub async fn save_curation(
    State(state): State<AppState>,
    Json(request): Json<SaveCurationRequest>,
) -> Result<(StatusCode, Json<CurationItem>)> {
    request.validate()?;
    let curation = state
        .search
        .save_curation(&request.query, request.pins, request.excludes)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CurationItem {
            id: curation.id(),
            curation,
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SaveCurationRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 500))]
    pub query: String,
    #[serde(default)]
    pub pins: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// Remove the curation for `?query=`
pub async fn delete_curation(
    State(state): State<AppState>,
    Query(params): Query<CurationParams>,
) -> Result<Json<Value>> {
    let query = params
        .query
        .ok_or_else(|| AppError::Validation("query is required".to_string()))?;
    state.search.delete_curation(&query).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct CurationParams {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IndexList {
    pub alias: String,
    pub indices: Vec<IndexSummary>,
}

/// Versioned content indices, newest first
pub async fn list_indices(State(state): State<AppState>) -> Result<Json<IndexList>> {
    let indices = state.indices.list().await?;
    Ok(Json(IndexList {
        alias: state.indices.alias().to_string(),
        indices,
    }))
}

/// Delete a versioned index after detaching the search alias from it
pub async fn delete_index(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    state.indices.delete(&name).await?;
    Ok(Json(json!({ "ok": true, "deleted": name })))
}

#[derive(Debug, Deserialize)]
pub struct AliasRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub alias: String,
}

/// Add, remove or repoint an alias
pub async fn update_alias(
    State(state): State<AppState>,
    Json(request): Json<AliasRequest>,
) -> Result<Json<Value>> {
    if request.action.is_empty() || request.index.is_empty() || request.alias.is_empty() {
        return Err(AppError::Validation(
            "action, index and alias are required".to_string(),
        ));
    }
    let action: AliasAction = request.action.parse().map_err(|_| {
        AppError::Validation(format!(
            "unknown alias action '{}', expected add, remove or repoint",
            request.action
        ))
    })?;
    state
        .indices
        .update_alias(action, &request.index, &request.alias)
        .await?;
    Ok(Json(json!({
        "ok": true,
        "action": action,
        "index": request.index,
        "alias": request.alias,
    })))
}

/// Remove duplicate documents per source URL, keeping the newest
pub async fn deduplicate(State(state): State<AppState>) -> Result<Json<DedupReport>> {
    Ok(Json(state.indices.deduplicate().await?))
}

/// Usage information for the validation endpoint
pub async fn validate_usage(State(state): State<AppState>) -> Json<Value> {
    let qa = state.qa.config();
    let endpoints: Vec<&str> = qa
        .endpoints
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    Json(json!({
        "message": "QA Validation API endpoint",
        "usage": "POST to /api/qa/validate to run full validation suite",
        "stages": [
            "Connectivity",
            "Index Health",
            "API Endpoints",
            "Search Functionality",
            "Data Integrity",
            "Performance"
        ],
        "endpoints": endpoints,
        "environment": qa.environment,
    }))
}

/// Run the full validation suite and store the report
pub async fn run_validation(
    State(state): State<AppState>,
    request: Option<Json<ValidateRequest>>,
) -> Json<ValidationResponse> {
    let environment = request.and_then(|Json(r)| r.environment);
    let mut report = state.qa.run_full_validation(environment.as_deref()).await;

    match state.reports.save(&report).await {
        Ok(id) => report.id = Some(id),
        Err(e) => tracing::warn!(error = %e, "Failed to store QA report"),
    }

    let markdown_report = render_markdown(&report);
    Json(ValidationResponse {
        success: true,
        report,
        markdown_report,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidateRequest {
    pub environment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub success: bool,
    pub report: ValidationReport,
    pub markdown_report: String,
}

/// Stored report summaries, newest first
pub async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<ReportList>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_REPORT_LIMIT)
        .clamp(1, MAX_REPORT_LIMIT);
    let reports = state
        .reports
        .list(params.environment.as_deref(), limit)
        .await?;
    Ok(Json(ReportList {
        total: reports.len(),
        reports,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub environment: Option<String>,
    pub limit: Option<usize>,
    pub older_than: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ReportList {
    pub reports: Vec<ReportSummary>,
    pub total: usize,
}

/// Delete reports older than `?olderThan=` (RFC 3339)
pub async fn prune_reports(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Value>> {
    let older_than = params
        .older_than
        .ok_or_else(|| QaError::InvalidInput("olderThan parameter is required".to_string()))?;
    let deleted = state
        .reports
        .prune(params.environment.as_deref(), older_than)
        .await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

/// Corpus-wide data quality report
pub async fn data_quality(State(state): State<AppState>) -> Json<ValidationResponse> {
    let report = state.data_quality.analyze().await;
    let markdown_report = render_markdown(&report);
    Json(ValidationResponse {
        success: true,
        report,
        markdown_report,
    })
}
