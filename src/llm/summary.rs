use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::llm::error::{LlmError, LlmResult};
use crate::search::normalize_query;

/// Results that feed the prompt and the cache key
const CONTEXT_RESULTS: usize = 3;

/// Excerpt length per result in the prompt
const EXCERPT_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "You are a knowledgeable and empathetic assistant for health insurance plans. \
You have a context window with details about specific plans: premiums, deductibles, covered services, \
pharmacy benefits and networks. Help the user find which plans best match their criteria. \
Only use facts from the provided context; if a detail is missing, say so. \
Explain trade-offs between plan options and cite the plan a fact comes from. \
End with a reminder to confirm details with the official plan documents before enrolling.";

/// A search result as sent by the UI for summarization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub plan_type: Option<String>,
    #[serde(default)]
    pub county_code: Option<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub document_url: Option<String>,
}

impl SummaryInput {
    fn name(&self) -> &str {
        self.plan_name
            .as_deref()
            .or(self.plan_id.as_deref())
            .unwrap_or("Unnamed plan")
    }

    fn key(&self) -> &str {
        self.id
            .as_deref()
            .or(self.document_url.as_deref())
            .or(self.url.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Cache,
    Openai,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    pub source: SummarySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub cached: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Cache key: normalized query plus a digest of the top result ids
pub fn cache_key(query: &str, results: &[SummaryInput]) -> String {
    let ids: Vec<&str> = results
        .iter()
        .take(CONTEXT_RESULTS)
        .map(SummaryInput::key)
        .collect();
    let digest = Sha256::digest(ids.join("|").as_bytes());
    let hash: String = digest.iter().take(8).fold(String::new(), |mut acc, b| {
        let _ = write!(acc, "{:02x}", b);
        acc
    });
    format!("ai-summary:{}:{}", normalize_query(query), hash)
}

/// Deterministic summary used when the LLM is unavailable
pub fn fallback_summary(query: &str, results: &[SummaryInput]) -> String {
    if results.is_empty() {
        return format!(
            "No health plans found matching \"{}\". Try terms like \"preventive care\", \
\"emergency services\", or \"prescription coverage\".",
            query
        );
    }

    let mut out = format!(
        "I found {} health plan documents matching \"{}\".\n\nThe top results include:\n",
        results.len(),
        query
    );
    for r in results.iter().take(CONTEXT_RESULTS) {
        let _ = writeln!(
            out,
            "• {} - {} (County: {})",
            r.name(),
            r.plan_type.as_deref().unwrap_or("Unknown type"),
            r.county_code.as_deref().unwrap_or("N/A")
        );
    }
    out.push_str("\nOpen any document below to view full plan details.");
    out
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn user_prompt(query: &str, results: &[SummaryInput]) -> String {
    let mut prompt = format!("User searched for: \"{}\"\n\nContext (Top Results):\n", query);
    for (i, r) in results.iter().take(CONTEXT_RESULTS).enumerate() {
        let _ = write!(
            prompt,
            "\n{}. {}\n   - Type: {}\n   - County: {}\n   - Excerpt: {}...\n   - Source: {}\n",
            i + 1,
            r.name(),
            r.plan_type.as_deref().unwrap_or("N/A"),
            r.county_code.as_deref().unwrap_or("N/A"),
            excerpt(r.extracted_text.as_deref().unwrap_or("")),
            r.document_url
                .as_deref()
                .or(r.url.as_deref())
                .unwrap_or("N/A"),
        );
    }
    prompt.push_str(
        "\nTask: Based strictly on the context above, provide guidance. \
If details are missing, state that explicitly.",
    );
    prompt
}

/// Best-effort natural-language summary of a result page
pub struct SummaryService {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    cache: Cache<String, String>,
}

impl SummaryService {
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        Self::with_api_key(config, config.api_key())
    }

    pub fn with_api_key(config: &LlmConfig, api_key: Option<String>) -> LlmResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let cache = Cache::builder()
            .max_capacity(config.summary_cache_capacity)
            .time_to_live(Duration::from_secs(config.summary_cache_ttl_secs))
            .build();

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.chat_model.clone(),
            cache,
        })
    }

    /// Never fails: cache, then LLM, then the deterministic fallback
    pub async fn summarize(&self, query: &str, results: &[SummaryInput]) -> Summary {
        let key = cache_key(query, results);
        if let Some(summary) = self.cache.get(&key).await {
            debug!(query = %query, "Summary cache hit");
            return Summary {
                summary,
                source: SummarySource::Cache,
                model: None,
                cached: true,
            };
        }

        match self.complete(query, results).await {
            Ok(summary) => {
                self.cache.insert(key, summary.clone()).await;
                Summary {
                    summary,
                    source: SummarySource::Openai,
                    model: Some(self.model.clone()),
                    cached: false,
                }
            }
            Err(e) => {
                if !matches!(e, LlmError::MissingApiKey) {
                    warn!(error = %e, "Summary generation failed, using fallback");
                }
                Summary {
                    summary: fallback_summary(query, results),
                    source: SummarySource::Mock,
                    model: None,
                    cached: false,
                }
            }
        }
    }

    async fn complete(&self, query: &str, results: &[SummaryInput]) -> LlmResult<String> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::MissingApiKey)?;
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(query, results) }
            ],
            "temperature": 0.7,
            "max_tokens": 300
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("empty completion".to_string()))
    }

    pub fn cached_entries(&self) -> u64 {
        self.cache.entry_count()
    }
}
