//! Indexed plan documents and the hits returned to callers

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::elastic::RawHit;

/// A plan document as stored in the content index.
///
/// Built leniently from `_source`: numbers are stringified and unknown
/// fields ignored, so one odd document never fails a whole page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthPlanDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

impl HealthPlanDocument {
    pub fn from_source(source: &Value) -> Self {
        Self {
            document_url: string_at(source, &["document_url"]),
            url: string_at(source, &["url"]),
            title: string_at(source, &["title"]),
            plan_name: string_at(source, &["plan_name"]),
            plan_id: string_at(source, &["plan_id"]),
            plan_type: string_at(source, &["plan_type"]),
            state: string_at(source, &["state"]),
            county_code: string_at(source, &["county_code"]),
            document_type: string_at(source, &["metadata", "plan_info", "document_type"])
                .or_else(|| string_at(source, &["plan_details", "document_type"])),
            source: string_at(source, &["source"]),
            file_name: string_at(source, &["pdf", "filename"])
                .or_else(|| string_at(source, &["file_name"])),
            extracted_text: string_at(source, &["extracted_text"])
                .or_else(|| string_at(source, &["body"])),
        }
    }

    /// Stable identity used by curations: the document URL when present
    pub fn identity(&self) -> Option<&str> {
        self.document_url.as_deref().or(self.url.as_deref())
    }

    /// Human-readable plan name, preferring names found in the document text
    pub fn display_name(&self) -> String {
        if let Some(name) = self.extracted_text.as_deref().and_then(extract_plan_name) {
            return name;
        }
        for candidate in [&self.plan_name, &self.title, &self.plan_id, &self.file_name] {
            if let Some(value) = candidate.as_deref().map(str::trim) {
                if !value.is_empty() {
                    return value.to_string();
                }
            }
        }
        "Health Plan Document".to_string()
    }
}

fn string_at(source: &Value, path: &[&str]) -> Option<String> {
    let mut current = source;
    for key in path {
        current = current.get(key)?;
    }
    match current {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A ranked hit returned by the search service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Backend document id
    pub id: String,
    pub score: Option<f64>,
    pub display_name: String,
    #[serde(flatten)]
    pub document: HealthPlanDocument,
}

impl SearchHit {
    pub fn from_raw(hit: &RawHit) -> Self {
        let document = HealthPlanDocument::from_source(&hit.source);
        Self {
            id: hit.id.clone(),
            score: hit.score,
            display_name: document.display_name(),
            document,
        }
    }
}

/// Anything with a stable document identity that curations can refer to
pub trait Identified {
    fn identity(&self) -> &str;
}

impl Identified for SearchHit {
    fn identity(&self) -> &str {
        self.document.identity().unwrap_or(&self.id)
    }
}

impl Identified for String {
    fn identity(&self) -> &str {
        self
    }
}

static TIERED_PLAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(Everyday|Complete|Focused|Elite|Standard|Premier|Value)\s+(Gold|Silver|Bronze)(?:\s*\+\s*[A-Za-z\s]+)?",
    )
    .expect("valid plan pattern")
});

static AMBETTER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Ambetter(?:\s+Health)?\s+(Premier|Value|TXSMP)[^\n]{0,60}")
        .expect("valid plan pattern")
});

static POLICY_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)MAJOR MEDICAL EXPENSE POLICY\s+([^\n]+)").expect("valid plan pattern")
});

static AMBETTER_PRODUCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Ambetter\s*\+?\s*([A-Z][A-Za-z\s]+(?:Care|Vision|Health|Plan|Plus|Select|Choice|Value|Essential|Balanced|Secure))",
    )
    .expect("valid plan pattern")
});

static AMBETTER_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)FOR AMBETTER FROM\s+([A-Z][A-Za-z\s]+)").expect("valid plan pattern")
});

static CARRIER_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Ambetter\.SuperiorHealthPlan\.com").expect("valid plan pattern")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid pattern"));

/// Pull a marketed plan name out of document text.
///
/// Patterns are tried from most to least specific; `None` when nothing
/// plausible is found.
pub fn extract_plan_name(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    if let Some(m) = TIERED_PLAN.find(text) {
        let name = m.as_str().trim();
        if name.len() > 5 && name.len() < 120 {
            return Some(name.to_string());
        }
    }

    if let Some(m) = AMBETTER_LINE.find(text) {
        let name = m.as_str().trim();
        if name.len() > 5 && name.len() < 120 {
            return Some(name.to_string());
        }
    }

    if let Some(caps) = POLICY_HEADER.captures(text) {
        let stripped = CARRIER_DOMAIN.replace_all(&caps[1], "");
        let name = WHITESPACE.replace_all(&stripped, " ").trim().to_string();
        if name.len() > 3 && name.len() < 100 {
            return Some(name);
        }
    }

    if let Some(m) = AMBETTER_PRODUCT.find(text) {
        let name = m.as_str().trim();
        if name.len() > 3 && name.len() < 100 {
            return Some(name.to_string());
        }
    }

    if let Some(caps) = AMBETTER_FROM.captures(text) {
        let name = format!("Ambetter from {}", caps[1].trim());
        if name.len() < 100 {
            return Some(name);
        }
    }

    None
}
