//! Pinned-result curations and the merge that applies them

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::search::document::Identified;
use crate::search::error::{SearchError, SearchResult};

/// Lower-cased, trimmed query text used as the curation key
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Storage id for a normalized query: standard base64 of its UTF-8 bytes
pub fn curation_id(normalized_query: &str) -> String {
    Base64::encode_string(normalized_query.as_bytes())
}

/// Editorial override for one exact query.
///
/// `pins` are document identities moved to the top in the listed order;
/// `excludes` are identities removed from the results entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curation {
    pub query: String,

    #[serde(default)]
    pub pins: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Curation {
    /// Build a curation, normalizing the query and de-duplicating lists
    pub fn new(query: &str, pins: Vec<String>, excludes: Vec<String>) -> SearchResult<Self> {
        let query = normalize_query(query);
        if query.is_empty() {
            return Err(SearchError::InvalidCuration(
                "query must not be empty".to_string(),
            ));
        }

        let pins = dedup_identities(pins);
        let excludes = dedup_identities(excludes);

        if let Some(both) = pins.iter().find(|p| excludes.contains(p)) {
            return Err(SearchError::InvalidCuration(format!(
                "'{}' is both pinned and excluded",
                both
            )));
        }

        Ok(Self {
            query,
            pins,
            excludes,
            updated_at: None,
        })
    }

    pub fn id(&self) -> String {
        curation_id(&self.query)
    }
}

fn dedup_identities(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

/// Apply a curation to a ranked page.
///
/// Excluded documents are dropped. Pinned documents present in `results`
/// move to the front in pin order; pins absent from `results` are skipped.
/// The rest keep their relevance order. No identity appears twice and the
/// output never exceeds `page_size`.
pub fn merge_with_curations<T: Identified>(
    results: Vec<T>,
    curation: Option<&Curation>,
    page_size: usize,
) -> Vec<T> {
    let excludes: HashSet<&str> = curation
        .map(|c| c.excludes.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let mut slots: Vec<Option<T>> = results
        .into_iter()
        .filter(|r| !excludes.contains(r.identity()))
        .map(Some)
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(slots.len());

    if let Some(curation) = curation {
        for pin in &curation.pins {
            if seen.contains(pin) {
                continue;
            }
            let slot = slots
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|r| r.identity() == pin));
            if let Some(item) = slot.and_then(Option::take) {
                seen.insert(pin.clone());
                merged.push(item);
            }
        }
    }

    for item in slots.into_iter().flatten() {
        if seen.insert(item.identity().to_string()) {
            merged.push(item);
        }
    }

    merged.truncate(page_size);
    merged
}
