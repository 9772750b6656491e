//! Facet aggregations and their display formatting

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Maximum number of plan-name facets returned
const MAX_PLAN_FACETS: usize = 30;

const TIER_ORDER: [&str; 5] = ["Bronze", "Silver", "Gold", "Platinum", "Other"];

/// One facet bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetValue {
    pub value: String,
    pub label: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

/// Facet counts for the filter sidebar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetsResponse {
    pub states: Vec<FacetValue>,
    pub counties: Vec<FacetValue>,
    pub document_types: Vec<FacetValue>,
    pub plans: Vec<FacetValue>,
    pub plan_ids: Vec<FacetValue>,
    pub plan_types: Vec<FacetValue>,
}

/// Terms aggregations keyed by response name
pub fn aggregations() -> Value {
    json!({
        "states": terms("state.keyword", 50, "_key", "asc"),
        "counties": terms("county_code.keyword", 100, "_key", "asc"),
        "document_types": terms("metadata.plan_info.document_type.keyword", 50, "_count", "desc"),
        "plan_names": terms("plan_name.keyword", 100, "_count", "desc"),
        "plan_ids": terms("plan_id.keyword", 50, "_key", "asc"),
        "plan_types": terms("plan_type.keyword", 50, "_count", "desc"),
    })
}

fn terms(field: &str, size: usize, order_by: &str, direction: &str) -> Value {
    json!({
        "terms": {
            "field": field,
            "size": size,
            "order": { order_by: direction }
        }
    })
}

fn buckets(aggregations: &Value, name: &str) -> Vec<(String, u64)> {
    aggregations
        .get(name)
        .and_then(|agg| agg.get("buckets"))
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|b| {
                    let key = match b.get("key")? {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let count = b.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
                    Some((key, count))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn plain(value: String, count: u64) -> FacetValue {
    FacetValue {
        label: value.clone(),
        value,
        count,
        tier: None,
    }
}

/// Human label for a document type code
pub fn document_type_label(code: &str) -> String {
    match code {
        "summary_of_benefits" => "Summary of Benefits",
        "evidence_of_coverage" => "Evidence of Coverage",
        "out_of_coverage" => "Out of Coverage",
        "brochure" => "Brochure",
        "sbc" => "Summary of Benefits & Coverage (SBC)",
        "policy" => "Policy Document",
        "disclosure" => "Disclosure",
        other => other,
    }
    .to_string()
}

/// Metal tier named in a plan name, or `Other`
pub fn plan_tier(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    ["bronze", "silver", "gold", "platinum"]
        .iter()
        .zip(TIER_ORDER.iter())
        .find(|(needle, _)| lower.contains(*needle))
        .map(|(_, tier)| *tier)
        .unwrap_or("Other")
}

/// Shortened plan name for display
pub fn short_plan_name(name: &str) -> String {
    let short = name.strip_prefix("Summary of Benefits for ").unwrap_or(name);
    short
        .replace(" Standard Cost Share", "")
        .replace(" Limited Cost Share", " (Limited)")
        .replace(" Zero Cost Share", " (Zero)")
}

/// Turn a `_search` aggregations object into facet lists
pub fn format_facets(aggregations: &Value) -> FacetsResponse {
    let mut by_tier: BTreeMap<usize, Vec<FacetValue>> = BTreeMap::new();
    for (value, count) in buckets(aggregations, "plan_names") {
        let tier = plan_tier(&value);
        let rank = TIER_ORDER
            .iter()
            .position(|t| *t == tier)
            .unwrap_or(TIER_ORDER.len());
        by_tier.entry(rank).or_default().push(FacetValue {
            label: short_plan_name(&value),
            value,
            count,
            tier: Some(tier.to_string()),
        });
    }
    let plans = by_tier
        .into_values()
        .flat_map(|mut plans| {
            plans.sort_by(|a, b| b.count.cmp(&a.count));
            plans
        })
        .take(MAX_PLAN_FACETS)
        .collect();

    FacetsResponse {
        states: buckets(aggregations, "states")
            .into_iter()
            .map(|(v, c)| plain(v, c))
            .collect(),
        counties: buckets(aggregations, "counties")
            .into_iter()
            .map(|(v, c)| plain(v, c))
            .collect(),
        document_types: buckets(aggregations, "document_types")
            .into_iter()
            .map(|(value, count)| FacetValue {
                label: document_type_label(&value),
                value,
                count,
                tier: None,
            })
            .collect(),
        plans,
        plan_ids: buckets(aggregations, "plan_ids")
            .into_iter()
            .map(|(value, count)| FacetValue {
                label: format!("Plan {}", value),
                value,
                count,
                tier: None,
            })
            .collect(),
        plan_types: buckets(aggregations, "plan_types")
            .into_iter()
            .map(|(value, count)| FacetValue {
                label: document_type_label(&value),
                value,
                count,
                tier: None,
            })
            .collect(),
    }
}
