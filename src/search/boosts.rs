//! Relevance tuning: per-field weights and numeric boost functions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

use crate::search::config::DecayParams;
use crate::search::error::{SearchError, SearchResult};

/// Shape of the curve applied by a numeric boost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DecayType {
    Log,
    Sigmoid,
}

/// Score multiplier derived from a numeric or date field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericBoost {
    pub field: String,

    #[serde(rename = "type")]
    pub decay: DecayType,

    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Sigmoid midpoint for this field, overriding the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midpoint: Option<f64>,

    /// Sigmoid scale for this field, overriding the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

fn default_factor() -> f64 {
    1.0
}

const LOG_SCRIPT: &str = "if (doc[params.field].size() == 0) { return 1.0; } \
def raw = doc[params.field].value; \
double x = raw instanceof Number ? ((Number) raw).doubleValue() : raw.toInstant().toEpochMilli() / params.date_unit_ms; \
return 1.0 + Math.log(1.0 + Math.max(0.0, x) * params.factor);";

const SIGMOID_SCRIPT: &str = "if (doc[params.field].size() == 0) { return 1.0; } \
def raw = doc[params.field].value; \
double x; double mid; double scale; \
if (raw instanceof Number) { x = ((Number) raw).doubleValue(); mid = params.midpoint; scale = params.scale; } \
else { x = (raw.toInstant().toEpochMilli() - params.now_ms) / params.date_unit_ms; mid = params.date_midpoint; scale = params.date_scale; } \
return 1.0 / (1.0 + Math.exp(-1.0 * params.factor * (x - mid) / scale));";

impl NumericBoost {
    pub fn new(field: impl Into<String>, decay: DecayType, factor: f64) -> Self {
        Self {
            field: field.into(),
            decay,
            factor,
            midpoint: None,
            scale: None,
        }
    }

    /// Override the sigmoid midpoint and scale for this field
    pub fn with_curve(mut self, midpoint: f64, scale: f64) -> Self {
        self.midpoint = Some(midpoint);
        self.scale = Some(scale);
        self
    }

    /// Render as a `function_score` function.
    ///
    /// Documents missing the field get a neutral multiplier of 1. Per-boost
    /// `midpoint`/`scale` replace both the numeric and the date defaults.
    pub fn to_score_function(&self, decay: &DecayParams) -> Value {
        let params = match self.decay {
            DecayType::Log => json!({
                "field": self.field,
                "factor": self.factor,
                "date_unit_ms": decay.date_unit_ms,
            }),
            DecayType::Sigmoid => json!({
                "field": self.field,
                "factor": self.factor,
                "midpoint": self.midpoint.unwrap_or(decay.sigmoid_midpoint),
                "scale": self.scale.unwrap_or(decay.sigmoid_scale),
                "date_midpoint": self.midpoint.unwrap_or(decay.date_midpoint),
                "date_scale": self.scale.unwrap_or(decay.date_scale),
                "date_unit_ms": decay.date_unit_ms,
                "now_ms": decay.reference_millis(),
            }),
        };
        let source = match self.decay {
            DecayType::Log => LOG_SCRIPT,
            DecayType::Sigmoid => SIGMOID_SCRIPT,
        };
        json!({
            "script_score": {
                "script": {
                    "source": source,
                    "params": params,
                }
            }
        })
    }
}

/// The active relevance configuration.
///
/// Stored as append-only versions; the most recent `updated_at` wins.
/// An empty configuration is the identity: every weight is 1 and no
/// score functions are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoostConfiguration {
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,

    #[serde(default)]
    pub numeric_boosts: Vec<NumericBoost>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BoostConfiguration {
    /// Weight for a text field; unlisted fields weigh 1
    pub fn weight(&self, field: &str) -> f64 {
        self.weights.get(field).copied().unwrap_or(1.0)
    }

    pub fn with_weight(mut self, field: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(field.into(), weight);
        self
    }

    pub fn with_numeric_boost(mut self, boost: NumericBoost) -> Self {
        self.numeric_boosts.push(boost);
        self
    }

    /// Default weights and no score functions
    pub fn is_identity(&self) -> bool {
        self.numeric_boosts.is_empty() && self.weights.values().all(|w| *w == 1.0)
    }

    /// Reject weights and factors that would corrupt scoring
    pub fn validate(&self) -> SearchResult<()> {
        for (field, weight) in &self.weights {
            if field.trim().is_empty() {
                return Err(SearchError::InvalidBoosts(
                    "weight field name must not be empty".to_string(),
                ));
            }
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(SearchError::InvalidBoosts(format!(
                    "weight for '{}' must be a positive number, got {}",
                    field, weight
                )));
            }
        }

        for boost in &self.numeric_boosts {
            if boost.field.trim().is_empty() {
                return Err(SearchError::InvalidBoosts(
                    "numeric boost field must not be empty".to_string(),
                ));
            }
            if !boost.factor.is_finite() || boost.factor <= 0.0 {
                return Err(SearchError::InvalidBoosts(format!(
                    "factor for '{}' must be a positive number, got {}",
                    boost.field, boost.factor
                )));
            }
            if boost.midpoint.is_some_and(|m| !m.is_finite()) {
                return Err(SearchError::InvalidBoosts(format!(
                    "midpoint for '{}' must be finite",
                    boost.field
                )));
            }
            if boost.scale.is_some_and(|s| !s.is_finite() || s <= 0.0) {
                return Err(SearchError::InvalidBoosts(format!(
                    "scale for '{}' must be a positive number",
                    boost.field
                )));
            }
        }

        Ok(())
    }

    /// Score functions for every numeric boost, in configured order
    pub fn score_functions(&self, decay: &DecayParams) -> Vec<Value> {
        self.numeric_boosts
            .iter()
            .map(|b| b.to_score_function(decay))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlisted_weight_is_one() {
        let config = BoostConfiguration::default().with_weight("plan_name", 3.0);
        assert_eq!(config.weight("plan_name"), 3.0);
        assert_eq!(config.weight("body"), 1.0);
    }

    #[test]
    fn test_identity_detection() {
        assert!(BoostConfiguration::default().is_identity());
        assert!(BoostConfiguration::default()
            .with_weight("title", 1.0)
            .is_identity());
        assert!(!BoostConfiguration::default()
            .with_weight("title", 2.0)
            .is_identity());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let negative = BoostConfiguration::default().with_weight("title", -1.0);
        assert!(negative.validate().is_err());

        let nan = BoostConfiguration::default().with_weight("title", f64::NAN);
        assert!(nan.validate().is_err());

        let zero_factor = BoostConfiguration::default()
            .with_numeric_boost(NumericBoost::new("premium", DecayType::Log, 0.0));
        assert!(zero_factor.validate().is_err());

        let ok = BoostConfiguration::default()
            .with_weight("plan_name", 3.0)
            .with_numeric_boost(NumericBoost::new("indexed_at", DecayType::Sigmoid, 0.5));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_wire_format() {
        let config: BoostConfiguration = serde_json::from_value(json!({
            "weights": {"plan_name": 3},
            "numeric_boosts": [{"field": "premium", "type": "log"}]
        }))
        .unwrap();
        assert_eq!(config.weight("plan_name"), 3.0);
        assert_eq!(config.numeric_boosts[0].decay, DecayType::Log);
        assert_eq!(config.numeric_boosts[0].factor, 1.0);
        assert_eq!("sigmoid".parse::<DecayType>().unwrap(), DecayType::Sigmoid);
    }

    #[test]
    fn test_score_function_carries_params() {
        let boost = NumericBoost::new("premium", DecayType::Sigmoid, 2.0);
        let function = boost.to_score_function(&DecayParams::default());
        let script = &function["script_score"]["script"];
        assert_eq!(script["params"]["field"], "premium");
        assert_eq!(script["params"]["factor"], 2.0);
        assert_eq!(script["params"]["scale"], 1.0);
        assert_eq!(script["params"]["date_midpoint"], -180.0);
        assert!(script["source"].as_str().unwrap().contains("Math.exp"));

        let log = NumericBoost::new("premium", DecayType::Log, 1.0)
            .to_score_function(&DecayParams::default());
        assert!(log["script_score"]["script"]["params"].get("now_ms").is_none());
    }

    /// Date branch of the sigmoid script, evaluated from rendered params
    fn sigmoid_for_date(function: &Value, date: &str) -> f64 {
        let p = &function["script_score"]["script"]["params"];
        let doc_ms = DateTime::parse_from_rfc3339(date).unwrap().timestamp_millis() as f64;
        let x = (doc_ms - p["now_ms"].as_f64().unwrap()) / p["date_unit_ms"].as_f64().unwrap();
        let (mid, scale) = (
            p["date_midpoint"].as_f64().unwrap(),
            p["date_scale"].as_f64().unwrap(),
        );
        1.0 / (1.0 + (-p["factor"].as_f64().unwrap() * (x - mid) / scale).exp())
    }

    #[test]
    fn test_sigmoid_separates_recent_and_old_dates() {
        let decay = DecayParams {
            reference_time: Some("2026-10-01T00:00:00Z".parse().unwrap()),
            ..Default::default()
        };
        let function =
            NumericBoost::new("metadata.indexed_at", DecayType::Sigmoid, 1.0).to_score_function(&decay);

        let old = sigmoid_for_date(&function, "2019-01-01T00:00:00Z");
        let recent = sigmoid_for_date(&function, "2026-06-01T00:00:00Z");
        assert!(old < 0.01, "old = {}", old);
        assert!(recent > 0.7, "recent = {}", recent);
        assert!(recent - old > 0.5);

        // Reference time is truncated to whole days
        let decay = DecayParams {
            reference_time: Some("2026-10-01T17:45:00Z".parse().unwrap()),
            ..Default::default()
        };
        let truncated =
            NumericBoost::new("metadata.indexed_at", DecayType::Sigmoid, 1.0).to_score_function(&decay);
        assert_eq!(
            truncated["script_score"]["script"]["params"]["now_ms"],
            function["script_score"]["script"]["params"]["now_ms"]
        );
    }

    #[test]
    fn test_per_boost_curve_overrides_defaults() {
        let function = NumericBoost::new("metadata.indexed_at", DecayType::Sigmoid, 1.0)
            .with_curve(-30.0, 10.0)
            .to_score_function(&DecayParams::default());
        let params = &function["script_score"]["script"]["params"];
        assert_eq!(params["date_midpoint"], -30.0);
        assert_eq!(params["date_scale"], 10.0);
        assert_eq!(params["midpoint"], -30.0);

        let bad = BoostConfiguration::default().with_numeric_boost(
            NumericBoost::new("premium", DecayType::Sigmoid, 1.0).with_curve(0.0, 0.0),
        );
        assert!(bad.validate().is_err());
    }
}
