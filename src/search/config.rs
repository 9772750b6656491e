//! Search configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Curve parameters for numeric boost scripts.
///
/// `log` boosts compute `1 + ln(1 + factor * max(x, 0))`.
/// `sigmoid` boosts compute `1 / (1 + exp(-factor * (x - midpoint) / scale))`.
///
/// For `log`, a date field is converted to `epoch_millis / date_unit_ms`.
/// For `sigmoid`, a date field is measured relative to the reference time,
/// `(epoch_millis - now) / date_unit_ms`, so past dates are negative and the
/// date midpoint and scale apply instead of the numeric ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayParams {
    #[serde(default)]
    pub sigmoid_midpoint: f64,

    #[serde(default = "default_sigmoid_scale")]
    pub sigmoid_scale: f64,

    /// Sigmoid midpoint for date fields, in `date_unit_ms` units relative to now
    #[serde(default = "default_date_midpoint")]
    pub date_midpoint: f64,

    /// Sigmoid scale for date fields, in `date_unit_ms` units
    #[serde(default = "default_date_scale")]
    pub date_scale: f64,

    /// Milliseconds per unit when a date field feeds a curve (default: one day)
    #[serde(default = "default_date_unit_ms")]
    pub date_unit_ms: f64,

    /// Fixed "now" for date curves; the current time when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_time: Option<DateTime<Utc>>,
}

impl DecayParams {
    /// Reference time in epoch millis, truncated to whole `date_unit_ms`
    /// so the composed body stays stable within a unit.
    pub fn reference_millis(&self) -> f64 {
        let now = self.reference_time.unwrap_or_else(Utc::now).timestamp_millis() as f64;
        if self.date_unit_ms > 0.0 {
            (now / self.date_unit_ms).floor() * self.date_unit_ms
        } else {
            now
        }
    }
}

impl Default for DecayParams {
    fn default() -> Self {
        Self {
            sigmoid_midpoint: 0.0,
            sigmoid_scale: default_sigmoid_scale(),
            date_midpoint: default_date_midpoint(),
            date_scale: default_date_scale(),
            date_unit_ms: default_date_unit_ms(),
            reference_time: None,
        }
    }
}

/// Query composition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Fields searched by the lexical clause, in order
    #[serde(default = "default_text_fields")]
    pub text_fields: Vec<String>,

    /// Page size used when a request omits one
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound for requested page sizes
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Deepest `from + size` a request may reach (`index.max_result_window`)
    #[serde(default = "default_max_result_window")]
    pub max_result_window: usize,

    /// Collapse results on this keyword field (one hit per plan)
    #[serde(default = "default_collapse_field")]
    pub collapse_field: Option<String>,

    /// Dense vector field used by the semantic branch
    #[serde(default = "default_vector_field")]
    pub vector_field: String,

    /// Nearest neighbours requested by the semantic branch
    #[serde(default = "default_knn_k")]
    pub knn_k: usize,

    /// Candidates considered per shard by the semantic branch
    #[serde(default = "default_knn_num_candidates")]
    pub knn_num_candidates: usize,

    /// Add a state filter when the query names a state
    #[serde(default = "default_true")]
    pub auto_detect_state: bool,

    /// Record search events for analytics
    #[serde(default = "default_true")]
    pub track_events: bool,

    /// Numeric boost curve parameters
    #[serde(default)]
    pub decay: DecayParams,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            text_fields: default_text_fields(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_result_window: default_max_result_window(),
            collapse_field: default_collapse_field(),
            vector_field: default_vector_field(),
            knn_k: default_knn_k(),
            knn_num_candidates: default_knn_num_candidates(),
            auto_detect_state: true,
            track_events: true,
            decay: DecayParams::default(),
        }
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn text_fields(mut self, fields: Vec<impl Into<String>>) -> Self {
        self.config.text_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn default_page_size(mut self, size: usize) -> Self {
        self.config.default_page_size = size;
        self
    }

    pub fn max_page_size(mut self, size: usize) -> Self {
        self.config.max_page_size = size;
        self
    }

    pub fn max_result_window(mut self, window: usize) -> Self {
        self.config.max_result_window = window;
        self
    }

    pub fn collapse_field(mut self, field: Option<String>) -> Self {
        self.config.collapse_field = field;
        self
    }

    pub fn vector_field(mut self, field: impl Into<String>) -> Self {
        self.config.vector_field = field.into();
        self
    }

    pub fn auto_detect_state(mut self, enabled: bool) -> Self {
        self.config.auto_detect_state = enabled;
        self
    }

    pub fn track_events(mut self, enabled: bool) -> Self {
        self.config.track_events = enabled;
        self
    }

    pub fn decay(mut self, decay: DecayParams) -> Self {
        self.config.decay = decay;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_text_fields() -> Vec<String> {
    ["plan_name", "title", "extracted_text", "body"]
        .iter()
        .map(|f| f.to_string())
        .collect()
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

fn default_max_result_window() -> usize {
    10_000
}

fn default_collapse_field() -> Option<String> {
    Some("plan_id.keyword".to_string())
}

fn default_vector_field() -> String {
    "semantic_vector".to_string()
}

fn default_knn_k() -> usize {
    50
}

fn default_knn_num_candidates() -> usize {
    100
}

fn default_sigmoid_scale() -> f64 {
    1.0
}

/// Half weight for documents about six months old
fn default_date_midpoint() -> f64 {
    -180.0
}

fn default_date_scale() -> f64 {
    60.0
}

fn default_date_unit_ms() -> f64 {
    86_400_000.0
}

fn default_true() -> bool {
    true
}
