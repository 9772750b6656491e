//! Field catalog derived from the content index mapping

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a mapped field may take part in relevance tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    /// May receive a per-field weight
    TextWeightable,
    /// May drive a numeric boost function
    NumericBoostable,
}

impl FieldClass {
    /// Classify a mapping type; `None` for types that cannot be tuned
    pub fn from_mapping_type(es_type: &str) -> Option<Self> {
        match es_type {
            "text" | "keyword" => Some(FieldClass::TextWeightable),
            "long" | "integer" | "float" | "double" | "date" => Some(FieldClass::NumericBoostable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Dotted path, e.g. `metadata.plan_info.document_type`
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub class: FieldClass,
}

/// Tunable fields of one concrete index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCatalog {
    pub index: String,
    pub fields: Vec<FieldInfo>,
}

impl FieldCatalog {
    /// Build from the `mappings` object of one index
    pub fn from_mappings(index: impl Into<String>, mappings: &Value) -> Self {
        let mut fields = Vec::new();
        flatten("", mappings, &mut fields);
        Self {
            index: index.into(),
            fields,
        }
    }

    /// Build from a `GET /{index}/_mapping` response, using the first index it lists
    pub fn from_mapping_response(response: &Value) -> Option<Self> {
        let (index, body) = response.as_object()?.iter().next()?;
        Some(Self::from_mappings(
            index.clone(),
            body.get("mappings").unwrap_or(&Value::Null),
        ))
    }

    pub fn text_weightable(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields
            .iter()
            .filter(|f| f.class == FieldClass::TextWeightable)
    }

    pub fn numeric_boostable(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields
            .iter()
            .filter(|f| f.class == FieldClass::NumericBoostable)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

fn flatten(prefix: &str, node: &Value, out: &mut Vec<FieldInfo>) {
    let Some(properties) = node.get("properties").and_then(Value::as_object) else {
        return;
    };

    for (key, child) in properties {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        if let Some(es_type) = child.get("type").and_then(Value::as_str) {
            if let Some(class) = FieldClass::from_mapping_type(es_type) {
                out.push(FieldInfo {
                    name: name.clone(),
                    field_type: es_type.to_string(),
                    class,
                });
            }
        }

        flatten(&name, child, out);
    }
}
