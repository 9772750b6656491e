//! Maintenance of the versioned content indices behind the search alias

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{info, warn};

use crate::elastic::{CatIndex, DedupReport, ElasticClient};
use crate::search::error::{SearchError, SearchResult};

/// Field whose value identifies a source document
pub const DEDUP_FIELD: &str = "document_url.keyword";

/// Sort field deciding which copy survives deduplication
pub const DEDUP_SORT_FIELD: &str = "metadata.indexed_at";

/// A concrete content index as shown to admins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub name: String,
    pub doc_count: u64,
    pub size: String,
    pub created_date: Option<DateTime<Utc>>,
    pub health: String,
    /// Whether the search alias currently points here
    pub in_alias: bool,
}

impl IndexSummary {
    fn from_cat(row: CatIndex, aliased: &[String]) -> Self {
        let created_date = row
            .creation_date
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
        Self {
            in_alias: aliased.contains(&row.index),
            doc_count: row
                .docs_count
                .as_deref()
                .and_then(|c| c.parse().ok())
                .unwrap_or(0),
            size: row.store_size.unwrap_or_default(),
            health: row.health.unwrap_or_else(|| "unknown".to_string()),
            name: row.index,
            created_date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AliasAction {
    Add,
    Remove,
    /// Detach the alias from every index and attach it to one, atomically
    Repoint,
}

/// Index and alias administration for the content alias.
///
/// Only indices named `{alias}-*` can be touched.
pub struct IndexAdmin {
    client: Arc<ElasticClient>,
    alias: String,
}

impl IndexAdmin {
    pub fn new(client: Arc<ElasticClient>) -> Self {
        let alias = client.indices().health_plans.clone();
        Self { client, alias }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    fn prefix(&self) -> String {
        format!("{}-", self.alias)
    }

    fn check_managed(&self, index: &str) -> SearchResult<()> {
        let prefix = self.prefix();
        if index.len() <= prefix.len() || !index.starts_with(&prefix) {
            return Err(SearchError::InvalidIndex(format!(
                "index name must start with '{}'",
                prefix
            )));
        }
        Ok(())
    }

    async fn require_index(&self, index: &str) -> SearchResult<()> {
        if self.client.index_exists(index).await? {
            Ok(())
        } else {
            Err(SearchError::IndexNotFound(index.to_string()))
        }
    }

    /// Managed indices, newest first, flagged when the alias points at them
    pub async fn list(&self) -> SearchResult<Vec<IndexSummary>> {
        let rows = self
            .client
            .cat_indices(&format!("{}*", self.prefix()))
            .await?;
        let aliased = self.client.resolve_alias(&self.alias).await?;

        let mut indices: Vec<IndexSummary> = rows
            .into_iter()
            .map(|row| IndexSummary::from_cat(row, &aliased))
            .collect();
        indices.sort_by(|a, b| b.created_date.cmp(&a.created_date));
        Ok(indices)
    }

    /// Detach the alias from `index` (best effort), then delete it
    pub async fn delete(&self, index: &str) -> SearchResult<()> {
        self.check_managed(index)?;
        self.require_index(index).await?;

        let detach = [json!({ "remove": { "index": index, "alias": self.alias } })];
        if let Err(e) = self.client.update_aliases(&detach).await {
            warn!(index = %index, error = %e, "Alias detach failed, deleting anyway");
        }

        if !self.client.delete_index(index).await? {
            return Err(SearchError::IndexNotFound(index.to_string()));
        }
        info!(index = %index, "Index deleted");
        Ok(())
    }

    /// Apply an alias change for a managed index
    pub async fn update_alias(
        &self,
        action: AliasAction,
        index: &str,
        alias: &str,
    ) -> SearchResult<()> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(SearchError::InvalidIndex("alias is required".to_string()));
        }
        self.check_managed(index)?;
        self.require_index(index).await?;

        let actions: Vec<Value> = match action {
            AliasAction::Add => vec![json!({ "add": { "index": index, "alias": alias } })],
            AliasAction::Remove => vec![json!({ "remove": { "index": index, "alias": alias } })],
            AliasAction::Repoint => {
                let mut actions: Vec<Value> = self
                    .client
                    .resolve_alias(alias)
                    .await?
                    .into_iter()
                    .filter(|current| current != index)
                    .map(|current| json!({ "remove": { "index": current, "alias": alias } }))
                    .collect();
                actions.push(json!({ "add": { "index": index, "alias": alias } }));
                actions
            }
        };

        self.client.update_aliases(&actions).await?;
        info!(action = %action, index = %index, alias = %alias, "Alias updated");
        Ok(())
    }

    /// Keep the newest document per source URL behind the alias
    pub async fn deduplicate(&self) -> SearchResult<DedupReport> {
        Ok(self
            .client
            .deduplicate_by_field(&self.alias, DEDUP_FIELD, DEDUP_SORT_FIELD)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElasticConfig;

    fn admin() -> IndexAdmin {
        let client = ElasticClient::with_api_key(&ElasticConfig::default(), None).unwrap();
        IndexAdmin::new(Arc::new(client))
    }

    #[test]
    fn test_only_versioned_indices_are_managed() {
        let admin = admin();
        assert!(admin.check_managed("health-plans-2026-10-01").is_ok());
        assert!(admin.check_managed("health-plans").is_err());
        assert!(admin.check_managed("health-plans-").is_err());
        assert!(admin.check_managed("qa-reports").is_err());
    }

    #[test]
    fn test_cat_row_conversion() {
        let row: CatIndex = serde_json::from_value(json!({
            "index": "health-plans-v2",
            "docs.count": "1523",
            "store.size": "12.4mb",
            "creation.date": "1767225600000",
            "health": "green"
        }))
        .unwrap();
        let summary = IndexSummary::from_cat(row, &["health-plans-v2".to_string()]);
        assert_eq!(summary.doc_count, 1523);
        assert!(summary.in_alias);
        assert_eq!(
            summary.created_date.unwrap().to_rfc3339(),
            "2026-01-01T00:00:00+00:00"
        );

        let wire = serde_json::to_value(&summary).unwrap();
        assert_eq!(wire["docCount"], 1523);
        assert_eq!(wire["inAlias"], true);
    }

    #[test]
    fn test_alias_action_parse() {
        assert_eq!("repoint".parse::<AliasAction>().unwrap(), AliasAction::Repoint);
        assert!("rename".parse::<AliasAction>().is_err());
    }
}
