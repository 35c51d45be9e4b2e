//! Hub configuration.

use memhub_storage::{DEFAULT_HISTORY_LIMIT, DEFAULT_LIST_LIMIT};
use memhub_sync::ResolverConfig;
use memhub_types::InstanceId;
use serde::{Deserialize, Serialize};

/// Configuration for a [`CollectiveMemoryHub`](crate::CollectiveMemoryHub).
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Identity stamped on every entry this hub writes, and the only
    /// target it accepts sync requests for.
    pub instance_id: InstanceId,
    /// Row cap for `query` when the caller gives none.
    pub query_limit: usize,
    /// Row cap for `get_history` when the caller gives none.
    pub history_limit: usize,
    /// Confidence lead a conflicting entry needs to win outright.
    pub confidence_margin: f64,
    /// Extra attempts when another process claims the version `store`
    /// was about to write.
    pub store_retries: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            instance_id: InstanceId::new("local"),
            query_limit: DEFAULT_LIST_LIMIT,
            history_limit: DEFAULT_HISTORY_LIMIT,
            confidence_margin: ResolverConfig::default().confidence_margin,
            store_retries: 3,
        }
    }
}

impl HubConfig {
    /// Default configuration for the given instance.
    #[must_use]
    pub fn for_instance(instance_id: impl Into<InstanceId>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    /// Parses a JSON document, filling absent fields with defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            confidence_margin: self.confidence_margin,
        }
    }
}
