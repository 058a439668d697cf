use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Subset of the backend `_search` response used by the search service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: Option<u64>,
    #[serde(default)]
    pub hits: Hits,
    #[serde(default)]
    pub aggregations: Option<JsonValue>,
    #[serde(default)]
    pub pit_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hits {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

impl Hits {
    pub fn total_count(&self) -> u64 {
        self.total.as_ref().map(|t| t.value).unwrap_or(self.hits.len() as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalHits {
    pub value: u64,
    #[serde(default)]
    pub relation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<JsonValue>,
    #[serde(default)]
    pub highlight: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub sort: Vec<JsonValue>,
}
