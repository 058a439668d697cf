//! Search result models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetItem {
    pub code: String,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetOutput {
    pub code: String,
    pub label: String,
    pub is_multi_selectable: bool,
    pub values: Vec<FacetItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult<T> {
    pub code: String,
    pub label: String,
    pub list: Vec<T>,
    pub total_count: u64,
}

/// Result of an advanced search: either a flat list or groups, plus facets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput<T> {
    pub list: Vec<T>,
    pub groups: Vec<GroupResult<T>>,
    pub facets: Vec<FacetOutput>,
    /// Backend names of the full-text fields that were searchable.
    pub search_fields: Vec<String>,
    pub total_count: u64,
    /// Continuation token of the next page, when paging with a skip token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_token: Option<String>,
}

impl<T> Default for QueryOutput<T> {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            groups: Vec::new(),
            facets: Vec::new(),
            search_fields: Vec::new(),
            total_count: 0,
            skip_token: None,
        }
    }
}

impl<T> QueryOutput<T> {
    pub fn facet(&self, code: &str) -> Option<&FacetOutput> {
        self.facets.iter().find(|f| f.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let output = QueryOutput::<String> {
            list: vec!["a".into()],
            total_count: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["totalCount"], 1);
        assert!(json.get("skipToken").is_none());
        assert_eq!(json["searchFields"], serde_json::json!([]));
    }
}
