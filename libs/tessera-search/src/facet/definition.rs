use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Facet value standing for "no value".
pub const MISSING_VALUE: &str = "<null>";

/// Label of the synthetic missing item when the facet has no label for it.
pub const MISSING_LABEL: &str = "search.results.missing";

/// Bucket ordering of a facet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacetOrdering {
    KeyAscending,
    KeyDescending,
    CountAscending,
    #[default]
    CountDescending,
}

impl FacetOrdering {
    pub(crate) fn as_order(&self) -> (&'static str, &'static str) {
        match self {
            FacetOrdering::KeyAscending => ("_key", "asc"),
            FacetOrdering::KeyDescending => ("_key", "desc"),
            FacetOrdering::CountAscending => ("_count", "asc"),
            FacetOrdering::CountDescending => ("_count", "desc"),
        }
    }
}

/// A facet computed over one document property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetDefinition {
    pub code: String,
    pub label: String,
    /// Property name of the faceted field.
    pub field: String,
    #[serde(default)]
    pub ordering: FacetOrdering,
    #[serde(default)]
    pub is_multi_selectable: bool,
    #[serde(default)]
    pub has_missing: bool,
    /// Display labels of known values (reference list).
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl FacetDefinition {
    pub fn new(code: impl Into<String>, label: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            field: field.into(),
            ordering: FacetOrdering::default(),
            is_multi_selectable: false,
            has_missing: false,
            labels: BTreeMap::new(),
        }
    }

    pub fn ordering(mut self, ordering: FacetOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn multi_selectable(mut self) -> Self {
        self.is_multi_selectable = true;
        self
    }

    pub fn with_missing(mut self) -> Self {
        self.has_missing = true;
        self
    }

    pub fn with_labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Label of a bucket value, the value itself when unknown.
    pub fn resolve_label(&self, value: &str) -> String {
        match self.labels.get(value) {
            Some(label) => label.clone(),
            None if value == MISSING_VALUE => MISSING_LABEL.to_string(),
            None => value.to_string(),
        }
    }
}

/// Selected and excluded values of one facet in a criteria group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetInput {
    #[serde(default)]
    pub selected: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl FacetInput {
    pub fn selected<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected: values.into_iter().map(Into::into).collect(),
            excluded: Vec::new(),
        }
    }

    pub fn excluded<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected: Vec::new(),
            excluded: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty() && self.excluded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_labels() {
        let facet = FacetDefinition::new("status", "Status", "status")
            .with_labels([("ACT", "Active"), ("CLO", "Closed")]);

        assert_eq!(facet.resolve_label("ACT"), "Active");
        assert_eq!(facet.resolve_label("NEW"), "NEW");
        assert_eq!(facet.resolve_label(MISSING_VALUE), MISSING_LABEL);
    }

    #[test]
    fn deserializes_with_defaults() {
        let facet: FacetDefinition = serde_json::from_value(serde_json::json!({
            "code": "city", "label": "City", "field": "city"
        }))
        .unwrap();
        assert_eq!(facet.ordering, FacetOrdering::CountDescending);
        assert!(!facet.is_multi_selectable);
    }
}
