//! Facet aggregations and facet filters

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use super::definition::{FacetDefinition, FacetInput, MISSING_VALUE};
use crate::descriptor::DocumentDefinition;
use crate::models::FacetItem;
use crate::query::dsl;
use crate::{Error, Result};

/// Terms buckets returned per facet.
pub const FACET_BUCKET_SIZE: usize = 50;

/// Suffix of the aggregation counting documents without a value.
pub const MISSING_SUFFIX: &str = "_Missing";

pub struct FacetHandler {
    definition: Arc<DocumentDefinition>,
}

impl FacetHandler {
    pub fn new(definition: Arc<DocumentDefinition>) -> Self {
        Self { definition }
    }

    /// Fail when the facet targets a property the document does not have.
    pub fn check_facet(&self, facet: &FacetDefinition) -> Result<()> {
        if !self.definition.has_property(&facet.field) {
            return Err(Error::Configuration(format!(
                "The document \"{}\" is missing a \"{}\" property to facet on",
                self.definition.document_type(),
                facet.field
            )));
        }
        Ok(())
    }

    fn field_name(&self, facet: &FacetDefinition) -> Result<&str> {
        self.check_facet(facet)?;
        Ok(&self.definition.field(&facet.field)?.field_name)
    }

    /// Filter for one facet value; [`MISSING_VALUE`] matches documents without a value.
    pub fn create_facet_sub_query(&self, value: &str, excluded: bool, facet: &FacetDefinition) -> Result<JsonValue> {
        let field = self.field_name(facet)?;
        let query = if value == MISSING_VALUE {
            dsl::missing(field)
        } else {
            dsl::term(field, value)
        };

        Ok(if excluded { dsl::not(query) } else { query })
    }

    /// Filter for all selected and excluded values of a multi-selectable facet.
    ///
    /// On a multi-valued field every selected value must be present; on a
    /// single-valued field any of them may match. Excluded values are always
    /// excluded.
    pub fn build_multi_selectable_filter(&self, input: &FacetInput, facet: &FacetDefinition) -> Result<Option<JsonValue>> {
        let is_multi_valued = self.definition.field(&facet.field)?.is_multi_valued;

        let selected = input
            .selected
            .iter()
            .map(|v| self.create_facet_sub_query(v, false, facet).map(Some))
            .collect::<Result<Vec<_>>>()?;

        let selected = if is_multi_valued {
            dsl::and(selected)
        } else if selected.is_empty() {
            None
        } else {
            dsl::or(selected)
        };

        let excluded = input
            .excluded
            .iter()
            .map(|v| self.create_facet_sub_query(v, true, facet).map(Some))
            .collect::<Result<Vec<_>>>()?;

        Ok(dsl::and([selected, dsl::and(excluded)]))
    }

    /// Conjunction of the selections of every multi-selectable facet except `facet`.
    pub fn other_facets_filter(
        &self,
        facet: &FacetDefinition,
        facets: &[FacetDefinition],
        selections: &BTreeMap<String, FacetInput>,
    ) -> Result<Option<JsonValue>> {
        let mut parts = Vec::new();
        for other in facets {
            if other.code == facet.code || !other.is_multi_selectable {
                continue;
            }
            if let Some(input) = selections.get(&other.code) {
                parts.push(self.build_multi_selectable_filter(input, other)?);
            }
        }
        Ok(dsl::and(parts))
    }

    /// Add the aggregations of `facet` to `aggs`.
    ///
    /// When `selections` is given (the request is post-filtered) and other
    /// multi-selectable facets have selections, the aggregations are nested
    /// in a filter aggregation applying those selections, so the facet is
    /// constrained by its siblings but never by itself.
    pub fn define_aggregation(
        &self,
        aggs: &mut JsonMap<String, JsonValue>,
        facet: &FacetDefinition,
        facets: &[FacetDefinition],
        selections: Option<&BTreeMap<String, FacetInput>>,
    ) -> Result<()> {
        let field = self.field_name(facet)?;
        let (order_key, direction) = facet.ordering.as_order();

        let mut inner = JsonMap::new();
        inner.insert(
            facet.code.clone(),
            json!({
                "terms": {
                    "field": field,
                    "size": FACET_BUCKET_SIZE,
                    "order": { order_key: direction }
                }
            }),
        );
        if facet.has_missing {
            inner.insert(
                format!("{}{}", facet.code, MISSING_SUFFIX),
                json!({ "missing": { "field": field } }),
            );
        }

        let filter = match selections {
            Some(selections) => self.other_facets_filter(facet, facets, selections)?,
            None => None,
        };

        match filter {
            Some(filter) => {
                aggs.insert(
                    facet.code.clone(),
                    json!({ "filter": filter, "aggs": inner }),
                );
            }
            None => aggs.extend(inner),
        }

        Ok(())
    }

    /// Read the facet items from a response's aggregations, whether or not the
    /// facet was nested in a filter aggregation.
    pub fn extract_facet_items(&self, aggregations: &JsonValue, facet: &FacetDefinition) -> Vec<FacetItem> {
        let top = aggregations.get(&facet.code);
        let nested = top.filter(|agg| agg.get("buckets").is_none());
        let scope = match nested {
            Some(filter_agg) => filter_agg,
            None => aggregations,
        };

        let mut items: Vec<FacetItem> = scope
            .get(&facet.code)
            .and_then(|terms| terms.get("buckets"))
            .and_then(JsonValue::as_array)
            .into_iter()
            .flatten()
            .filter_map(|bucket| {
                let code = bucket_key(bucket)?;
                let count = bucket.get("doc_count").and_then(JsonValue::as_u64).unwrap_or(0);
                Some(FacetItem {
                    label: facet.resolve_label(&code),
                    code,
                    count,
                })
            })
            .collect();

        if facet.has_missing {
            let missing_count = scope
                .get(format!("{}{}", facet.code, MISSING_SUFFIX))
                .and_then(|agg| agg.get("doc_count"))
                .and_then(JsonValue::as_u64)
                .unwrap_or(0);

            if missing_count > 0 {
                items.push(FacetItem {
                    code: MISSING_VALUE.to_string(),
                    label: facet.resolve_label(MISSING_VALUE),
                    count: missing_count,
                });
            }
        }

        items
    }
}

/// String form of a terms bucket key (`key_as_string` wins for dates and booleans).
pub(crate) fn bucket_key(bucket: &JsonValue) -> Option<String> {
    if let Some(key) = bucket.get("key_as_string").and_then(JsonValue::as_str) {
        return Some(key.to_string());
    }
    match bucket.get("key")? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}
