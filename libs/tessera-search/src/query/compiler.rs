//! Advanced query compilation
//!
//! Turns an [`AdvancedQueryInput`] into a `_search` request body:
//!
//! - `query`: security AND (OR of criteria groups) AND optional caller filter
//! - `post_filter`: multi-selectable facet selections, single-group requests only
//! - facet and grouping aggregations, re-applying post-filter selections where
//!   aggregations would otherwise ignore them
//! - paging (offset or point in time), sort, source filtering, highlighting

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use super::cursor::{PageCursor, PIT_KEEP_ALIVE, PIT_PAGE_SIZE};
use super::dsl;
use super::input::{AdvancedQueryInput, CriteriaFilters, NoFilters, QueryInput};
use crate::descriptor::{DocumentDefinition, FieldCategory, FieldDescriptor};
use crate::facet::{FacetDefinition, FacetHandler, MISSING_SUFFIX};
use crate::{Error, Result};

/// Page size when no group asks for one.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Terms buckets returned for grouping.
pub const GROUP_BUCKET_SIZE: usize = 50;

/// Name of the top hits sub-aggregation of each group.
pub const TOP_HITS_NAME: &str = "groupTop";

/// Suffix added to the group field name to name the grouping aggregation.
pub const GROUP_SUFFIX: &str = "_Group";

/// Extra inputs supplied by the caller rather than the request.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions<'a> {
    /// Additional filter ANDed into the main query.
    pub filter: Option<JsonValue>,
    /// Additional aggregations merged into the request.
    pub aggregations: Option<JsonMap<String, JsonValue>>,
    pub cursor: Option<&'a PageCursor>,
}

/// Grouping resolved for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTarget {
    pub facet: FacetDefinition,
    /// Backend field grouped on.
    pub field_name: String,
}

impl GroupTarget {
    pub fn aggregation_name(&self) -> String {
        format!("{}{}", self.field_name, GROUP_SUFFIX)
    }

    pub fn missing_aggregation_name(&self) -> String {
        format!("{}{}", self.aggregation_name(), MISSING_SUFFIX)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub body: JsonValue,
    pub group: Option<GroupTarget>,
    pub has_post_filter: bool,
    /// Requested page size (0 when grouping).
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct SortDefinition {
    field_name: String,
    descending: bool,
}

/// Compiles advanced queries for one document type and criteria type.
pub struct QueryCompiler<F: CriteriaFilters = NoFilters> {
    definition: Arc<DocumentDefinition>,
    facets: FacetHandler,
    _criteria: PhantomData<fn() -> F>,
}

impl<F: CriteriaFilters> QueryCompiler<F> {
    /// Check once that every criteria property maps to a filterable field.
    pub fn new(definition: Arc<DocumentDefinition>) -> Result<Self> {
        for property in F::PROPERTIES {
            let field = definition.field(property)?;
            if !field.is_filterable() {
                return Err(Error::Configuration(format!(
                    "Cannot filter on fields that are not indexed. Field: {}",
                    field.field_name
                )));
            }
        }

        Ok(Self {
            facets: FacetHandler::new(Arc::clone(&definition)),
            definition,
            _criteria: PhantomData,
        })
    }

    pub fn definition(&self) -> &Arc<DocumentDefinition> {
        &self.definition
    }

    pub fn facet_handler(&self) -> &FacetHandler {
        &self.facets
    }

    pub fn compile(&self, input: &AdvancedQueryInput<F>, options: CompileOptions<'_>) -> Result<CompiledQuery> {
        let sort = self.sort_definition(input)?;
        let filter_query = self.filter_query(input, options.filter)?;
        let post_filter = self.post_filter(input)?;
        let has_post_filter = post_filter.is_some();
        let group = self.group_target(input)?;

        // Several groups with inconsistent paging: take the largest values.
        let skip = input.search_criteria.iter().map(|sc| sc.skip).max().unwrap_or(0);
        let size = if group.is_some() {
            0
        } else {
            input
                .search_criteria
                .iter()
                .filter_map(|sc| sc.top)
                .max()
                .unwrap_or(DEFAULT_PAGE_SIZE)
        };

        let mut body = JsonMap::new();
        body.insert(
            "query".to_string(),
            filter_query.unwrap_or_else(dsl::match_all),
        );
        if let Some(post_filter) = &post_filter {
            body.insert("post_filter".to_string(), post_filter.clone());
        }

        let source_fields = self.source_fields(input);
        if !source_fields.is_empty() {
            body.insert("_source".to_string(), json!({ "includes": source_fields }));
        }

        match options.cursor {
            None => {
                body.insert("from".to_string(), json!(skip));
                body.insert("size".to_string(), json!(size));
                body.insert("track_total_hits".to_string(), json!(true));
            }
            Some(cursor) => {
                body.insert("size".to_string(), json!(PIT_PAGE_SIZE));
                body.insert(
                    "pit".to_string(),
                    json!({ "id": cursor.pit_id, "keep_alive": PIT_KEEP_ALIVE }),
                );
                if let Some(search_after) = &cursor.search_after {
                    body.insert("search_after".to_string(), json!(search_after));
                }
            }
        }

        let sort = match sort {
            Some(sort) => json!([{ sort.field_name: { "order": if sort.descending { "desc" } else { "asc" } } }]),
            None => json!([{ "_score": { "order": "desc" } }]),
        };
        body.insert("sort".to_string(), sort);

        let mut aggs = JsonMap::new();
        let selections = if has_post_filter {
            input.search_criteria.first().map(|sc| &sc.facets)
        } else {
            None
        };
        for facet in &input.facet_definitions {
            self.facets
                .define_aggregation(&mut aggs, facet, &input.facet_definitions, selections)?;
        }
        if let Some(group) = &group {
            self.define_group_aggregation(&mut aggs, group, input, post_filter.as_ref());
        }
        if let Some(extra) = options.aggregations {
            aggs.extend(extra);
        }
        if !aggs.is_empty() {
            body.insert("aggs".to_string(), JsonValue::Object(aggs));
        }

        if input.highlights {
            body.insert("highlight".to_string(), self.highlight());
        }

        Ok(CompiledQuery {
            body: JsonValue::Object(body),
            group,
            has_post_filter,
            size,
        })
    }

    /// Count request body: main query AND post-filter.
    pub fn count_query(&self, input: &AdvancedQueryInput<F>) -> Result<JsonValue> {
        let query = dsl::and([self.filter_query(input, None)?, self.post_filter(input)?]);
        Ok(json!({ "query": query.unwrap_or_else(dsl::match_all) }))
    }

    fn filter_query(&self, input: &AdvancedQueryInput<F>, extra: Option<JsonValue>) -> Result<Option<JsonValue>> {
        if input.search_criteria.is_empty() {
            return Err(Error::Configuration(
                "An advanced query needs at least one criteria group".to_string(),
            ));
        }

        let security = input.security.as_deref().filter(|s| !s.is_empty());
        let security_query = match security {
            None => None,
            Some(values) => {
                let field = self.definition.security_field().ok_or_else(|| {
                    Error::Configuration(format!(
                        "The document \"{}\" needs a security field to allow security filtering",
                        self.definition.document_type()
                    ))
                })?;
                dsl::or(values.iter().map(|v| Some(dsl::term(&field.field_name, v))))
            }
        };

        let groups = input
            .search_criteria
            .iter()
            .map(|sc| self.criteria_sub_query(input, sc))
            .collect::<Result<Vec<_>>>()?;

        Ok(dsl::and([security_query, dsl::or(groups), extra]))
    }

    fn criteria_sub_query(&self, input: &AdvancedQueryInput<F>, group: &QueryInput<F>) -> Result<Option<JsonValue>> {
        let criteria = group.criteria.as_ref();

        let text_query = match criteria.and_then(|c| c.effective_query()) {
            None => None,
            Some(text) => {
                let allow_list = criteria.and_then(|c| c.search_fields.as_ref());
                let fields: Vec<&FieldDescriptor> = self
                    .definition
                    .search_fields()
                    .filter(|f| allow_list.map_or(true, |list| list.contains(&f.field_name)))
                    .collect();
                if fields.is_empty() {
                    None
                } else {
                    Some(dsl::multi_match(text, fields))
                }
            }
        };

        let mut filters = Vec::new();
        for field in self.definition.fields() {
            let property = field.property_name.as_str();
            let value = input.additional_filters.get(property).cloned().or_else(|| {
                criteria
                    .filter(|_| F::PROPERTIES.iter().any(|p| *p == property))
                    .and_then(|c| c.filters.value(property))
            });

            if let Some(value) = value {
                filters.push(Some(self.property_filter(field, &value.to_query_string())?));
            }
        }

        let mut facet_queries = Vec::new();
        for (code, selection) in &group.facets {
            let facet = input.facet(code).ok_or_else(|| {
                Error::Configuration(format!("No facet \"{}\" is defined for this query", code))
            })?;

            if facet.is_multi_selectable {
                // Single-group requests apply these through the post-filter.
                if input.is_multi_criteria() {
                    facet_queries.push(self.facets.build_multi_selectable_filter(selection, facet)?);
                }
                continue;
            }

            let query = if let Some(value) = selection.selected.first() {
                Some(self.facets.create_facet_sub_query(value, false, facet)?)
            } else if let Some(value) = selection.excluded.first() {
                Some(self.facets.create_facet_sub_query(value, true, facet)?)
            } else {
                None
            };
            facet_queries.push(query);
        }

        Ok(dsl::and([text_query, dsl::and(filters), dsl::and(facet_queries)]))
    }

    fn property_filter(&self, field: &FieldDescriptor, value: &str) -> Result<JsonValue> {
        match field.category {
            FieldCategory::FullText => Ok(dsl::multi_match(value, [field])),
            FieldCategory::Facet | FieldCategory::Filter | FieldCategory::Sort | FieldCategory::Security => {
                Ok(dsl::term(&field.field_name, value))
            }
            FieldCategory::Result => Err(Error::Configuration(format!(
                "Cannot filter on fields that are not indexed. Field: {}",
                field.field_name
            ))),
        }
    }

    fn post_filter(&self, input: &AdvancedQueryInput<F>) -> Result<Option<JsonValue>> {
        if input.search_criteria.len() != 1 {
            return Ok(None);
        }

        let mut groups = Vec::new();
        for sc in &input.search_criteria {
            let mut parts = Vec::new();
            for (code, selection) in &sc.facets {
                if let Some(facet) = input.facet(code).filter(|f| f.is_multi_selectable) {
                    parts.push(self.facets.build_multi_selectable_filter(selection, facet)?);
                }
            }
            if let Some(group) = dsl::and(parts) {
                groups.push(Some(group));
            }
        }

        Ok(dsl::or(groups))
    }

    /// The first group naming a group facet decides the grouping.
    pub fn group_target(&self, input: &AdvancedQueryInput<F>) -> Result<Option<GroupTarget>> {
        let code = input
            .search_criteria
            .iter()
            .filter_map(|sc| sc.group.as_deref())
            .find(|g| !g.is_empty());

        let Some(code) = code else {
            return Ok(None);
        };

        let facet = input
            .facet(code)
            .ok_or_else(|| Error::Configuration(format!("No facet \"{}\" to group on", code)))?;
        let field = self.definition.field(&facet.field)?;

        Ok(Some(GroupTarget {
            facet: facet.clone(),
            field_name: field.field_name.clone(),
        }))
    }

    fn sort_definition(&self, input: &AdvancedQueryInput<F>) -> Result<Option<SortDefinition>> {
        let property = input
            .search_criteria
            .iter()
            .filter_map(|sc| sc.sort_field_name.as_deref())
            .find(|s| !s.is_empty());

        let Some(property) = property else {
            return Ok(None);
        };

        let field = self.definition.try_field(property).ok_or_else(|| {
            Error::Configuration(format!(
                "The document \"{}\" is missing a \"{}\" property to sort on",
                self.definition.document_type(),
                property
            ))
        })?;

        // Only the first group's direction is honoured.
        let descending = input.search_criteria.first().map(|sc| sc.sort_desc).unwrap_or(false);

        Ok(Some(SortDefinition {
            field_name: field.field_name.clone(),
            descending,
        }))
    }

    fn source_fields(&self, input: &AdvancedQueryInput<F>) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for field in input
            .search_criteria
            .iter()
            .filter_map(|sc| sc.criteria.as_ref())
            .flat_map(|c| c.source_fields.iter())
        {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }

    fn highlight(&self) -> JsonValue {
        let fields: JsonMap<String, JsonValue> = self
            .definition
            .search_fields()
            .map(|f| (f.field_name.clone(), json!({})))
            .collect();
        json!({ "fields": fields })
    }

    fn define_group_aggregation(
        &self,
        aggs: &mut JsonMap<String, JsonValue>,
        group: &GroupTarget,
        input: &AdvancedQueryInput<F>,
        post_filter: Option<&JsonValue>,
    ) {
        let mut top_hits = json!({ "size": input.group_size });
        if input.highlights {
            top_hits["highlight"] = self.highlight();
        }

        let mut group_aggs = JsonMap::new();
        group_aggs.insert(
            group.aggregation_name(),
            json!({
                "terms": { "field": group.field_name, "size": GROUP_BUCKET_SIZE },
                "aggs": { TOP_HITS_NAME: { "top_hits": top_hits.clone() } }
            }),
        );
        group_aggs.insert(
            group.missing_aggregation_name(),
            json!({
                "missing": { "field": group.field_name },
                "aggs": { TOP_HITS_NAME: { "top_hits": top_hits } }
            }),
        );

        // Aggregations ignore the post-filter, so groups re-apply it.
        match post_filter {
            Some(filter) => {
                aggs.insert(
                    group.aggregation_name(),
                    json!({ "filter": filter, "aggs": group_aggs }),
                );
            }
            None => aggs.extend(group_aggs),
        }
    }
}
