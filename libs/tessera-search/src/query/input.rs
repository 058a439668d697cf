//! Advanced search request

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::descriptor::DocumentDefinition;
use crate::facet::{FacetDefinition, FacetHandler, FacetInput};
use crate::{Error, Result};

/// Top hits returned per group unless configured otherwise.
pub const DEFAULT_GROUP_SIZE: usize = 10;

/// Typed value of a property filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(DateTime<Utc>),
    Uuid(Uuid),
}

impl FilterValue {
    /// Value as sent to the backend. Dates use second precision UTC.
    pub fn to_query_string(&self) -> String {
        match self {
            FilterValue::Bool(true) => "true".to_string(),
            FilterValue::Bool(false) => "false".to_string(),
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Float(f) => f.to_string(),
            FilterValue::Text(s) => s.clone(),
            FilterValue::Date(d) => d.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            FilterValue::Uuid(u) => u.to_string(),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Date(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        FilterValue::Uuid(value)
    }
}

/// Structured criteria whose properties filter the document field of the same name.
///
/// `PROPERTIES` lists every property the type can carry; it is checked against
/// the document definition when a `QueryCompiler` is created.
pub trait CriteriaFilters: Send + Sync {
    const PROPERTIES: &'static [&'static str];

    fn value(&self, property: &str) -> Option<FilterValue>;
}

/// Criteria without structured filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoFilters;

impl CriteriaFilters for NoFilters {
    const PROPERTIES: &'static [&'static str] = &[];

    fn value(&self, _property: &str) -> Option<FilterValue> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria<F = NoFilters> {
    /// Free text; blank or `*` means no text constraint.
    pub query: Option<String>,
    /// Allow-list of full-text backend fields. `None` searches all of them.
    pub search_fields: Option<Vec<String>>,
    /// Backend fields to return; empty returns the whole document.
    pub source_fields: Vec<String>,
    pub filters: F,
}

impl<F: Default> Criteria<F> {
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            query: Some(text.into()),
            ..Self::default()
        }
    }
}

impl<F> Criteria<F> {
    pub fn with_filters<G>(self, filters: G) -> Criteria<G> {
        Criteria {
            query: self.query,
            search_fields: self.search_fields,
            source_fields: self.source_fields,
            filters,
        }
    }

    pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_source_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Text to search, after normalisation.
    pub fn effective_query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .filter(|q| !q.trim().is_empty() && *q != "*")
    }
}

/// One criteria group. Groups of a request are combined with OR.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInput<F = NoFilters> {
    pub criteria: Option<Criteria<F>>,
    /// Facet selections by facet code.
    pub facets: BTreeMap<String, FacetInput>,
    /// Code of the facet to group by.
    pub group: Option<String>,
    pub skip: usize,
    pub top: Option<usize>,
    /// Property to sort on.
    pub sort_field_name: Option<String>,
    pub sort_desc: bool,
}

impl<F> Default for QueryInput<F> {
    fn default() -> Self {
        Self {
            criteria: None,
            facets: BTreeMap::new(),
            group: None,
            skip: 0,
            top: None,
            sort_field_name: None,
            sort_desc: false,
        }
    }
}

impl<F> QueryInput<F> {
    pub fn new(criteria: Criteria<F>) -> Self {
        Self {
            criteria: Some(criteria),
            ..Self::default()
        }
    }

    pub fn with_facet(mut self, code: impl Into<String>, input: FacetInput) -> Self {
        self.facets.insert(code.into(), input);
        self
    }

    pub fn with_group(mut self, facet_code: impl Into<String>) -> Self {
        self.group = Some(facet_code.into());
        self
    }

    pub fn with_page(mut self, skip: usize, top: usize) -> Self {
        self.skip = skip;
        self.top = Some(top);
        self
    }

    pub fn sorted_by(mut self, property: impl Into<String>, descending: bool) -> Self {
        self.sort_field_name = Some(property.into());
        self.sort_desc = descending;
        self
    }
}

/// Cursor paging request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipToken {
    /// Open a point in time and return the first page.
    Start,
    /// Continue from the token returned with the previous page.
    Resume(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedQueryInput<F = NoFilters> {
    pub search_criteria: Vec<QueryInput<F>>,
    /// Values by property, taking precedence over criteria properties.
    pub additional_filters: BTreeMap<String, FilterValue>,
    pub facet_definitions: Vec<FacetDefinition>,
    pub group_size: usize,
    /// Security scope values; `None` disables security filtering.
    pub security: Option<Vec<String>>,
    pub highlights: bool,
    pub skip_token: Option<SkipToken>,
}

impl<F> AdvancedQueryInput<F> {
    pub fn facet(&self, code: &str) -> Option<&FacetDefinition> {
        self.facet_definitions.iter().find(|f| f.code == code)
    }

    pub fn is_multi_criteria(&self) -> bool {
        self.search_criteria.len() > 1
    }
}

pub struct AdvancedQueryInputBuilder<F = NoFilters> {
    input: AdvancedQueryInput<F>,
}

impl<F: CriteriaFilters> AdvancedQueryInputBuilder<F> {
    pub fn new(search_criteria: impl IntoIterator<Item = QueryInput<F>>) -> Self {
        Self {
            input: AdvancedQueryInput {
                search_criteria: search_criteria.into_iter().collect(),
                additional_filters: BTreeMap::new(),
                facet_definitions: Vec::new(),
                group_size: DEFAULT_GROUP_SIZE,
                security: None,
                highlights: false,
                skip_token: None,
            },
        }
    }

    pub fn with_additional_filter(mut self, property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.input
            .additional_filters
            .insert(property.into(), value.into());
        self
    }

    pub fn with_facets(mut self, facets: impl IntoIterator<Item = FacetDefinition>) -> Self {
        self.input.facet_definitions.extend(facets);
        self
    }

    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.input.group_size = group_size;
        self
    }

    /// Blank values are ignored; no remaining value disables security filtering.
    pub fn with_security<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.trim().is_empty())
            .collect();
        self.input.security = if values.is_empty() { None } else { Some(values) };
        self
    }

    pub fn with_highlights(mut self) -> Self {
        self.input.highlights = true;
        self
    }

    pub fn with_skip_token(mut self, token: SkipToken) -> Self {
        self.input.skip_token = Some(token);
        self
    }

    /// Validate the request against the document definition.
    pub fn build(self, definition: &Arc<DocumentDefinition>) -> Result<AdvancedQueryInput<F>> {
        let input = self.input;

        if input.search_criteria.is_empty() {
            return Err(Error::Configuration(
                "An advanced query needs at least one criteria group".to_string(),
            ));
        }

        let handler = FacetHandler::new(Arc::clone(definition));
        for facet in &input.facet_definitions {
            handler.check_facet(facet)?;
        }

        for property in input.additional_filters.keys() {
            let field = definition.field(property)?;
            if !field.is_filterable() {
                return Err(Error::Configuration(format!(
                    "Cannot filter on fields that are not indexed. Field: {}",
                    field.field_name
                )));
            }
        }

        for group in &input.search_criteria {
            for code in group.facets.keys() {
                if input.facet(code).is_none() {
                    return Err(Error::Configuration(format!(
                        "No facet \"{}\" is defined for this query",
                        code
                    )));
                }
            }
        }

        Ok(input)
    }
}
