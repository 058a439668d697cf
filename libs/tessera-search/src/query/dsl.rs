//! Query DSL fragments
//!
//! `None` stands for "no constraint" (match all); combinators drop it where it
//! is neutral so compiled requests stay minimal.

use serde_json::{json, Value as JsonValue};

use crate::descriptor::FieldDescriptor;

pub fn term(field: &str, value: &str) -> JsonValue {
    json!({ "term": { field: value } })
}

/// Documents without a value for `field`.
pub fn missing(field: &str) -> JsonValue {
    json!({ "bool": { "must_not": [ { "exists": { "field": field } } ] } })
}

pub fn not(query: JsonValue) -> JsonValue {
    json!({ "bool": { "must_not": [query] } })
}

pub fn multi_match<'a>(text: &str, fields: impl IntoIterator<Item = &'a FieldDescriptor>) -> JsonValue {
    let fields: Vec<String> = fields.into_iter().map(|f| f.boosted_name()).collect();
    json!({
        "multi_match": {
            "query": text,
            "fields": fields,
            "type": "best_fields",
            "operator": "and"
        }
    })
}

pub fn match_all() -> JsonValue {
    json!({ "match_all": {} })
}

/// Conjunction; unconstrained parts are dropped.
pub fn and(parts: impl IntoIterator<Item = Option<JsonValue>>) -> Option<JsonValue> {
    let mut parts: Vec<JsonValue> = parts.into_iter().flatten().collect();
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(json!({ "bool": { "must": parts } })),
    }
}

/// Disjunction; a single unconstrained part makes the whole disjunction
/// unconstrained.
pub fn or(parts: impl IntoIterator<Item = Option<JsonValue>>) -> Option<JsonValue> {
    let mut clauses = Vec::new();
    for part in parts {
        clauses.push(part?);
    }
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({ "bool": { "should": clauses, "minimum_should_match": 1 } })),
    }
}
