use heck::ToLowerCamelCase;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Storage type of a document field in the search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Keyword,
    Text,
    Integer,
    Long,
    Double,
    Boolean,
    Date,
    Uuid,
}

impl FieldType {
    /// Backend mapping type for exact-value (non analysed) usage.
    pub fn exact_mapping_type(&self) -> &'static str {
        match self {
            FieldType::Keyword | FieldType::Text | FieldType::Uuid => "keyword",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
        }
    }
}

/// How a field participates in search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldCategory {
    /// Stored and returned, never queried.
    Result,
    /// Analysed and searched by free-text queries.
    FullText,
    Facet,
    Filter,
    Sort,
    /// Holds the scope values matched by security filtering.
    Security,
}

/// Maps one document property to its backend field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub property_name: String,
    pub field_name: String,
    pub field_type: FieldType,
    pub category: FieldCategory,
    pub is_multi_valued: bool,
    /// Position in the primary key, `None` when the field is not part of it.
    pub pk_order: Option<u32>,
    pub is_partial_rebuild_date: bool,
    pub boost: f64,
}

impl FieldDescriptor {
    /// The backend field name defaults to the property name in lower camel case,
    /// which is what `#[serde(rename_all = "camelCase")]` documents serialize to.
    pub fn new(property_name: impl Into<String>, field_type: FieldType, category: FieldCategory) -> Self {
        let property_name = property_name.into();
        let field_name = property_name.to_lower_camel_case();
        Self {
            property_name,
            field_name,
            field_type,
            category,
            is_multi_valued: false,
            pk_order: None,
            is_partial_rebuild_date: false,
            boost: 1.0,
        }
    }

    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    pub fn multi_valued(mut self) -> Self {
        self.is_multi_valued = true;
        self
    }

    /// Marks the field as part of the primary key. Order 0 is only accepted
    /// for single-field keys.
    pub fn key(mut self, pk_order: u32) -> Self {
        self.pk_order = Some(pk_order);
        self
    }

    pub fn partial_rebuild_date(mut self) -> Self {
        self.is_partial_rebuild_date = true;
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = boost;
        self
    }

    pub fn is_key(&self) -> bool {
        self.pk_order.is_some()
    }

    pub(crate) fn key_order(&self) -> u32 {
        self.pk_order.unwrap_or(0)
    }

    pub fn is_full_text(&self) -> bool {
        self.category == FieldCategory::FullText
    }

    /// Whether criteria values may be matched against this field.
    pub fn is_filterable(&self) -> bool {
        self.category != FieldCategory::Result
    }

    /// Read this field from a serialized document.
    pub fn value<'a>(&self, document: &'a JsonValue) -> Option<&'a JsonValue> {
        document.get(&self.field_name).filter(|v| !v.is_null())
    }

    /// `name^boost` notation used by multi-field queries.
    pub fn boosted_name(&self) -> String {
        if (self.boost - 1.0).abs() < f64::EPSILON {
            self.field_name.clone()
        } else {
            format!("{}^{}", self.field_name, self.boost)
        }
    }

    pub(crate) fn mapping(&self) -> JsonValue {
        match self.category {
            FieldCategory::FullText => json!({ "type": "text" }),
            FieldCategory::Result => json!({ "type": self.field_type.exact_mapping_type(), "index": false }),
            _ => json!({ "type": self.field_type.exact_mapping_type() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_camel_case_field_name() {
        let field = FieldDescriptor::new("company_name", FieldType::Text, FieldCategory::FullText);
        assert_eq!(field.field_name, "companyName");
        assert_eq!(field.boost, 1.0);
        assert!(!field.is_key());
    }

    #[test]
    fn key_order_zero_still_marks_a_key() {
        let field = FieldDescriptor::new("code", FieldType::Keyword, FieldCategory::Filter).key(0);
        assert!(field.is_key());
        assert_eq!(field.pk_order, Some(0));
    }

    #[test]
    fn boosted_name_omits_default_boost() {
        let plain = FieldDescriptor::new("name", FieldType::Text, FieldCategory::FullText);
        assert_eq!(plain.boosted_name(), "name");

        let boosted = plain.clone().boost(3.0);
        assert_eq!(boosted.boosted_name(), "name^3");
    }

    #[test]
    fn reads_values_from_documents() {
        let field = FieldDescriptor::new("status_code", FieldType::Keyword, FieldCategory::Facet);
        let doc = json!({ "statusCode": "ACT", "other": null });
        assert_eq!(field.value(&doc), Some(&json!("ACT")));

        let missing = json!({ "statusCode": null });
        assert_eq!(field.value(&missing), None);
    }

    #[test]
    fn maps_categories_to_backend_types() {
        let text = FieldDescriptor::new("name", FieldType::Text, FieldCategory::FullText);
        assert_eq!(text.mapping(), json!({ "type": "text" }));

        let facet = FieldDescriptor::new("status", FieldType::Text, FieldCategory::Facet);
        assert_eq!(facet.mapping(), json!({ "type": "keyword" }));

        let result = FieldDescriptor::new("created", FieldType::Date, FieldCategory::Result);
        assert_eq!(result.mapping(), json!({ "type": "date", "index": false }));
    }
}
