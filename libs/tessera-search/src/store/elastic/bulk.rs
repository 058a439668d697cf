use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value as JsonValue};

use super::ElasticStore;
use crate::descriptor::{DocumentDefinition, DocumentId};
use crate::metrics::{BULK_DURATION_SECONDS, BULK_REQUESTS_TOTAL};
use crate::store::BulkMutator;
use crate::{Error, Result};

/// Item errors quoted in a failed bulk error message.
const MAX_REPORTED_ITEM_ERRORS: usize = 5;

/// NDJSON `_bulk` request builder.
pub struct ElasticBulk<'a> {
    store: &'a ElasticStore,
    lines: Vec<String>,
    operations: usize,
}

impl<'a> ElasticBulk<'a> {
    pub(crate) fn new(store: &'a ElasticStore) -> Self {
        Self {
            store,
            lines: Vec::new(),
            operations: 0,
        }
    }

    fn push_delete(&mut self, index: &str, id: String) -> Result<()> {
        self.lines
            .push(serde_json::to_string(&json!({ "delete": { "_index": index, "_id": id } }))?);
        Ok(())
    }

    fn push_index(&mut self, definition: &DocumentDefinition, index: &str, document: &JsonValue) -> Result<()> {
        let id = definition.primary_key().key_from_document(document)?;
        self.lines
            .push(serde_json::to_string(&json!({ "index": { "_index": index, "_id": id } }))?);
        self.lines.push(serde_json::to_string(document)?);
        Ok(())
    }

    /// NDJSON payload; every line, the last included, ends with a newline.
    pub(crate) fn payload(&self) -> String {
        let mut body = self.lines.join("\n");
        body.push('\n');
        body
    }
}

#[async_trait]
impl BulkMutator for ElasticBulk<'_> {
    fn delete(&mut self, definition: &DocumentDefinition, id: &DocumentId) -> Result<()> {
        let index = self.store.index_name(definition);
        let key = definition.primary_key().key_from_id(id)?;
        self.push_delete(&index, key)?;
        self.operations += 1;
        Ok(())
    }

    fn delete_many(&mut self, definition: &DocumentDefinition, ids: &[DocumentId]) -> Result<()> {
        let index = self.store.index_name(definition);
        for id in ids {
            let key = definition.primary_key().key_from_id(id)?;
            self.push_delete(&index, key)?;
        }
        self.operations += 1;
        Ok(())
    }

    fn index(&mut self, definition: &DocumentDefinition, document: &JsonValue) -> Result<()> {
        let index = self.store.index_name(definition);
        self.push_index(definition, &index, document)?;
        self.operations += 1;
        Ok(())
    }

    fn index_many(&mut self, definition: &DocumentDefinition, documents: &[JsonValue]) -> Result<()> {
        let index = self.store.index_name(definition);
        for document in documents {
            self.push_index(definition, &index, document)?;
        }
        self.operations += 1;
        Ok(())
    }

    fn operation_count(&self) -> usize {
        self.operations
    }

    async fn run(&mut self, wait_for_refresh: bool) -> Result<usize> {
        let operations = self.operations;
        if operations == 0 || self.lines.is_empty() {
            return Ok(operations);
        }

        let refresh = if wait_for_refresh { "wait_for" } else { "false" };
        let start = Instant::now();

        tracing::debug!(operations, actions = self.lines.len(), refresh, "Sending bulk request");

        let response = self
            .store
            .request(reqwest::Method::POST, "_bulk")
            .query(&[("refresh", refresh), ("timeout", "1m")])
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(self.payload())
            .send()
            .await;

        BULK_DURATION_SECONDS
            .with_label_values(&[refresh])
            .observe(start.elapsed().as_secs_f64());

        let body = match response {
            Ok(response) => ElasticStore::json_body(response).await,
            Err(e) => Err(Error::Http(e)),
        };

        let body = match body {
            Ok(body) => body,
            Err(e) => {
                BULK_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
                return Err(e);
            }
        };

        if body.get("errors").and_then(JsonValue::as_bool).unwrap_or(false) {
            BULK_REQUESTS_TOTAL.with_label_values(&["item_errors"]).inc();
            return Err(Error::Backend(describe_item_errors(&body)));
        }

        BULK_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
        self.lines.clear();
        self.operations = 0;

        Ok(operations)
    }
}

fn describe_item_errors(body: &JsonValue) -> String {
    let items = body.get("items").and_then(JsonValue::as_array);
    let failures: Vec<String> = items
        .into_iter()
        .flatten()
        .filter_map(|item| item.as_object()?.values().next())
        .filter_map(|action| {
            let error = action.get("error")?;
            let id = action.get("_id").and_then(JsonValue::as_str).unwrap_or("?");
            let reason = error
                .get("reason")
                .and_then(JsonValue::as_str)
                .unwrap_or("unknown reason");
            Some(format!("{}: {}", id, reason))
        })
        .collect();

    let shown = failures
        .iter()
        .take(MAX_REPORTED_ITEM_ERRORS)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");

    format!("Bulk request failed for {} item(s): {}", failures.len(), shown)
}
