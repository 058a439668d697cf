//! Elasticsearch REST backend

mod bulk;

pub use bulk::ElasticBulk;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value as JsonValue};
use url::Url;

use crate::config::SearchConfig;
use crate::descriptor::DocumentDefinition;
use crate::store::{BulkMutator, SearchResponse, SearchStore};
use crate::{Error, Result};

/// Search store talking to an Elasticsearch cluster over HTTP.
#[derive(Debug)]
pub struct ElasticStore {
    client: Client,
    base_url: String,
    index_prefix: String,
    credentials: Option<(String, String)>,
    bulk_chunk_size: usize,
}

impl ElasticStore {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let parsed = Url::parse(&config.node_uri).map_err(|e| {
            Error::Configuration(format!("Invalid search node URI '{}': {}", config.node_uri, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        let credentials = match (&config.login, &config.password) {
            (Some(login), Some(password)) => Some((login.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            index_prefix: config.index_name.to_lowercase(),
            credentials,
            bulk_chunk_size: config.bulk_chunk_size.max(1),
        })
    }

    /// Backend index of a document type: `{prefix}_{document type}`, lowercase.
    pub fn index_name(&self, definition: &DocumentDefinition) -> String {
        format!(
            "{}_{}",
            self.index_prefix,
            definition.document_type().to_lowercase()
        )
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((login, password)) => builder.basic_auth(login, Some(password)),
            None => builder,
        }
    }

    /// Decode a JSON response body, turning non-success statuses into errors.
    pub(crate) async fn json_body(response: Response) -> Result<JsonValue> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::BackendStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn send_json(&self, method: Method, path: &str, body: Option<&JsonValue>) -> Result<JsonValue> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        Self::json_body(response).await
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.request(Method::HEAD, index).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(Error::BackendStatus {
                status: status.as_u16(),
                body: format!("HEAD {} failed", index),
            }),
        }
    }
}

#[async_trait]
impl SearchStore for ElasticStore {
    fn bulk(&self) -> Box<dyn BulkMutator + '_> {
        Box::new(ElasticBulk::new(self))
    }

    async fn ensure_index(&self, definition: &DocumentDefinition) -> Result<bool> {
        let index = self.index_name(definition);
        if self.index_exists(&index).await? {
            return Ok(false);
        }

        let body = json!({ "mappings": definition.index_mapping() });
        self.send_json(Method::PUT, &index, Some(&body)).await?;
        tracing::info!(index = %index, "Created search index");
        Ok(true)
    }

    async fn reset_index(
        &self,
        definition: &DocumentDefinition,
        documents: Vec<JsonValue>,
        partial_rebuild: bool,
    ) -> Result<usize> {
        let index = self.index_name(definition);

        if !partial_rebuild {
            let body = json!({ "query": { "match_all": {} } });
            self.send_json(
                Method::POST,
                &format!("{}/_delete_by_query?refresh=true&conflicts=proceed", index),
                Some(&body),
            )
            .await?;
        }

        let total = documents.len();
        let mut written = 0;
        for chunk in documents.chunks(self.bulk_chunk_size) {
            let mut bulk = ElasticBulk::new(self);
            bulk.index_many(definition, chunk)?;
            bulk.run(false).await?;
            written += chunk.len();
            tracing::info!(index = %index, written, total, "Indexed document chunk");
        }

        self.send_json(Method::POST, &format!("{}/_refresh", index), None)
            .await?;

        Ok(written)
    }

    async fn search(&self, definition: &DocumentDefinition, body: &JsonValue) -> Result<SearchResponse> {
        // Point-in-time searches address the PIT, not the index.
        let path = if body.get("pit").is_some() {
            "_search".to_string()
        } else {
            format!("{}/_search", self.index_name(definition))
        };

        let response = self.send_json(Method::POST, &path, Some(body)).await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn open_point_in_time(&self, definition: &DocumentDefinition, keep_alive: &str) -> Result<String> {
        let path = format!("{}/_pit?keep_alive={}", self.index_name(definition), keep_alive);
        let response = self.send_json(Method::POST, &path, None).await?;
        response
            .get("id")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Backend("Point in time response has no id".to_string()))
    }

    async fn count(&self, definition: &DocumentDefinition, body: &JsonValue) -> Result<u64> {
        let path = format!("{}/_count", self.index_name(definition));
        let response = self.send_json(Method::POST, &path, Some(body)).await?;
        response
            .get("count")
            .and_then(JsonValue::as_u64)
            .ok_or_else(|| Error::Backend("Count response has no count".to_string()))
    }
}
