//! Search service - advanced search execution
//!
//! Orchestrates advanced searches by:
//! - Compiling the request for the registered document type
//! - Opening or resuming point-in-time paging for skip tokens
//! - Mapping hits, facet buckets and group buckets to a `QueryOutput`

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::descriptor::{DescriptorRegistry, DocumentDefinition, SearchDocument};
use crate::facet::handler::bucket_key;
use crate::facet::{FacetHandler, MISSING_VALUE};
use crate::metrics::{SEARCH_DURATION_SECONDS, SEARCH_RESULTS, SEARCH_TOTAL};
use crate::models::{FacetOutput, GroupResult, QueryOutput};
use crate::query::{
    AdvancedQueryInput, CompileOptions, CompiledQuery, CriteriaFilters, GroupTarget, PageCursor,
    QueryCompiler, SkipToken, PIT_KEEP_ALIVE, PIT_PAGE_SIZE, TOP_HITS_NAME,
};
use crate::store::{Hit, SearchResponse, SearchStore};
use crate::{Error, Result};

/// Highlighted fragments of a hit, by backend field name.
pub type Highlights = BTreeMap<String, Vec<String>>;

/// Search service running advanced queries against the search store
pub struct SearchService {
    store: Arc<dyn SearchStore>,
    registry: Arc<DescriptorRegistry>,
}

impl SearchService {
    pub fn new(store: Arc<dyn SearchStore>, registry: Arc<DescriptorRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<dyn SearchStore> {
        &self.store
    }

    /// Compiler for a registered document type.
    pub fn compiler<D: SearchDocument, F: CriteriaFilters>(&self) -> Result<QueryCompiler<F>> {
        QueryCompiler::new(self.registry.definition::<D>()?)
    }

    /// Search and return the matched documents as stored.
    pub async fn advanced_search<D, F>(&self, input: &AdvancedQueryInput<F>) -> Result<QueryOutput<D>>
    where
        D: SearchDocument,
        F: CriteriaFilters,
    {
        self.advanced_search_with(input, |document: D, _: &Highlights| document)
            .await
    }

    /// Search and map every hit, with its highlights, through `mapper`.
    pub async fn advanced_search_with<D, F, O, M>(
        &self,
        input: &AdvancedQueryInput<F>,
        mut mapper: M,
    ) -> Result<QueryOutput<O>>
    where
        D: SearchDocument,
        F: CriteriaFilters,
        O: Send,
        M: FnMut(D, &Highlights) -> O + Send,
    {
        let compiler = self.compiler::<D, F>()?;
        let document_type = D::DOCUMENT_TYPE;
        let start = Instant::now();

        let result = self.execute(&compiler, input, &mut mapper).await;

        SEARCH_DURATION_SECONDS
            .with_label_values(&[document_type])
            .observe(start.elapsed().as_secs_f64());

        match &result {
            Ok(output) => {
                SEARCH_TOTAL.with_label_values(&[document_type, "ok"]).inc();
                SEARCH_RESULTS
                    .with_label_values(&[document_type])
                    .observe(output.total_count as f64);
                tracing::debug!(
                    document_type,
                    total_count = output.total_count,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Advanced search completed"
                );
            }
            Err(e) => {
                SEARCH_TOTAL.with_label_values(&[document_type, "error"]).inc();
                tracing::error!(document_type, error = %e, "Advanced search failed");
            }
        }

        result
    }

    /// Number of documents matching the request, facet selections included.
    pub async fn advanced_count<D, F>(&self, input: &AdvancedQueryInput<F>) -> Result<u64>
    where
        D: SearchDocument,
        F: CriteriaFilters,
    {
        let compiler = self.compiler::<D, F>()?;
        let body = compiler.count_query(input)?;
        self.store.count(compiler.definition(), &body).await
    }

    async fn execute<D, F, O, M>(
        &self,
        compiler: &QueryCompiler<F>,
        input: &AdvancedQueryInput<F>,
        mapper: &mut M,
    ) -> Result<QueryOutput<O>>
    where
        D: SearchDocument,
        F: CriteriaFilters,
        M: FnMut(D, &Highlights) -> O + Send,
    {
        let definition = compiler.definition();

        let cursor = match &input.skip_token {
            None => None,
            Some(SkipToken::Start) => {
                let pit_id = self
                    .store
                    .open_point_in_time(definition, PIT_KEEP_ALIVE)
                    .await?;
                Some(PageCursor::start(pit_id))
            }
            Some(SkipToken::Resume(token)) => Some(PageCursor::decode(token)?),
        };

        let compiled = compiler.compile(
            input,
            CompileOptions {
                cursor: cursor.as_ref(),
                ..Default::default()
            },
        )?;

        let response = self.store.search(definition, &compiled.body).await?;

        let skip_token = match &cursor {
            Some(cursor) => next_skip_token(cursor, &response)?,
            None => None,
        };

        let aggregations = response.aggregations.clone().unwrap_or(JsonValue::Null);
        let facets = facet_outputs(compiler.facet_handler(), input, &aggregations);

        let mut output = QueryOutput {
            facets,
            search_fields: searchable_fields(definition, input),
            total_count: response.hits.total_count(),
            skip_token,
            ..Default::default()
        };

        match &compiled.group {
            Some(group) => {
                output.groups = group_results(&compiled, group, &aggregations, mapper)?;
            }
            None => {
                output.list = response
                    .hits
                    .hits
                    .into_iter()
                    .map(|hit| map_hit(hit, mapper))
                    .collect::<Result<Vec<_>>>()?;
            }
        }

        Ok(output)
    }
}

/// Token of the next page, when the current page is full.
fn next_skip_token(cursor: &PageCursor, response: &SearchResponse) -> Result<Option<String>> {
    let hits = &response.hits.hits;
    if hits.len() < PIT_PAGE_SIZE {
        return Ok(None);
    }

    let next = PageCursor {
        pit_id: response
            .pit_id
            .clone()
            .unwrap_or_else(|| cursor.pit_id.clone()),
        search_after: hits.last().map(|hit| hit.sort.clone()),
    };
    Ok(Some(next.encode()?))
}

fn facet_outputs<F>(handler: &FacetHandler, input: &AdvancedQueryInput<F>, aggregations: &JsonValue) -> Vec<FacetOutput> {
    input
        .facet_definitions
        .iter()
        .map(|facet| FacetOutput {
            code: facet.code.clone(),
            label: facet.label.clone(),
            is_multi_selectable: facet.is_multi_selectable,
            values: handler.extract_facet_items(aggregations, facet),
        })
        .collect()
}

/// Full-text fields allowed by at least one criteria group.
fn searchable_fields<F>(definition: &DocumentDefinition, input: &AdvancedQueryInput<F>) -> Vec<String> {
    definition
        .search_fields()
        .filter(|field| {
            input.search_criteria.iter().any(|sc| {
                sc.criteria
                    .as_ref()
                    .and_then(|c| c.search_fields.as_ref())
                    .map_or(true, |allowed| allowed.contains(&field.field_name))
            })
        })
        .map(|field| field.field_name.clone())
        .collect()
}

fn map_hit<D, O, M>(hit: Hit, mapper: &mut M) -> Result<O>
where
    D: SearchDocument,
    M: FnMut(D, &Highlights) -> O,
{
    let source = hit.source.ok_or_else(|| {
        Error::Backend(format!(
            "Search hit {} has no source",
            hit.id.as_deref().unwrap_or("<unknown>")
        ))
    })?;
    let document: D = serde_json::from_value(source)?;
    Ok(mapper(document, &hit.highlight))
}

fn top_hits<D, O, M>(bucket: &JsonValue, mapper: &mut M) -> Result<Vec<O>>
where
    D: SearchDocument,
    M: FnMut(D, &Highlights) -> O,
{
    let hits = match bucket.pointer(&format!("/{}/hits/hits", TOP_HITS_NAME)) {
        Some(hits) => Vec::<Hit>::deserialize(hits)?,
        None => Vec::new(),
    };
    hits.into_iter().map(|hit| map_hit(hit, mapper)).collect()
}

fn group_results<D, O, M>(
    compiled: &CompiledQuery,
    group: &GroupTarget,
    aggregations: &JsonValue,
    mapper: &mut M,
) -> Result<Vec<GroupResult<O>>>
where
    D: SearchDocument,
    M: FnMut(D, &Highlights) -> O,
{
    // Post-filtered groups sit inside a filter aggregation of the same name.
    let root = if compiled.has_post_filter {
        aggregations.get(group.aggregation_name()).unwrap_or(&JsonValue::Null)
    } else {
        aggregations
    };

    let buckets = root
        .get(group.aggregation_name())
        .and_then(|agg| agg.get("buckets"))
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut groups = Vec::with_capacity(buckets.len() + 1);
    for bucket in buckets {
        let Some(code) = bucket_key(bucket) else {
            continue;
        };
        groups.push(GroupResult {
            label: group.facet.resolve_label(&code),
            code,
            total_count: doc_count(bucket),
            list: top_hits(bucket, mapper)?,
        });
    }

    if let Some(missing) = root.get(group.missing_aggregation_name()) {
        let total_count = doc_count(missing);
        if total_count > 0 {
            groups.push(GroupResult {
                code: MISSING_VALUE.to_string(),
                label: group.facet.resolve_label(MISSING_VALUE),
                total_count,
                list: top_hits(missing, mapper)?,
            });
        }
    }

    Ok(groups)
}

fn doc_count(bucket: &JsonValue) -> u64 {
    bucket.get("doc_count").and_then(JsonValue::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_page_yields_a_continuation_token() {
        let cursor = PageCursor::start("pit-1");
        let mut response = SearchResponse::default();
        response.hits.hits = (0..PIT_PAGE_SIZE)
            .map(|i| Hit {
                sort: vec![json!(i)],
                ..Default::default()
            })
            .collect();
        response.pit_id = Some("pit-2".into());

        let token = next_skip_token(&cursor, &response).unwrap().unwrap();
        let next = PageCursor::decode(&token).unwrap();
        assert_eq!(next.pit_id, "pit-2");
        assert_eq!(next.search_after, Some(vec![json!(PIT_PAGE_SIZE - 1)]));

        response.hits.hits.pop();
        assert_eq!(next_skip_token(&cursor, &response).unwrap(), None);
    }

    #[test]
    fn reads_top_hits_of_a_bucket() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Doc {
            id: i64,
        }
        impl SearchDocument for Doc {
            const DOCUMENT_TYPE: &'static str = "Doc";
            fn describe() -> Result<DocumentDefinition> {
                unreachable!()
            }
        }

        let bucket = json!({
            "key": "ACT",
            "doc_count": 2,
            "groupTop": { "hits": { "hits": [
                { "_id": "1", "_source": { "id": 1 } },
                { "_id": "2", "_source": { "id": 2 } }
            ] } }
        });
        let ids = top_hits(&bucket, &mut |doc: Doc, _: &Highlights| doc.id).unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(doc_count(&bucket), 2);
    }
}
