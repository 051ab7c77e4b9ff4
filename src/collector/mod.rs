//! Scroll-paging query client for the benchmark document store.
//!
//! Retrieves one run per `jobSummary` document in the requested time range,
//! projects the configured metadata fields, and fetches the run's raw metric
//! documents grouped by metric name. Runs missing any configured metric are
//! dropped here; the normalizer never sees them. No retry logic: a failed
//! query surfaces to the caller.

use crate::config::CollectionConfig;
use crate::normalize::RunPayload;
use crate::{Error, Result};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const SUMMARY_METRIC: &str = "jobSummary";
const GC_JOB_NAME: &str = "garbage-collection";
const SCROLL_KEEPALIVE: &str = "1m";
const PAGE_SIZE: usize = 500;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One collected run, ready for normalization.
#[derive(Debug, Clone)]
pub struct CollectedRun {
    pub uuid: String,
    pub payload: RunPayload,
}

/// Query client for an OpenSearch-compatible endpoint.
pub struct Collector {
    client: Client,
    server: String,
    index: String,
    config: CollectionConfig,
}

impl Collector {
    pub fn new(server: &str, index: &str, config: CollectionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
            index: index.to_string(),
            config,
        })
    }

    /// Collect all runs whose summary falls inside `[from, to]`.
    pub async fn collect(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CollectedRun>> {
        let query = json!({
            "bool": {
                "filter": [
                    {"term": {"metricName.keyword": SUMMARY_METRIC}}
                ],
                "must": [
                    {"range": {"timestamp": {
                        "gte": from.format(TIMESTAMP_FORMAT).to_string(),
                        "lte": to.format(TIMESTAMP_FORMAT).to_string()
                    }}}
                ],
                "must_not": [
                    {"term": {"jobConfig.name.keyword": GC_JOB_NAME}}
                ]
            }
        });

        let summaries = self.scan(query).await?;
        info!(summaries = summaries.len(), "Found run summaries in range");

        let mut runs = Vec::new();
        for summary in summaries {
            let Some(uuid) = summary.get("uuid").and_then(Value::as_str) else {
                warn!("Run summary without uuid, skipping");
                continue;
            };
            let uuid = uuid.to_string();

            let metadata = self.project_metadata(&summary);
            let (metrics, complete) = self.metrics_by_uuid(&uuid).await?;
            if !complete {
                warn!(
                    uuid = %uuid,
                    found = metrics.len(),
                    expected = self.config.metrics.len(),
                    "Run is missing configured metrics, dropping"
                );
                continue;
            }

            runs.push(CollectedRun {
                uuid,
                payload: RunPayload { metadata, metrics },
            });
        }

        Ok(runs)
    }

    /// Project the configured metadata fields out of a run summary. Fields
    /// found inside the summary's `jobConfig` land under a nested
    /// `jobConfig` mapping.
    fn project_metadata(&self, summary: &Value) -> Map<String, Value> {
        let mut metadata = Map::new();
        let job_config = summary.get("jobConfig").and_then(Value::as_object);

        for field in &self.config.metadata {
            if let Some(value) = summary.get(field) {
                metadata.insert(field.clone(), value.clone());
            } else if let Some(value) = job_config.and_then(|jc| jc.get(field)) {
                let nested = metadata
                    .entry("jobConfig".to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Some(nested) = nested.as_object_mut() {
                    nested.insert(field.clone(), value.clone());
                }
            }
        }
        metadata
    }

    /// Fetch every configured metric's documents for one run, grouped by
    /// metric name in retrieval order. The boolean reports whether every
    /// configured metric produced at least one document.
    async fn metrics_by_uuid(&self, uuid: &str) -> Result<(Map<String, Value>, bool)> {
        let query = json!({
            "bool": {
                "filter": [
                    {"term": {"uuid.keyword": uuid}},
                    {"terms": {"metricName.keyword": self.config.metrics}}
                ],
                "must_not": [
                    {"term": {"jobConfig.name.keyword": GC_JOB_NAME}}
                ]
            }
        });

        let mut metrics: Map<String, Value> = Map::new();
        for doc in self.scan(query).await? {
            let Some(name) = doc.get("metricName").and_then(Value::as_str) else {
                continue;
            };
            let name = name.to_string();
            match metrics.get_mut(&name) {
                Some(Value::Array(list)) => list.push(doc),
                _ => {
                    metrics.insert(name, Value::Array(vec![doc]));
                }
            }
        }

        let complete = run_is_complete(&metrics, &self.config.metrics);
        Ok((metrics, complete))
    }

    /// Run a query through the scroll API, returning every document source.
    async fn scan(&self, query: Value) -> Result<Vec<Value>> {
        let url = format!(
            "{}/{}/_search?scroll={}",
            self.server, self.index, SCROLL_KEEPALIVE
        );
        let body = json!({"size": PAGE_SIZE, "query": query});
        let mut response = self.request(&url, &body).await?;

        let mut documents = Vec::new();
        let mut scroll_id = None;
        loop {
            if let Some(id) = response.get("_scroll_id").and_then(Value::as_str) {
                scroll_id = Some(id.to_string());
            }
            let hits = response
                .pointer("/hits/hits")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if hits.is_empty() {
                break;
            }
            debug!(page_hits = hits.len(), "Scroll page received");
            for hit in hits {
                if let Some(source) = hit.get("_source") {
                    documents.push(source.clone());
                }
            }

            let Some(id) = &scroll_id else {
                break;
            };
            let url = format!("{}/_search/scroll", self.server);
            let body = json!({"scroll": SCROLL_KEEPALIVE, "scroll_id": id});
            response = self.request(&url, &body).await?;
        }

        if let Some(id) = scroll_id {
            // Free the scroll context; failure here is not fatal
            let url = format!("{}/_search/scroll", self.server);
            let result = self
                .client
                .delete(&url)
                .json(&json!({"scroll_id": id}))
                .send()
                .await;
            if let Err(e) = result {
                debug!(error = %e, "Failed to clear scroll context");
            }
        }

        Ok(documents)
    }

    async fn request(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Query(format!(
                "document store returned {status} for {url}: {text}"
            )));
        }
        Ok(response.json().await?)
    }
}

/// Whether a run's metric map covers every configured metric. Runs that
/// fail this are dropped before normalization. The count comparison is
/// sufficient because the query only returns configured metric names.
fn run_is_complete(metrics: &Map<String, Value>, expected: &[String]) -> bool {
    metrics.len() == expected.len()
}
