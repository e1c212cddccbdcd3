//! The Data Storage Pipeline (§4.6): converts raw scraped records into
//! [`HistoricDocument`]s and merges them against their persisted predecessor.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value};

use kraken_core::store::DataStore;
use kraken_core::types::{DocumentFactory, HistoricDocument, HistoricPayload, PipelineResult, RequestResult, Timestamp};
use kraken_core::{Error, ErrorKind, Result};

#[cfg(feature = "tracing")]
const TARGET: &str = "kraken_scheduler::pipeline::data_storage";

const MAX_ATTEMPTS: u32 = 3;

/// Default pipeline name, matching the routing prefix recognised by
/// [`kraken_core::dispatch::TaskRoutes`].
pub const NAME: &str = "pipeline.data_storage";

fn add_metric(metrics: &mut Map<String, Value>, key: &str, value: f64) {
    let current = metrics.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    metrics.insert(key.to_string(), Value::from(current + value));
}

fn add_statistic(statistics: &mut Map<String, Value>, key: &str, value: f64) {
    let current = statistics.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    statistics.insert(key.to_string(), Value::from(current + value));
}

/// Persists every record of a [`RequestResult`] as a versioned [`HistoricDocument<P>`],
/// backed by a `document_type`-tagged [`DocumentFactory`] and a [`DataStore<P>`].
pub struct DataStoragePipeline<P, F, S> {
    document_type: String,
    factory: F,
    store: Arc<S>,
    _payload: PhantomData<fn() -> P>,
}

impl<P, F, S> DataStoragePipeline<P, F, S>
where
    P: HistoricPayload + Send + Sync + 'static,
    F: DocumentFactory<P> + Send + Sync,
    S: DataStore<P>,
{
    /// Creates a pipeline tagging every raw record with `document_type` before
    /// handing it to `factory`.
    pub fn new(document_type: impl Into<String>, factory: F, store: Arc<S>) -> Self {
        Self {
            document_type: document_type.into(),
            factory,
            store,
            _payload: PhantomData,
        }
    }

    /// Saves one already-built document against its persisted predecessor,
    /// retrying the store round-trip up to [`MAX_ATTEMPTS`] times (§4.6, §5).
    async fn save_with_retry(&self, document: HistoricDocument<P>, crawl_id: &str) -> Result<(bool, usize, Map<String, Value>, f64)> {
        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.save_once(document.clone(), crawl_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(target: TARGET, attempt, error = %err, "data storage save attempt failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::new(ErrorKind::Store, "data storage save exhausted retries")))
    }

    async fn save_once(&self, document: HistoricDocument<P>, crawl_id: &str) -> Result<(bool, usize, Map<String, Value>, f64)> {
        let primary_key = document.payload.primary_key();
        let persisted = self.store.get(&primary_key).await?;
        let weight = document.payload.weight();
        let (merged, is_new, changes, metrics) = document.merge_and_witness(persisted, crawl_id, Timestamp::now());
        self.store.put(merged).await?;
        Ok((is_new, changes, metrics, weight))
    }
}

#[async_trait::async_trait]
impl<P, F, S> super::Pipeline for DataStoragePipeline<P, F, S>
where
    P: HistoricPayload + Send + Sync + 'static,
    F: DocumentFactory<P> + Send + Sync,
    S: DataStore<P>,
{
    fn name(&self) -> &str {
        NAME
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, request_result), fields(crawl_id)))]
    async fn run(&self, request_result: &RequestResult, crawl_id: &str) -> Result<PipelineResult> {
        let mut statistics = Map::new();
        for key in ["new_documents", "updated_documents", "processed_documents", "total_changes"] {
            statistics.insert(key.to_string(), Value::from(0.0));
        }
        let mut metrics = Map::new();
        let mut total_weight = 0.0;

        for raw in request_result.records() {
            let payload = self.factory.build(&self.document_type, raw)?;
            let document = HistoricDocument::observed(payload);
            let (is_new, changes, doc_metrics, weight) = self.save_with_retry(document, crawl_id).await?;

            add_statistic(&mut statistics, "processed_documents", 1.0);
            if is_new {
                add_statistic(&mut statistics, "new_documents", 1.0);
            }
            if changes > 0 {
                add_statistic(&mut statistics, "updated_documents", 1.0);
            }
            add_statistic(&mut statistics, "total_changes", changes as f64);
            total_weight += weight;

            for (key, value) in &doc_metrics {
                if let Some(value) = value.as_f64() {
                    add_metric(&mut metrics, key, value);
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: TARGET,
            processed = statistics.get("processed_documents").and_then(Value::as_f64).unwrap_or(0.0),
            "data storage pipeline step complete"
        );

        Ok(PipelineResult {
            weight: Some(total_weight),
            statistics,
            metrics,
        })
    }
}

#[cfg(test)]
mod test {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use kraken_core::store::memory::InMemoryDataStore;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Detail {
        app_id: String,
        title: String,
    }

    impl HistoricPayload for Detail {
        fn primary_key(&self) -> String {
            self.app_id.clone()
        }

        fn weight(&self) -> f64 {
            1.0
        }
    }

    struct DetailFactory;

    impl DocumentFactory<Detail> for DetailFactory {
        fn build(&self, document_type: &str, raw: Value) -> Result<Detail> {
            if document_type != "detail" {
                return Err(Error::new(ErrorKind::Validation, "unknown document type"));
            }
            serde_json::from_value(raw).map_err(Error::from)
        }
    }

    fn request_result(records: Vec<Value>) -> RequestResult {
        RequestResult {
            result: Value::Array(records),
            subsequent_kwargs: None,
            batch: true,
            gain: 1.0,
            cost: 1.0,
            target_not_found: false,
            target_exhausted: None,
            adjacent_targets: None,
        }
    }

    #[tokio::test]
    async fn first_save_counts_as_new_document() {
        let store = Arc::new(InMemoryDataStore::<Detail>::new());
        let pipeline = DataStoragePipeline::new("detail", DetailFactory, store);

        let result = request_result(vec![json!({"app_id": "a", "title": "X"})]);
        let outcome = super::super::Pipeline::run(&pipeline, &result, "c1").await.unwrap();

        assert_eq!(outcome.statistics["new_documents"], json!(1.0));
        assert_eq!(outcome.statistics["processed_documents"], json!(1.0));
        assert_eq!(outcome.weight, Some(1.0));
        assert_eq!(outcome.metrics["bfm"], json!(1.0));
    }

    #[tokio::test]
    async fn reobservation_accumulates_across_records() {
        let store = Arc::new(InMemoryDataStore::<Detail>::new());
        let pipeline = DataStoragePipeline::new("detail", DetailFactory, store);

        let first = request_result(vec![json!({"app_id": "a", "title": "X"})]);
        super::super::Pipeline::run(&pipeline, &first, "c1").await.unwrap();

        let second = request_result(vec![json!({"app_id": "a", "title": "Y"})]);
        let outcome = super::super::Pipeline::run(&pipeline, &second, "c2").await.unwrap();

        assert_eq!(outcome.statistics["updated_documents"], json!(1.0));
        assert_eq!(outcome.statistics["total_changes"], json!(1.0));
        assert_eq!(outcome.statistics["new_documents"], json!(0.0));
    }
}
