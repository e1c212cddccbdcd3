use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};

use crate::types::{Crawl, ExecutionToken, Series, Target, TargetFilter, Timestamp};
use crate::Result;

/// A single Target Monitor flush (§4.9): the current values set on a
/// `(series, stage)` statistics bundle, each also appended to its history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsUpdate {
    pub cost: f64,
    pub gain: f64,
    pub weight: Option<f64>,
    pub metrics: Map<String, Value>,
    pub result: Option<Value>,
}

/// The Metadata Store collaborator (§1, §6): owns Targets, Series, Crawls and
/// ExecutionTokens.
///
/// Every mutation here models a single atomic, store-level field operator
/// (increment, push, set-by-path) rather than a client-side read-modify-write
/// (§5, §9) — concrete implementations against a real document store should
/// issue one such operator per call, not a fetch-mutate-save round trip.
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// Inserts `target`, enforcing the `kwargs` uniqueness constraint (§3, §6).
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::UniquenessRace`] if a target with the same
    /// `kwargs` already exists.
    async fn insert_target(&self, target: Target) -> Result<Target>;

    /// Inserts `target` only if no target with the same `kwargs` exists yet,
    /// silently skipping otherwise. Returns whether the insert happened.
    ///
    /// Used by the Target Discovery Pipeline's uniqueness-race recovery path
    /// (§4.7): never errors on a collision, so the caller always counts
    /// inserted discoveries without dropping the crawl's progress.
    async fn force_insert_target(&self, target: Target) -> Result<bool>;

    /// Looks up a target by its store id.
    async fn get_target(&self, id: &str) -> Result<Option<Target>>;

    /// Looks up a target by its identity (`kwargs`).
    async fn find_target_by_kwargs(&self, kwargs: &Map<String, Value>) -> Result<Option<Target>>;

    /// Unions `tags` into the given target's tag set.
    ///
    /// Used by `kraken-cli setup-targets --upsert_tags` (§6) to merge tags
    /// into a target that already exists, instead of erroring.
    async fn upsert_target_tags(&self, id: &str, tags: BTreeSet<String>) -> Result<()>;

    /// Returns every target matching `filter`, in unspecified order; callers
    /// needing a specific ordering (e.g. by `last_queued`) sort client-side.
    async fn targets_matching(&self, filter: &TargetFilter) -> Result<Vec<Target>>;

    /// Appends `timestamp` to `target.queued[series_id]`.
    async fn mark_target_queued(&self, id: &str, series_id: &str, timestamp: Timestamp) -> Result<()>;

    /// Appends `timestamp` to `target.processed[series_id]`.
    async fn mark_target_processed(&self, id: &str, series_id: &str, timestamp: Timestamp) -> Result<()>;

    /// Applies a Target Monitor flush to `(series_id, stage_name)`'s statistics
    /// bundle, setting current values and pushing to history (§4.9).
    async fn record_target_statistics(
        &self,
        id: &str,
        series_id: &str,
        stage_name: &str,
        update: StatisticsUpdate,
    ) -> Result<()>;

    /// Looks up a series by id.
    async fn get_series(&self, id: &str) -> Result<Option<Series>>;

    /// Inserts a new series.
    async fn insert_series(&self, series: Series) -> Result<()>;

    /// Starts the next crawl for `series_id`: increments `series.iterations`,
    /// builds and persists the `Crawl` snapshot, and records the back-ref (§3, §9).
    async fn new_crawl(&self, series_id: &str, crawl_id: String) -> Result<Crawl>;

    /// Looks up a crawl by id.
    async fn get_crawl(&self, id: &str) -> Result<Option<Crawl>>;

    /// Atomically increments `crawl.targets_scheduled` and merges `expectations` (§4.11).
    async fn record_crawl_scheduled(
        &self,
        id: &str,
        count: u64,
        expectations: &HashMap<String, Map<String, Value>>,
    ) -> Result<()>;

    /// Increments `crawl.targets_finished` (§4.9 Crawl Monitor).
    async fn record_crawl_target_finished(&self, id: &str) -> Result<()>;

    /// Increments `crawl.targets_failed` (§4.9 Crawl Monitor).
    async fn record_crawl_target_failed(&self, id: &str) -> Result<()>;

    /// Increments `crawl.targets_retried`.
    async fn record_crawl_target_retried(&self, id: &str) -> Result<()>;

    /// Sets `crawl.finished`.
    async fn mark_crawl_finished(&self, id: &str, timestamp: Timestamp) -> Result<()>;

    /// Creates or idempotently upserts an [`ExecutionToken`], keyed by its id (§4.2).
    async fn put_execution_token(&self, token: ExecutionToken) -> Result<()>;

    /// Looks up an execution token by id.
    async fn get_execution_token(&self, id: &str) -> Result<Option<ExecutionToken>>;

    /// Deletes an execution token, modelling the `REMOVED` collapse on success (§4.2).
    async fn remove_execution_token(&self, id: &str) -> Result<()>;

    /// Lists every execution token, for the lost-task monitor sweep (§4.2, §10.1).
    async fn all_execution_tokens(&self) -> Result<Vec<ExecutionToken>>;
}
