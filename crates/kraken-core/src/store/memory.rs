//! In-memory fakes for [`MetadataStore`] and [`DataStore`], analogous to the
//! teacher crate's `InMemDataset` (§10.5): used in tests, doctests and the
//! `kraken-cli daemon` command when no real store is wired up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::data::DataStore;
use super::metadata::{MetadataStore, StatisticsUpdate};
use crate::types::{Crawl, ExecutionToken, HistoricDocument, HistoricPayload, Series, Target, TargetFilter, Timestamp};
use crate::{Error, ErrorKind, Result};

fn kwargs_key(kwargs: &Map<String, Value>) -> String {
    serde_json::to_string(kwargs).unwrap_or_default()
}

#[derive(Default)]
struct MetadataState {
    targets: HashMap<String, Target>,
    target_ids_by_kwargs: HashMap<String, String>,
    series: HashMap<String, Series>,
    crawls: HashMap<String, Crawl>,
    tokens: HashMap<String, ExecutionToken>,
}

/// An in-memory [`MetadataStore`], backed by a single [`Mutex`].
///
/// Suitable for tests and single-process demos; not a substitute for a real
/// document store's durability or cross-process uniqueness enforcement.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    state: Mutex<MetadataState>,
    next_id: AtomicU64,
}

impl InMemoryMetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("id-{n}")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetadataState> {
        self.state.lock().expect("InMemoryMetadataStore mutex poisoned")
    }

    /// Exports a serialisable snapshot of every Target, Series, Crawl and
    /// ExecutionToken currently held, for on-disk persistence between
    /// `kraken-cli` invocations (§10.4) — the in-memory store itself has no
    /// durability of its own.
    #[must_use]
    pub fn snapshot(&self) -> MetadataSnapshot {
        let state = self.lock();
        MetadataSnapshot {
            targets: state.targets.values().cloned().collect(),
            series: state.series.values().cloned().collect(),
            crawls: state.crawls.values().cloned().collect(),
            tokens: state.tokens.values().cloned().collect(),
            next_id: self.next_id.load(Ordering::SeqCst),
        }
    }

    /// Rebuilds a store from a [`MetadataSnapshot`] produced by [`Self::snapshot`].
    #[must_use]
    pub fn from_snapshot(snapshot: MetadataSnapshot) -> Self {
        let mut targets = HashMap::new();
        let mut target_ids_by_kwargs = HashMap::new();
        for target in snapshot.targets {
            if let Some(id) = target.id.clone() {
                target_ids_by_kwargs.insert(kwargs_key(&target.kwargs), id.clone());
                targets.insert(id, target);
            }
        }
        let series = snapshot.series.into_iter().map(|s| (s.id.clone(), s)).collect();
        let crawls = snapshot.crawls.into_iter().map(|c| (c.id.clone(), c)).collect();
        let tokens = snapshot.tokens.into_iter().map(|t| (t.id.clone(), t)).collect();

        Self {
            state: Mutex::new(MetadataState {
                targets,
                target_ids_by_kwargs,
                series,
                crawls,
                tokens,
            }),
            next_id: AtomicU64::new(snapshot.next_id),
        }
    }
}

/// A serialisable dump of [`InMemoryMetadataStore`]'s full state, produced by
/// [`InMemoryMetadataStore::snapshot`] and consumed by [`InMemoryMetadataStore::from_snapshot`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub targets: Vec<Target>,
    pub series: Vec<Series>,
    pub crawls: Vec<Crawl>,
    pub tokens: Vec<ExecutionToken>,
    #[serde(default)]
    pub next_id: u64,
}

#[async_trait::async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert_target(&self, mut target: Target) -> Result<Target> {
        let mut state = self.lock();
        let key = kwargs_key(&target.kwargs);
        if state.target_ids_by_kwargs.contains_key(&key) {
            return Err(Error::new(
                ErrorKind::UniquenessRace,
                "target with these kwargs already exists",
            ));
        }
        let id = target.id.clone().unwrap_or_else(|| self.next_id());
        target.id = Some(id.clone());
        state.target_ids_by_kwargs.insert(key, id.clone());
        state.targets.insert(id, target.clone());
        Ok(target)
    }

    async fn force_insert_target(&self, mut target: Target) -> Result<bool> {
        let mut state = self.lock();
        let key = kwargs_key(&target.kwargs);
        if state.target_ids_by_kwargs.contains_key(&key) {
            return Ok(false);
        }
        let id = target.id.clone().unwrap_or_else(|| self.next_id());
        target.id = Some(id.clone());
        state.target_ids_by_kwargs.insert(key, id.clone());
        state.targets.insert(id, target);
        Ok(true)
    }

    async fn get_target(&self, id: &str) -> Result<Option<Target>> {
        Ok(self.lock().targets.get(id).cloned())
    }

    async fn find_target_by_kwargs(&self, kwargs: &Map<String, Value>) -> Result<Option<Target>> {
        let state = self.lock();
        let key = kwargs_key(kwargs);
        Ok(state
            .target_ids_by_kwargs
            .get(&key)
            .and_then(|id| state.targets.get(id))
            .cloned())
    }

    async fn upsert_target_tags(&self, id: &str, tags: std::collections::BTreeSet<String>) -> Result<()> {
        let mut state = self.lock();
        let target = state
            .targets
            .get_mut(id)
            .ok_or_else(|| Error::new(ErrorKind::Store, "target not found"))?;
        target.tags.extend(tags);
        Ok(())
    }

    async fn targets_matching(&self, filter: &TargetFilter) -> Result<Vec<Target>> {
        Ok(self
            .lock()
            .targets
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn mark_target_queued(&self, id: &str, series_id: &str, timestamp: Timestamp) -> Result<()> {
        let mut state = self.lock();
        let target = state
            .targets
            .get_mut(id)
            .ok_or_else(|| Error::new(ErrorKind::Store, "target not found"))?;
        target.mark_queued(series_id, timestamp);
        Ok(())
    }

    async fn mark_target_processed(&self, id: &str, series_id: &str, timestamp: Timestamp) -> Result<()> {
        let mut state = self.lock();
        let target = state
            .targets
            .get_mut(id)
            .ok_or_else(|| Error::new(ErrorKind::Store, "target not found"))?;
        target.mark_processed(series_id, timestamp);
        Ok(())
    }

    async fn record_target_statistics(
        &self,
        id: &str,
        series_id: &str,
        stage_name: &str,
        update: StatisticsUpdate,
    ) -> Result<()> {
        let mut state = self.lock();
        let target = state
            .targets
            .get_mut(id)
            .ok_or_else(|| Error::new(ErrorKind::Store, "target not found"))?;
        let stats = target.statistics_mut(series_id, stage_name);
        stats.record(
            Timestamp::now(),
            update.cost,
            update.gain,
            update.weight,
            update.metrics,
            update.result,
        );
        Ok(())
    }

    async fn get_series(&self, id: &str) -> Result<Option<Series>> {
        Ok(self.lock().series.get(id).cloned())
    }

    async fn insert_series(&self, series: Series) -> Result<()> {
        self.lock().series.insert(series.id.clone(), series);
        Ok(())
    }

    async fn new_crawl(&self, series_id: &str, crawl_id: String) -> Result<Crawl> {
        let mut state = self.lock();
        let series = state
            .series
            .get_mut(series_id)
            .ok_or_else(|| Error::new(ErrorKind::Store, "series not found"))?;
        let crawl = series.new_crawl(crawl_id);
        state.crawls.insert(crawl.id.clone(), crawl.clone());
        Ok(crawl)
    }

    async fn get_crawl(&self, id: &str) -> Result<Option<Crawl>> {
        Ok(self.lock().crawls.get(id).cloned())
    }

    async fn record_crawl_scheduled(
        &self,
        id: &str,
        count: u64,
        expectations: &HashMap<String, Map<String, Value>>,
    ) -> Result<()> {
        let mut state = self.lock();
        let crawl = state
            .crawls
            .get_mut(id)
            .ok_or_else(|| Error::new(ErrorKind::Store, "crawl not found"))?;
        crawl.record_scheduled(count, expectations);
        Ok(())
    }

    async fn record_crawl_target_finished(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let crawl = state
            .crawls
            .get_mut(id)
            .ok_or_else(|| Error::new(ErrorKind::Store, "crawl not found"))?;
        crawl.record_finished();
        Ok(())
    }

    async fn record_crawl_target_failed(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let crawl = state
            .crawls
            .get_mut(id)
            .ok_or_else(|| Error::new(ErrorKind::Store, "crawl not found"))?;
        crawl.record_failed();
        Ok(())
    }

    async fn record_crawl_target_retried(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let crawl = state
            .crawls
            .get_mut(id)
            .ok_or_else(|| Error::new(ErrorKind::Store, "crawl not found"))?;
        crawl.record_retried();
        Ok(())
    }

    async fn mark_crawl_finished(&self, id: &str, timestamp: Timestamp) -> Result<()> {
        let mut state = self.lock();
        let crawl = state
            .crawls
            .get_mut(id)
            .ok_or_else(|| Error::new(ErrorKind::Store, "crawl not found"))?;
        crawl.mark_finished(timestamp);
        Ok(())
    }

    async fn put_execution_token(&self, token: ExecutionToken) -> Result<()> {
        self.lock().tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn get_execution_token(&self, id: &str) -> Result<Option<ExecutionToken>> {
        Ok(self.lock().tokens.get(id).cloned())
    }

    async fn remove_execution_token(&self, id: &str) -> Result<()> {
        self.lock().tokens.remove(id);
        Ok(())
    }

    async fn all_execution_tokens(&self) -> Result<Vec<ExecutionToken>> {
        Ok(self.lock().tokens.values().cloned().collect())
    }
}

/// An in-memory [`DataStore`] for one payload type `P`, backed by a single [`Mutex`].
pub struct InMemoryDataStore<P> {
    documents: Mutex<HashMap<String, HistoricDocument<P>>>,
}

impl<P> Default for InMemoryDataStore<P> {
    fn default() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
        }
    }
}

impl<P> InMemoryDataStore<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl<P: HistoricPayload + Send + Sync + 'static> DataStore<P> for InMemoryDataStore<P> {
    async fn get(&self, primary_key: &str) -> Result<Option<HistoricDocument<P>>> {
        let documents = self.documents.lock().expect("InMemoryDataStore mutex poisoned");
        Ok(documents.get(primary_key).cloned())
    }

    async fn put(&self, document: HistoricDocument<P>) -> Result<()> {
        let mut documents = self.documents.lock().expect("InMemoryDataStore mutex poisoned");
        documents.insert(document.payload.primary_key(), document);
        Ok(())
    }
}
