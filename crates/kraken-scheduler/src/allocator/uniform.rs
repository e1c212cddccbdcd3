//! The Uniform allocator (§4.10): continuous, weight-bucketed.

use std::sync::Arc;

use kraken_core::store::MetadataStore;
use kraken_core::types::{Bucket, Crawl, Target, TargetFilter};
use kraken_core::util::join_store_path;
use kraken_core::Result;

use super::ResourceAllocator;

#[cfg(feature = "tracing")]
const TARGET: &str = "kraken_scheduler::allocator::uniform";

const DEFAULT_BUCKET_COUNT: usize = 64;

/// Shared bucketed-allocation state, reused by [`UniformAllocator`] and
/// [`super::ProportionalAllocator`]: both run the same recompute/step outer
/// loop and differ only in how a target's weight is read (§4.10).
pub(super) struct BucketedAllocator<M> {
    store: Arc<M>,
    weight_path: String,
    step_size: usize,
    bucket_ttl: u64,
    min_allocation: usize,
    boundaries: Vec<f64>,
    importance_factors: Vec<f64>,
    buckets: Vec<Bucket>,
    step_count: u64,
}

impl<M: MetadataStore> BucketedAllocator<M> {
    pub(super) fn new(store: Arc<M>, weight_path: String, step_size: usize, bucket_ttl: u64, min_allocation: usize) -> Self {
        Self {
            store,
            weight_path,
            step_size,
            bucket_ttl,
            min_allocation,
            boundaries: Bucket::default_boundaries(DEFAULT_BUCKET_COUNT),
            importance_factors: Bucket::default_importance_factors(DEFAULT_BUCKET_COUNT),
            buckets: Vec::new(),
            step_count: 0,
        }
    }

    /// Recomputes bucket boundaries from `boundaries`/`importance_factors`
    /// against the full population matching `filter` (§4.10 step 1-2).
    ///
    /// Forms one bucket per pair of adjacent `boundaries` entries (the last
    /// bucket is open-ended), then discards the first — it covers
    /// `[boundaries[0], boundaries[1])`, i.e. targets with no weight yet.
    async fn recompute(&mut self, filter: &TargetFilter, weigh: impl Fn(&Target) -> Option<f64>) -> Result<()> {
        let population = self.store.targets_matching(filter).await?;

        let mut buckets = Vec::with_capacity(self.boundaries.len());
        for (i, &lower) in self.boundaries.iter().enumerate() {
            let upper = self.boundaries.get(i + 1).copied().unwrap_or(f64::INFINITY);
            let importance_factor = self.importance_factors.get(i + 1).copied().unwrap_or(1.0);
            let absolute_size = population
                .iter()
                .filter(|target| weigh(target).is_some_and(|w| w >= lower && w < upper))
                .count() as u64;
            buckets.push(Bucket::new(self.weight_path.clone(), lower, upper, absolute_size, importance_factor, TargetFilter::All));
        }

        if !buckets.is_empty() {
            buckets.remove(0);
        }
        Bucket::normalise_all(&mut buckets)?;
        self.buckets = buckets;

        #[cfg(feature = "tracing")]
        tracing::debug!(target: TARGET, bucket_count = self.buckets.len(), "recomputed buckets");

        Ok(())
    }

    /// Runs one step of the outer allocation loop (§4.10 steps 1-4).
    pub(super) async fn step(&mut self, crawl: &Crawl, series_id: &str, weigh: impl Fn(&Target) -> Option<f64> + Copy) -> Result<Vec<Target>> {
        if self.buckets.is_empty() || self.step_count % self.bucket_ttl.max(1) == 0 {
            self.recompute(&crawl.filter, weigh).await?;
        }
        self.step_count += 1;

        let population = self.store.targets_matching(&crawl.filter).await?;
        let mut batch = Vec::new();

        for bucket in &self.buckets {
            let allocated = bucket.allocated_resources.unwrap_or(0.0);
            let quota = ((self.step_size as f64) * allocated).round() as usize;
            let quota = quota.max(self.min_allocation);

            let mut eligible: Vec<&Target> = population
                .iter()
                .filter(|target| weigh(target).is_some_and(|w| bucket.contains(w)))
                .collect();

            eligible.sort_by_key(|target| (target.was_queued(series_id), target.last_queued(series_id)));
            eligible.truncate(quota);
            batch.extend(eligible.into_iter().cloned());
        }

        Ok(batch)
    }

    pub(super) fn queue_key(&self, crawl: &Crawl) -> String {
        crawl.name.clone()
    }
}

/// Buckets the target population by a statistics `weight` field
/// (`statistics[series_id][stage_name].weight`), recomputing bucket shares
/// every `bucket_ttl` steps (§4.10).
pub struct UniformAllocator<M> {
    inner: BucketedAllocator<M>,
    weight_series_id: String,
    weight_stage_name: String,
}

impl<M: MetadataStore> UniformAllocator<M> {
    #[must_use]
    pub fn new(
        store: Arc<M>,
        weight_series_id: impl Into<String>,
        weight_stage_name: impl Into<String>,
        step_size: usize,
        bucket_ttl: u64,
        min_allocation: usize,
    ) -> Self {
        let weight_series_id = weight_series_id.into();
        let weight_stage_name = weight_stage_name.into();
        let weight_path = join_store_path(["statistics", &weight_series_id, &weight_stage_name, "weight"]);
        Self {
            inner: BucketedAllocator::new(store, weight_path, step_size, bucket_ttl, min_allocation),
            weight_series_id,
            weight_stage_name,
        }
    }
}

#[async_trait::async_trait]
impl<M: MetadataStore> ResourceAllocator for UniformAllocator<M> {
    async fn next_batch(&mut self, crawl: &Crawl, series_id: &str) -> Result<Vec<Target>> {
        let weight_series_id = self.weight_series_id.clone();
        let weight_stage_name = self.weight_stage_name.clone();
        self.inner
            .step(crawl, series_id, move |target: &Target| {
                target
                    .latest_statistics(&weight_series_id, &weight_stage_name)
                    .get("weight")
                    .and_then(serde_json::Value::as_f64)
            })
            .await
    }

    fn queue_key(&self, crawl: &Crawl, _series_id: &str) -> String {
        self.inner.queue_key(crawl)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use kraken_core::store::memory::InMemoryMetadataStore;

    fn crawl() -> Crawl {
        Crawl::new("c1", "s1", "nightly", 1, Vec::new(), TargetFilter::All)
    }

    async fn target_with_weight(store: &InMemoryMetadataStore, app_id: &str, weight: f64) -> Target {
        let target = store
            .insert_target(Target::new(json!({"app_id": app_id}).as_object().unwrap().clone()))
            .await
            .unwrap();
        let id = target.id.clone().unwrap();
        store
            .record_target_statistics(
                &id,
                "s1",
                "detail",
                kraken_core::store::StatisticsUpdate {
                    cost: 0.0,
                    gain: 0.0,
                    weight: Some(weight),
                    metrics: Default::default(),
                    result: None,
                },
            )
            .await
            .unwrap();
        store.get_target(&id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn discards_the_unweighted_bucket() {
        let store = Arc::new(InMemoryMetadataStore::new());
        target_with_weight(&store, "zero", 0.0).await;
        target_with_weight(&store, "heavy", 50.0).await;

        let mut allocator = UniformAllocator::new(store, "s1", "detail", 10, 1, 0);
        let batch = allocator.next_batch(&crawl(), "s1").await.unwrap();

        assert!(batch.iter().all(|t| t.kwargs["app_id"] != json!("zero")));
    }

    #[tokio::test]
    async fn queue_key_is_crawl_scoped() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let allocator = UniformAllocator::new(store, "s1", "detail", 10, 1, 0);
        assert_eq!(allocator.queue_key(&crawl(), "s1"), "nightly_1");
    }
}
