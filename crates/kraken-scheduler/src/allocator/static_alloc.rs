//! The Static allocator (§4.10): drain-once, `step_size`-batched.

use std::sync::Arc;

use kraken_core::store::MetadataStore;
use kraken_core::types::{Crawl, Target};
use kraken_core::Result;

use super::ResourceAllocator;

#[cfg(feature = "tracing")]
const TARGET: &str = "kraken_scheduler::allocator::static_alloc";

/// Emits up to `step_size` targets per batch, preferring those never queued
/// under this Crawl's series, oldest `last_queued` first. Terminates (returns
/// an empty batch) once every eligible target has been queued past
/// `crawl.started`.
pub struct StaticAllocator<M> {
    store: Arc<M>,
    step_size: usize,
}

impl<M: MetadataStore> StaticAllocator<M> {
    #[must_use]
    pub fn new(store: Arc<M>, step_size: usize) -> Self {
        Self { store, step_size }
    }
}

#[async_trait::async_trait]
impl<M: MetadataStore> ResourceAllocator for StaticAllocator<M> {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, crawl), fields(crawl = %crawl.name)))]
    async fn next_batch(&mut self, crawl: &Crawl, series_id: &str) -> Result<Vec<Target>> {
        let mut eligible: Vec<Target> = self
            .store
            .targets_matching(&crawl.filter)
            .await?
            .into_iter()
            .filter(|target| match target.last_queued(series_id) {
                None => true,
                Some(last) => last < crawl.started,
            })
            .collect();

        eligible.sort_by_key(|target| target.last_queued(series_id));
        eligible.truncate(self.step_size);

        #[cfg(feature = "tracing")]
        tracing::debug!(target: TARGET, batch_size = eligible.len(), "drained static batch");

        Ok(eligible)
    }

    fn queue_key(&self, _crawl: &Crawl, series_id: &str) -> String {
        series_id.to_string()
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use kraken_core::store::memory::InMemoryMetadataStore;
    use kraken_core::types::{Timestamp, TargetFilter};

    async fn seeded_store(count: usize) -> Arc<InMemoryMetadataStore> {
        let store = Arc::new(InMemoryMetadataStore::new());
        for i in 0..count {
            store
                .insert_target(Target::new(json!({"app_id": format!("a{i}")}).as_object().unwrap().clone()))
                .await
                .unwrap();
        }
        store
    }

    fn crawl() -> Crawl {
        Crawl::new("c1", "s1", "nightly", 1, Vec::new(), TargetFilter::All)
    }

    #[tokio::test]
    async fn s5_drains_in_step_size_batches_then_terminates() {
        let store = seeded_store(3).await;
        let crawl = crawl();
        let mut allocator = StaticAllocator::new(store.clone(), 2);

        let first = allocator.next_batch(&crawl, "s1").await.unwrap();
        assert_eq!(first.len(), 2);
        for target in &first {
            store.mark_target_queued(target.id.as_ref().unwrap(), "s1", Timestamp::now()).await.unwrap();
        }

        let second = allocator.next_batch(&crawl, "s1").await.unwrap();
        assert_eq!(second.len(), 1);
        store.mark_target_queued(second[0].id.as_ref().unwrap(), "s1", Timestamp::now()).await.unwrap();

        let third = allocator.next_batch(&crawl, "s1").await.unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn queue_key_is_series_scoped() {
        let store = seeded_store(0).await;
        let allocator = StaticAllocator::new(store, 5);
        assert_eq!(allocator.queue_key(&crawl(), "s1"), "s1");
    }
}
