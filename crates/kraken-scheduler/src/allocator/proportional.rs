//! The Proportional allocator (§4.10): same bucketed outer loop as
//! [`super::UniformAllocator`], weighted by a caller-supplied function
//! instead of a fixed statistics path.

use std::sync::Arc;

use kraken_core::store::MetadataStore;
use kraken_core::types::{Crawl, Target};
use kraken_core::Result;

use super::uniform::BucketedAllocator;
use super::ResourceAllocator;

/// A target-weighing function, e.g. a caller's own scoring model.
pub type WeightFn = Arc<dyn Fn(&Target) -> Option<f64> + Send + Sync>;

/// Buckets the target population by a caller-supplied weighing function
/// rather than a fixed `statistics` path.
pub struct ProportionalAllocator<M> {
    inner: BucketedAllocator<M>,
    weigh: WeightFn,
}

impl<M: MetadataStore> ProportionalAllocator<M> {
    #[must_use]
    pub fn new(store: Arc<M>, weight_label: impl Into<String>, weigh: WeightFn, step_size: usize, bucket_ttl: u64, min_allocation: usize) -> Self {
        Self {
            inner: BucketedAllocator::new(store, weight_label.into(), step_size, bucket_ttl, min_allocation),
            weigh,
        }
    }
}

#[async_trait::async_trait]
impl<M: MetadataStore> ResourceAllocator for ProportionalAllocator<M> {
    async fn next_batch(&mut self, crawl: &Crawl, series_id: &str) -> Result<Vec<Target>> {
        let weigh = self.weigh.clone();
        self.inner.step(crawl, series_id, move |target: &Target| weigh(target)).await
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
    use kraken_core::types::TargetFilter;

    fn crawl() -> Crawl {
        Crawl::new("c1", "s1", "nightly", 1, Vec::new(), TargetFilter::All)
    }

    #[tokio::test]
    async fn uses_caller_supplied_weighing_function() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store
            .insert_target(Target::new(json!({"app_id": "a", "priority": 10}).as_object().unwrap().clone()))
            .await
            .unwrap();
        store
            .insert_target(Target::new(json!({"app_id": "b", "priority": 0}).as_object().unwrap().clone()))
            .await
            .unwrap();

        let weigh: WeightFn = Arc::new(|target: &Target| target.kwargs.get("priority").and_then(serde_json::Value::as_f64));
        let mut allocator = ProportionalAllocator::new(store, "priority", weigh, 10, 1, 0);

        let batch = allocator.next_batch(&crawl(), "s1").await.unwrap();
        assert!(batch.iter().any(|t| t.kwargs["app_id"] == json!("a")));
        assert!(batch.iter().all(|t| t.kwargs["app_id"] != json!("b")));
    }
}
