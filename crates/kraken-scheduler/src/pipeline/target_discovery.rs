//! The Target Discovery Pipeline (§4.7): turns a request's `adjacent_targets`
//! into newly discovered, uniqueness-enforced [`Target`](kraken_core::types::Target)s.

use std::sync::Arc;

use serde_json::{Map, Value};

use kraken_core::store::MetadataStore;
use kraken_core::types::{PipelineResult, RequestResult, SlimTarget, Target, Timestamp};
use kraken_core::{ErrorKind, Result};

#[cfg(feature = "tracing")]
const TARGET: &str = "kraken_scheduler::pipeline::target_discovery";

/// Default pipeline name, matching the routing prefix recognised by
/// [`kraken_core::dispatch::TaskRoutes`].
pub const NAME: &str = "pipeline.target_discovery";

/// Discovers targets from the `adjacent_targets` of a [`RequestResult`],
/// merging each against a list of `target_defaults` before insertion.
pub struct TargetDiscoveryPipeline<M> {
    discovered_by: String,
    target_defaults: Vec<SlimTarget>,
    store: Arc<M>,
}

impl<M: MetadataStore> TargetDiscoveryPipeline<M> {
    /// Creates a pipeline crediting discoveries to `discovered_by` (a Crawl id),
    /// merging each adjacent target against every entry in `target_defaults`
    /// (an empty list behaves as a single empty default, i.e. adjacent targets
    /// are inserted as-is).
    #[must_use]
    pub fn new(discovered_by: impl Into<String>, target_defaults: Vec<SlimTarget>, store: Arc<M>) -> Self {
        Self {
            discovered_by: discovered_by.into(),
            target_defaults,
            store,
        }
    }

    fn defaults(&self) -> Vec<SlimTarget> {
        if self.target_defaults.is_empty() {
            vec![SlimTarget::default()]
        } else {
            self.target_defaults.clone()
        }
    }
}

#[async_trait::async_trait]
impl<M: MetadataStore> super::Pipeline for TargetDiscoveryPipeline<M> {
    fn name(&self) -> &str {
        NAME
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, request_result), fields(crawl_id)))]
    async fn run(&self, request_result: &RequestResult, _crawl_id: &str) -> Result<PipelineResult> {
        let adjacent = request_result.deduplicated_adjacent_targets();
        let defaults = self.defaults();
        let checked_targets = (adjacent.len() * defaults.len()) as f64;

        let mut new_targets = 0.0;
        for candidate in &adjacent {
            for default in &defaults {
                let merged = SlimTarget::merge(default, candidate)?;
                let mut target = Target::new(merged.kwargs);
                target.tags = merged.tags;
                target.discovered_by = Some(self.discovered_by.clone());
                target.discovered_at = Timestamp::now();

                match self.store.insert_target(target.clone()).await {
                    Ok(_) => new_targets += 1.0,
                    Err(err) if err.kind() == ErrorKind::UniquenessRace => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(target: TARGET, "uniqueness race, falling back to force_insert");
                        if self.store.force_insert_target(target).await? {
                            new_targets += 1.0;
                        }
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(target: TARGET, new_targets, checked_targets, "target discovery pipeline step complete");

        let mut statistics = Map::new();
        statistics.insert("new_targets".to_string(), Value::from(new_targets));
        statistics.insert("checked_targets".to_string(), Value::from(checked_targets));

        Ok(PipelineResult {
            weight: None,
            statistics,
            metrics: Map::new(),
        })
    }
}
