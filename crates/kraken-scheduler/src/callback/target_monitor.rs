//! The Target Monitor callback (§4.9): flushes a Stage's aggregated progress
//! onto the owning Target's `statistics[series_id][stage_name]` bundle.

use std::sync::Arc;

use kraken_core::store::{MetadataStore, StatisticsUpdate};
use kraken_core::types::Timestamp;
use kraken_core::{Error, ErrorKind, Result};

#[cfg(feature = "tracing")]
const TARGET: &str = "kraken_scheduler::callback::target_monitor";

/// Default callback name, matching the routing prefix recognised by
/// [`kraken_core::dispatch::TaskRoutes`].
pub const NAME: &str = "callback.target_monitor";

/// Flushes final stage progress onto the Target's statistics and `processed` timeline.
pub struct TargetMonitorCallback<M> {
    store: Arc<M>,
}

impl<M: MetadataStore> TargetMonitorCallback<M> {
    #[must_use]
    pub fn new(store: Arc<M>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<M: MetadataStore> super::Callback for TargetMonitorCallback<M> {
    fn name(&self) -> &str {
        NAME
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, cx), fields(stage = cx.stage_name)))]
    async fn run(&self, cx: &super::CallbackContext<'_>) -> Result<()> {
        let target_id = cx
            .target
            .id
            .as_deref()
            .ok_or_else(|| Error::new(ErrorKind::Validation, "target monitor callback requires a target id"))?;

        let now = Timestamp::now();
        let update = StatisticsUpdate {
            cost: cx.progress.cost,
            gain: cx.progress.gain,
            weight: cx.progress.pipeline_results.values().filter_map(|r| r.weight).reduce(|a, b| a + b),
            metrics: cx
                .progress
                .pipeline_results
                .values()
                .flat_map(|r| r.metrics.clone())
                .collect(),
            result: None,
        };

        self.store
            .record_target_statistics(target_id, cx.series_id, cx.stage_name, update)
            .await?;
        self.store.mark_target_processed(target_id, cx.series_id, now).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(target: TARGET, target_id, "flushed target monitor statistics");

        Ok(())
    }
}
