//! The Crawl Monitor callback (§4.9, §10.6): a best-effort companion to the
//! Target Monitor, present in the original deployment's `crawl_monitor_callback`
//! but omitted from the distilled component list. Wired the same way — attach
//! it to the *last* stage's `callbacks` so it only fires once a target's full
//! pipeline has completed.

use std::sync::Arc;

use kraken_core::store::MetadataStore;
use kraken_core::Result;

#[cfg(feature = "tracing")]
const TARGET: &str = "kraken_scheduler::callback::crawl_monitor";

/// Default callback name, matching the routing prefix recognised by
/// [`kraken_core::dispatch::TaskRoutes`].
pub const NAME: &str = "callback.crawl_monitor";

/// Increments `crawl.targets_finished` and releases the target's execution
/// token once its final stage completes.
///
/// The failure path (`targets_failed`, token transition to `Failed`) is
/// driven directly by the Crawl Task rather than this callback, since §4.4
/// step 3 only runs callbacks after a stage completes normally.
pub struct CrawlMonitorCallback<M> {
    store: Arc<M>,
    execution_token_id: String,
}

impl<M: MetadataStore> CrawlMonitorCallback<M> {
    #[must_use]
    pub fn new(store: Arc<M>, execution_token_id: impl Into<String>) -> Self {
        Self {
            store,
            execution_token_id: execution_token_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl<M: MetadataStore> super::Callback for CrawlMonitorCallback<M> {
    fn name(&self) -> &str {
        NAME
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, cx), fields(crawl_id = cx.crawl_id)))]
    async fn run(&self, cx: &super::CallbackContext<'_>) -> Result<()> {
        self.store.record_crawl_target_finished(cx.crawl_id).await?;
        self.store.remove_execution_token(&self.execution_token_id).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(target: TARGET, token = %self.execution_token_id, "crawl monitor released execution token");

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::callback::{Callback, CallbackContext};
    use kraken_core::store::memory::InMemoryMetadataStore;
    use kraken_core::types::{ExecutionToken, SlimTarget, StageResult, TargetFilter};

    #[tokio::test]
    async fn records_finished_and_removes_token() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store
            .insert_series(kraken_core::types::Series::new("s1", "nightly", Vec::new(), TargetFilter::All))
            .await
            .unwrap();
        let crawl = store.new_crawl("s1", "c1".to_string()).await.unwrap();
        store.put_execution_token(ExecutionToken::new("tok1", crawl.id.clone(), Vec::new())).await.unwrap();

        let callback = CrawlMonitorCallback::new(store.clone(), "tok1");
        let target = SlimTarget::new(json!({"app_id": "a"}).as_object().unwrap().clone());
        let progress = StageResult::default();
        let cx = CallbackContext {
            crawl_id: &crawl.id,
            series_id: "s1",
            stage_name: "detail",
            target: &target,
            progress: &progress,
        };

        callback.run(&cx).await.unwrap();

        let updated = store.get_crawl(&crawl.id).await.unwrap().unwrap();
        assert_eq!(updated.targets_finished, 1);
        assert!(store.get_execution_token("tok1").await.unwrap().is_none());
    }
}
