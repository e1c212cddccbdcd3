//! The Scheduler (C8, §4.11): paces allocator output into submissions,
//! enforcing backpressure via `step_period` and updating aggregate counters
//! and expectations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use kraken_core::dispatch::{TaskDispatcher, TaskSignature};
use kraken_core::store::MetadataStore;
use kraken_core::types::{Crawl, Timestamp};
use kraken_core::Result;

use crate::allocator::ResourceAllocator;
use crate::crawl_task::{TASK_MULTI_STAGE, TASK_SINGLE_STAGE};

#[cfg(feature = "tracing")]
const TARGET: &str = "kraken_scheduler::scheduler";

/// Whether the Scheduler submits every stage in one Crawl Task invocation
/// (`crawler.multi_stage`) or one invocation per stage (`crawler.single_stage`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    MultiStage,
    SingleStage,
}

/// Paces a single Crawl's submissions (§4.11).
///
/// `step_size`/`step_period` bound the submission rate; a finite broker queue
/// and the pacing loop together provide backpressure (§4.11, §5) — the
/// Scheduler never blocks on a submitted task's completion.
pub struct Scheduler<A, D, M> {
    allocator: A,
    dispatcher: D,
    store: Arc<M>,
    series_id: String,
    step_period: Duration,
    dispatch_mode: DispatchMode,
    last_step: Option<Timestamp>,
    shutdown: CancellationToken,
}

impl<A, D, M> Scheduler<A, D, M>
where
    A: ResourceAllocator,
    D: TaskDispatcher,
    M: MetadataStore,
{
    #[must_use]
    pub fn new(allocator: A, dispatcher: D, store: Arc<M>, series_id: impl Into<String>, step_period: Duration, dispatch_mode: DispatchMode) -> Self {
        Self {
            allocator,
            dispatcher,
            store,
            series_id: series_id.into(),
            step_period,
            dispatch_mode,
            last_step: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns a clone of this Scheduler's shutdown token.
    ///
    /// Cancelling it requests a graceful drain: [`Self::run`] finishes the
    /// in-flight step (submissions already dispatched are not recalled) and
    /// returns before pulling the next batch, rather than aborting mid-step.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the pacing loop to completion (§4.11 steps 1-5): pulls batches
    /// from the allocator, schedules each target, then paces via `_wait`
    /// until the allocator reports an empty batch or shutdown is requested.
    ///
    /// Continuous allocators (Uniform/Proportional) never empty on their own;
    /// callers wanting an unbounded Crawl should drive [`Self::step`] directly
    /// under their own operator-signal loop instead.
    pub async fn run(&mut self, crawl: &mut Crawl) -> Result<()> {
        loop {
            if self.shutdown.is_cancelled() {
                #[cfg(feature = "tracing")]
                tracing::info!(target: TARGET, crawl = %crawl.name, "shutdown requested, scheduler stopping");
                return Ok(());
            }

            let scheduled = self.step(crawl).await?;
            if scheduled == 0 {
                #[cfg(feature = "tracing")]
                tracing::info!(target: TARGET, crawl = %crawl.name, "allocator exhausted, scheduler stopping");
                return Ok(());
            }
        }
    }

    /// Runs exactly one scheduling step: pull a batch, submit it, pace, and
    /// return the number of targets scheduled (`0` signals allocator exhaustion).
    pub async fn step(&mut self, crawl: &mut Crawl) -> Result<usize> {
        let batch = self.allocator.next_batch(crawl, &self.series_id).await?;
        if batch.is_empty() {
            return Ok(0);
        }

        let now = Timestamp::now();
        let mut expectations: HashMap<String, serde_json::Map<String, serde_json::Value>> = HashMap::new();

        for target in &batch {
            let slim = target.slim();
            let stages: Vec<_> = crawl.stages.iter().map(|stage| stage.for_target(slim.clone())).collect();

            for stage in &stages {
                let expectation = target.latest_statistics(&self.series_id, &stage.name);
                let entry = expectations.entry(stage.name.clone()).or_default();
                *entry = kraken_core::util::add_json_maps(entry, &expectation);
            }

            let token_id = format!("tok_{}", uuid::Uuid::new_v4());
            let token = kraken_core::types::ExecutionToken::new(token_id, crawl.id.clone(), stages.clone());
            let token_id = token.id.clone();
            self.store.put_execution_token(token).await?;

            let signature = self.submission_signature(&crawl.id, &self.series_id, stages, &token_id);
            self.dispatcher.apply_async(signature).await?;

            let target_id = target.id.as_deref().unwrap_or_default();
            self.store.mark_target_queued(target_id, &self.series_id, now).await?;

            #[cfg(feature = "tracing")]
            tracing::trace!(target: TARGET, target_id, execution_token_id = %token_id, "scheduled target");
        }

        self.store.record_crawl_scheduled(&crawl.id, batch.len() as u64, &expectations).await?;
        crawl.record_scheduled(batch.len() as u64, &expectations);

        self.wait().await;

        Ok(batch.len())
    }

    fn submission_signature(&self, crawl_id: &str, series_id: &str, stages: Vec<kraken_core::types::Stage>, execution_token_id: &str) -> TaskSignature {
        let task_name = match self.dispatch_mode {
            DispatchMode::MultiStage => TASK_MULTI_STAGE,
            DispatchMode::SingleStage => TASK_SINGLE_STAGE,
        };
        let stages_value = serde_json::to_value(stages).unwrap_or(serde_json::Value::Null);
        TaskSignature::new(task_name)
            .with_kwarg("crawl_id", crawl_id)
            .with_kwarg("series_id", series_id)
            .with_kwarg("stages", stages_value)
            .with_kwarg("execution_token_id", execution_token_id)
    }

    /// Enforces `step_period` pacing (§4.11 step 4): sleeps until
    /// `last_step + step_period` has elapsed, or logs a *running slower than
    /// specified* warning and resets the clock if already past it.
    async fn wait(&mut self) {
        let now = Timestamp::now();
        match self.last_step {
            Some(last) if now.seconds_since(last) >= self.step_period.as_secs_f64() => {
                #[cfg(feature = "tracing")]
                tracing::warn!(target: TARGET, "scheduler running slower than specified step_period");
                self.last_step = Some(now);
            }
            Some(last) => {
                let remaining = self.step_period.as_secs_f64() - now.seconds_since(last);
                if remaining > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
                }
                self.last_step = Some(Timestamp::now());
            }
            None => {
                self.last_step = Some(now);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use kraken_core::dispatch::{TaskHandle, TaskSignature};
    use kraken_core::store::memory::InMemoryMetadataStore;
    use kraken_core::types::{Series, Target, TargetFilter};

    use crate::allocator::StaticAllocator;

    struct ImmediateHandle;

    #[async_trait]
    impl TaskHandle for ImmediateHandle {
        async fn join(self) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    struct CountingDispatcher {
        submissions: AtomicUsize,
    }

    #[async_trait]
    impl TaskDispatcher for CountingDispatcher {
        type Handle = ImmediateHandle;

        async fn apply_async(&self, signature: TaskSignature) -> Result<Self::Handle> {
            assert_eq!(signature.name, TASK_MULTI_STAGE);
            self.submissions.fetch_add(1, Ordering::SeqCst);
            Ok(ImmediateHandle)
        }
    }

    async fn seeded_store(count: usize) -> Arc<InMemoryMetadataStore> {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.insert_series(Series::new("s1", "nightly", Vec::new(), TargetFilter::All)).await.unwrap();
        for i in 0..count {
            store.insert_target(Target::new(json!({"app_id": format!("a{i}")}).as_object().unwrap().clone())).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn s5_drains_in_batches_and_stops() {
        let store = seeded_store(3).await;
        let mut crawl = store.new_crawl("s1", "c1".to_string()).await.unwrap();
        crawl.stages.push(kraken_core::types::Stage::blueprint("detail", TaskSignature::new("request.detail")));

        let allocator = StaticAllocator::new(store.clone(), 2);
        let dispatcher = CountingDispatcher { submissions: AtomicUsize::new(0) };
        let mut scheduler = Scheduler::new(allocator, dispatcher, store.clone(), "s1", Duration::from_millis(0), DispatchMode::MultiStage);

        scheduler.run(&mut crawl).await.unwrap();

        assert_eq!(scheduler.dispatcher.submissions.load(Ordering::SeqCst), 3);
        let stored_crawl = store.get_crawl(&crawl.id).await.unwrap().unwrap();
        assert_eq!(stored_crawl.targets_scheduled, 3);
    }

    #[tokio::test]
    async fn records_expectations_from_prior_statistics() {
        let store = seeded_store(1).await;
        let targets = store.targets_matching(&TargetFilter::All).await.unwrap();
        let target_id = targets[0].id.clone().unwrap();
        store
            .record_target_statistics(
                &target_id,
                "s1",
                "detail",
                kraken_core::store::StatisticsUpdate {
                    cost: 5.0,
                    gain: 2.0,
                    weight: None,
                    metrics: Default::default(),
                    result: None,
                },
            )
            .await
            .unwrap();

        let mut crawl = store.new_crawl("s1", "c1".to_string()).await.unwrap();
        crawl.stages.push(kraken_core::types::Stage::blueprint("detail", TaskSignature::new("request.detail")));

        let allocator = StaticAllocator::new(store.clone(), 10);
        let dispatcher = CountingDispatcher { submissions: AtomicUsize::new(0) };
        let mut scheduler = Scheduler::new(allocator, dispatcher, store.clone(), "s1", Duration::from_millis(0), DispatchMode::MultiStage);

        scheduler.step(&mut crawl).await.unwrap();

        assert_eq!(crawl.expectations["detail"]["cost"], json!(5.0));
    }

    #[tokio::test]
    async fn sums_expectations_across_targets_sharing_a_stage() {
        let store = seeded_store(2).await;
        let targets = store.targets_matching(&TargetFilter::All).await.unwrap();
        for (target, cost) in targets.iter().zip([5.0, 7.0]) {
            let target_id = target.id.clone().unwrap();
            store
                .record_target_statistics(
                    &target_id,
                    "s1",
                    "detail",
                    kraken_core::store::StatisticsUpdate {
                        cost,
                        gain: 0.0,
                        weight: None,
                        metrics: Default::default(),
                        result: None,
                    },
                )
                .await
                .unwrap();
        }

        let mut crawl = store.new_crawl("s1", "c1".to_string()).await.unwrap();
        crawl.stages.push(kraken_core::types::Stage::blueprint("detail", TaskSignature::new("request.detail")));

        let allocator = StaticAllocator::new(store.clone(), 10);
        let dispatcher = CountingDispatcher { submissions: AtomicUsize::new(0) };
        let mut scheduler = Scheduler::new(allocator, dispatcher, store.clone(), "s1", Duration::from_millis(0), DispatchMode::MultiStage);

        scheduler.step(&mut crawl).await.unwrap();

        assert_eq!(crawl.expectations["detail"]["cost"], json!(12.0));
    }

    #[tokio::test]
    async fn shutdown_token_stops_run_before_the_next_step() {
        let store = seeded_store(3).await;
        let mut crawl = store.new_crawl("s1", "c1".to_string()).await.unwrap();
        crawl.stages.push(kraken_core::types::Stage::blueprint("detail", TaskSignature::new("request.detail")));

        let allocator = StaticAllocator::new(store.clone(), 1);
        let dispatcher = CountingDispatcher { submissions: AtomicUsize::new(0) };
        let mut scheduler = Scheduler::new(allocator, dispatcher, store.clone(), "s1", Duration::from_millis(0), DispatchMode::MultiStage);

        let shutdown = scheduler.shutdown_token();
        shutdown.cancel();
        scheduler.run(&mut crawl).await.unwrap();

        assert_eq!(scheduler.dispatcher.submissions.load(Ordering::SeqCst), 0);
    }
}
