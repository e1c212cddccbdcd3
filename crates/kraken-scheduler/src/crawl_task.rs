//! The Crawl Task (C6, §4.2, §4.4): the per-target entry point dispatched by
//! the Scheduler, running a target's Stage Processors in sequence.

use std::sync::Arc;

use kraken_core::dispatch::TaskDispatcher;
use kraken_core::store::MetadataStore;
use kraken_core::types::{Stage, Timestamp};
use kraken_core::{Error, Result};

use crate::callback::CallbackRegistry;
use crate::pipeline::PipelineRegistry;
use crate::stage_processor::{ProgressSink, StageProcessor};

#[cfg(feature = "tracing")]
const TARGET: &str = "kraken_scheduler::crawl_task";

/// Task name for a full, ordered run of every stage of a target's pipeline.
pub const TASK_MULTI_STAGE: &str = "crawler.multi_stage";
/// Task name for running exactly one stage of a target's pipeline.
pub const TASK_SINGLE_STAGE: &str = "crawler.single_stage";

/// Runs one target's Stage Processors in sequence, driving its [`ExecutionToken`](kraken_core::types::ExecutionToken)
/// and reporting failures back to the owning Crawl's counters (§4.2, §7).
pub struct CrawlTask<'a, D: TaskDispatcher, M> {
    dispatcher: &'a D,
    store: Arc<M>,
    pipelines: &'a PipelineRegistry,
    callbacks: &'a CallbackRegistry,
}

impl<'a, D: TaskDispatcher, M: MetadataStore> CrawlTask<'a, D, M> {
    #[must_use]
    pub fn new(dispatcher: &'a D, store: Arc<M>, pipelines: &'a PipelineRegistry, callbacks: &'a CallbackRegistry) -> Self {
        Self {
            dispatcher,
            store,
            pipelines,
            callbacks,
        }
    }

    /// Runs `stages` in declared order (`crawler.multi_stage`).
    pub async fn run_multi_stage(
        &self,
        crawl_id: &str,
        series_id: &str,
        mut stages: Vec<Stage>,
        execution_token_id: &str,
    ) -> Result<()> {
        self.run_stages(crawl_id, series_id, &mut stages, execution_token_id).await
    }

    /// Runs exactly one `stage` (`crawler.single_stage`).
    pub async fn run_single_stage(
        &self,
        crawl_id: &str,
        series_id: &str,
        stage: Stage,
        execution_token_id: &str,
    ) -> Result<()> {
        let mut stages = vec![stage];
        self.run_stages(crawl_id, series_id, &mut stages, execution_token_id).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, stages), fields(crawl_id, stage_count = stages.len())))]
    async fn run_stages(&self, crawl_id: &str, series_id: &str, stages: &mut [Stage], execution_token_id: &str) -> Result<()> {
        if let Some(mut token) = self.store.get_execution_token(execution_token_id).await? {
            token.start(Timestamp::now());
            self.store.put_execution_token(token).await?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(target: TARGET, execution_token_id, "crawl task started");

        let sink = TokenProgressSink {
            store: self.store.clone(),
            execution_token_id: execution_token_id.to_string(),
        };
        let processor = StageProcessor::new(self.dispatcher, self.pipelines, self.callbacks);

        for (index, stage) in stages.iter_mut().enumerate() {
            if let Err(err) = processor.run(stage, crawl_id, series_id, &sink, index).await {
                #[cfg(feature = "tracing")]
                tracing::warn!(target: TARGET, stage = %stage.name, error = %err, "stage failed, failing crawl task");
                self.fail(crawl_id, execution_token_id, &err).await?;
                return Err(err);
            }
        }

        Ok(())
    }

    async fn fail(&self, crawl_id: &str, execution_token_id: &str, err: &Error) -> Result<()> {
        if let Some(mut token) = self.store.get_execution_token(execution_token_id).await? {
            token.fail(Timestamp::now(), err.to_string());
            self.store.put_execution_token(token).await?;
        }
        self.store.record_crawl_target_failed(crawl_id).await
    }
}

/// A [`ProgressSink`] that refreshes an [`ExecutionToken`](kraken_core::types::ExecutionToken)'s
/// `progress` snapshot after every Stage Processor step.
struct TokenProgressSink<M> {
    store: Arc<M>,
    execution_token_id: String,
}

#[async_trait::async_trait]
impl<M: MetadataStore> ProgressSink for TokenProgressSink<M> {
    async fn emit(&self, stage_index: usize, stage: &Stage) -> Result<()> {
        let Some(mut token) = self.store.get_execution_token(&self.execution_token_id).await? else {
            return Ok(());
        };
        if let Some(slot) = token.progress.get_mut(stage_index) {
            *slot = stage.clone();
        } else {
            token.progress.push(stage.clone());
        }
        self.store.put_execution_token(token).await
    }
}
