//! The Stage Processor (C5, §4.4): runs one [`Stage`] to completion, driving
//! a [`Spider`], fanning pipelines out, evaluating terminators and firing callbacks.

use std::collections::HashMap;

use kraken_core::dispatch::TaskDispatcher;
use kraken_core::types::{
    Stage, StageResult, TERMINATOR_KEY_TARGET_EXHAUSTED, TERMINATOR_KEY_TARGET_NOT_FOUND,
};
use kraken_core::{Error, ErrorKind, Result};

use crate::callback::{CallbackContext, CallbackRegistry};
use crate::pipeline::PipelineRegistry;
use crate::spider::Spider;
use crate::terminator::Terminator;

#[cfg(feature = "tracing")]
const TARGET: &str = "kraken_scheduler::stage_processor";

/// Receives one progress snapshot per Stage Processor step (§4.4 step 2c), so
/// the enclosing Crawl Task can refresh its `ExecutionToken`.
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync {
    /// Called after every step with the Stage's current (partial) progress.
    async fn emit(&self, stage_index: usize, stage: &Stage) -> Result<()>;
}

/// A [`ProgressSink`] that does nothing, for callers that don't track tokens.
pub struct NullProgressSink;

#[async_trait::async_trait]
impl ProgressSink for NullProgressSink {
    async fn emit(&self, _stage_index: usize, _stage: &Stage) -> Result<()> {
        Ok(())
    }
}

/// Drives one [`Stage`] through request → pipelines → terminators → callbacks (§4.4).
pub struct StageProcessor<'a, D: TaskDispatcher> {
    dispatcher: &'a D,
    pipelines: &'a PipelineRegistry,
    callbacks: &'a CallbackRegistry,
}

impl<'a, D: TaskDispatcher> StageProcessor<'a, D> {
    #[must_use]
    pub fn new(dispatcher: &'a D, pipelines: &'a PipelineRegistry, callbacks: &'a CallbackRegistry) -> Self {
        Self {
            dispatcher,
            pipelines,
            callbacks,
        }
    }

    /// Runs `stage` (already carrying an injected `target`) to completion.
    ///
    /// `stage_index` identifies this stage within the owning Crawl Task's
    /// stage list, purely for [`ProgressSink::emit`]'s bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns an error if the request task or a pipeline ultimately fails
    /// (after pipeline-internal retries); such errors are terminal for the
    /// owning target's Crawl Task (§4.4, §7).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, stage, sink), fields(stage = %stage.name)))]
    pub async fn run(&self, stage: &mut Stage, crawl_id: &str, series_id: &str, sink: &dyn ProgressSink, stage_index: usize) -> Result<()> {
        let target = stage
            .target
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::Validation, "stage processor requires an injected target"))?;

        let mut spider = Spider::new(self.dispatcher, stage.request.clone(), &target);

        while let Some(step) = spider.next().await {
            let request_result = step?;

            stage.progress.cost += request_result.cost;
            stage.progress.gain += request_result.gain;

            if !request_result.target_not_found {
                let mut pending = Vec::new();
                for signature in &stage.pipelines {
                    if let Some(pipeline) = self.pipelines.resolve(signature) {
                        pending.push(async {
                            #[cfg(feature = "tracing")]
                            tracing::trace!(target: TARGET, pipeline = %signature.name, "dispatching pipeline");
                            (signature.name.clone(), pipeline.run(&request_result, crawl_id).await)
                        });
                    }
                }

                let outcomes = futures::future::join_all(pending).await;
                let mut merged = HashMap::new();
                for (name, outcome) in outcomes {
                    merged.insert(name, outcome?);
                }
                stage.progress.merge_pipeline_results(merged);
            }

            if request_result.target_not_found {
                stage.progress.terminated_by.insert(TERMINATOR_KEY_TARGET_NOT_FOUND.to_string(), true);
            }
            if spider.target_exhausted() {
                stage.progress.terminated_by.insert(TERMINATOR_KEY_TARGET_EXHAUSTED.to_string(), true);
            }

            for signature in &stage.terminators {
                let terminator = Terminator::from_signature(signature)?;
                let fired = terminator.fires(&stage.progress);
                if fired {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(target: TARGET, terminator = %signature.name, "terminator fired");
                }
                stage.progress.terminated_by.insert(signature.name.clone(), fired);
            }

            sink.emit(stage_index, stage).await?;

            if stage.progress.is_terminated() {
                break;
            }
        }

        self.run_callbacks(stage, crawl_id, series_id, &target).await;
        Ok(())
    }

    async fn run_callbacks(&self, stage: &Stage, crawl_id: &str, series_id: &str, target: &kraken_core::types::SlimTarget) {
        for signature in &stage.callbacks {
            let Some(callback) = self.callbacks.resolve(signature) else {
                continue;
            };
            let cx = CallbackContext {
                crawl_id,
                series_id,
                stage_name: &stage.name,
                target,
                progress: &stage.progress,
            };
            if let Err(_err) = callback.run(&cx).await {
                #[cfg(feature = "tracing")]
                tracing::warn!(target: TARGET, callback = %signature.name, error = %_err, "callback failed, continuing");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::pipeline::Pipeline;
    use kraken_core::dispatch::{TaskHandle, TaskSignature};
    use kraken_core::types::{PipelineResult, RequestResult, SlimTarget};

    struct OneShotDispatcher;

    struct ImmediateHandle(serde_json::Value);

    #[async_trait]
    impl TaskHandle for ImmediateHandle {
        async fn join(self) -> Result<serde_json::Value> {
            Ok(self.0)
        }
    }

    #[async_trait]
    impl TaskDispatcher for OneShotDispatcher {
        type Handle = ImmediateHandle;

        async fn apply_async(&self, _signature: TaskSignature) -> Result<Self::Handle> {
            Ok(ImmediateHandle(json!({
                "result": {"title": "X"},
                "subsequent_kwargs": null,
                "cost": 1.0,
                "gain": 1.0,
            })))
        }
    }

    struct CountingPipeline {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Pipeline for CountingPipeline {
        fn name(&self) -> &str {
            "pipeline.data_storage"
        }

        async fn run(&self, _request_result: &RequestResult, _crawl_id: &str) -> Result<PipelineResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PipelineResult {
                weight: Some(1.0),
                statistics: json!({"processed_documents": 1}).as_object().unwrap().clone(),
                metrics: Default::default(),
            })
        }
    }

    fn blueprint_stage() -> Stage {
        let target = SlimTarget::new(json!({"app_id": "a"}).as_object().unwrap().clone());
        let mut stage = Stage::blueprint("detail", TaskSignature::new("request.detail"));
        stage.pipelines.push(TaskSignature::new("pipeline.data_storage"));
        stage.terminators.push(
            TaskSignature::new("terminator.static").with_kwarg("pipeline", "pipeline.data_storage").with_kwarg("limit", 1),
        );
        stage.target = Some(target);
        stage
    }

    #[tokio::test]
    async fn runs_pipelines_and_terminates_on_static_limit() {
        let dispatcher = OneShotDispatcher;
        let calls = Arc::new(AtomicUsize::new(0));
        let pipelines = PipelineRegistry::new().with(Arc::new(CountingPipeline { calls: calls.clone() }));
        let callbacks = CallbackRegistry::new();
        let processor = StageProcessor::new(&dispatcher, &pipelines, &callbacks);

        let mut stage = blueprint_stage();
        processor.run(&mut stage, "c1", "s1", &NullProgressSink, 0).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(stage.progress.is_terminated());
        assert_eq!(stage.progress.terminated_by["terminator.static"], true);
    }

    #[tokio::test]
    async fn missing_target_errors() {
        let dispatcher = OneShotDispatcher;
        let pipelines = PipelineRegistry::new();
        let callbacks = CallbackRegistry::new();
        let processor = StageProcessor::new(&dispatcher, &pipelines, &callbacks);

        let mut stage = Stage::blueprint("detail", TaskSignature::new("request.detail"));
        let result = processor.run(&mut stage, "c1", "s1", &NullProgressSink, 0).await;
        assert!(result.is_err());
    }
}
