//! Pipelines (§4.5-§4.7): the fan-out targets of a Stage Processor step.
//!
//! Unlike Request Tasks, pipelines need strongly-typed access to a
//! [`DataStore`](kraken_core::store::DataStore)/[`MetadataStore`](kraken_core::store::MetadataStore)
//! collaborator rather than a JSON round-trip through the [`TaskDispatcher`](kraken_core::dispatch::TaskDispatcher) —
//! so, mirroring the terminator design, a Stage's declared `pipelines: Vec<TaskSignature>`
//! are resolved locally by name against a [`PipelineRegistry`] rather than dispatched.

pub mod data_storage;
pub mod target_discovery;

use std::collections::HashMap;
use std::sync::Arc;

use kraken_core::dispatch::TaskSignature;
use kraken_core::types::{PipelineResult, RequestResult};
use kraken_core::Result;

/// One fan-out target of a Stage Processor step (§4.4 step 2b).
#[async_trait::async_trait]
pub trait Pipeline: Send + Sync {
    /// The dotted task name this pipeline answers to, e.g. `pipeline.data_storage`.
    fn name(&self) -> &str;

    /// Processes one request result for `crawl_id`, returning its contribution
    /// to the stage's aggregated [`PipelineResult`].
    async fn run(&self, request_result: &RequestResult, crawl_id: &str) -> Result<PipelineResult>;
}

/// Resolves a Stage's declared pipeline [`TaskSignature`]s to concrete,
/// caller-registered [`Pipeline`] implementations.
#[derive(Default, Clone)]
pub struct PipelineRegistry {
    pipelines: HashMap<String, Arc<dyn Pipeline>>,
}

impl PipelineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pipeline` under its own [`Pipeline::name`].
    #[must_use]
    pub fn with(mut self, pipeline: Arc<dyn Pipeline>) -> Self {
        self.pipelines.insert(pipeline.name().to_string(), pipeline);
        self
    }

    /// Looks up the pipeline declared by `signature`, if registered.
    #[must_use]
    pub fn resolve(&self, signature: &TaskSignature) -> Option<Arc<dyn Pipeline>> {
        self.pipelines.get(&signature.name).cloned()
    }
}
