//! Callbacks (§4.9): fire-and-forget notifications run once a Stage completes.

pub mod crawl_monitor;
pub mod target_monitor;

use std::collections::HashMap;
use std::sync::Arc;

use kraken_core::dispatch::TaskSignature;
use kraken_core::types::{SlimTarget, StageResult};
use kraken_core::Result;

/// Everything a [`Callback`] needs about the Stage it ran for.
pub struct CallbackContext<'a> {
    pub crawl_id: &'a str,
    pub series_id: &'a str,
    pub stage_name: &'a str,
    pub target: &'a SlimTarget,
    pub progress: &'a StageResult,
}

/// One fire-and-forget notification (§4.4 step 3, §4.9): a failure here must
/// never fail the owning Crawl Task.
#[async_trait::async_trait]
pub trait Callback: Send + Sync {
    /// The dotted task name this callback answers to, e.g. `callback.target_monitor`.
    fn name(&self) -> &str;

    /// Runs the callback. Errors are logged by the caller and otherwise swallowed.
    async fn run(&self, cx: &CallbackContext<'_>) -> Result<()>;
}

/// Resolves a Stage's declared callback [`TaskSignature`]s to concrete,
/// caller-registered [`Callback`] implementations, mirroring [`super::pipeline::PipelineRegistry`].
#[derive(Default, Clone)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, Arc<dyn Callback>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` under its own [`Callback::name`].
    #[must_use]
    pub fn with(mut self, callback: Arc<dyn Callback>) -> Self {
        self.callbacks.insert(callback.name().to_string(), callback);
        self
    }

    /// Looks up the callback declared by `signature`, if registered.
    #[must_use]
    pub fn resolve(&self, signature: &TaskSignature) -> Option<Arc<dyn Callback>> {
        self.callbacks.get(&signature.name).cloned()
    }
}
