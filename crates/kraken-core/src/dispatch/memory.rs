//! An in-memory [`TaskDispatcher`], analogous to [`crate::store::memory`]'s
//! in-memory store fakes (§10.5): used in tests, doctests and the
//! `kraken-cli daemon` command when no real broker is wired up.

use std::collections::HashMap;
use std::sync::Arc;

use super::{TaskDispatcher, TaskHandle, TaskSignature};
use crate::{Error, ErrorKind, Result};

/// One locally-registered task implementation, run inline by
/// [`InMemoryTaskDispatcher::apply_async`] rather than handed to a broker.
#[async_trait::async_trait]
pub trait TaskHandler: Send + Sync {
    /// Runs the task for `kwargs`, returning its JSON result.
    async fn handle(&self, kwargs: serde_json::Map<String, serde_json::Value>) -> Result<serde_json::Value>;
}

/// A [`TaskDispatcher`] that resolves a [`TaskSignature`]'s dotted name
/// against a local registry and runs it inline.
///
/// Submission and completion happen synchronously within [`Self::apply_async`];
/// [`InMemoryTaskHandle`] only exists to satisfy the [`TaskHandle`] contract.
#[derive(Default, Clone)]
pub struct InMemoryTaskDispatcher {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl InMemoryTaskDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `task_name`, replacing any prior registration.
    #[must_use]
    pub fn with(mut self, task_name: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(task_name.into(), handler);
        self
    }
}

/// An already-resolved [`TaskHandle`] wrapping an [`InMemoryTaskDispatcher`] result.
pub struct InMemoryTaskHandle(serde_json::Value);

#[async_trait::async_trait]
impl TaskHandle for InMemoryTaskHandle {
    async fn join(self) -> Result<serde_json::Value> {
        Ok(self.0)
    }
}

#[async_trait::async_trait]
impl TaskDispatcher for InMemoryTaskDispatcher {
    type Handle = InMemoryTaskHandle;

    async fn apply_async(&self, signature: TaskSignature) -> Result<Self::Handle> {
        let handler = self
            .handlers
            .get(&signature.name)
            .ok_or_else(|| Error::new(ErrorKind::Dispatch, format!("no handler registered for task '{}'", signature.name)))?;
        let value = handler.handle(signature.kwargs).await?;
        Ok(InMemoryTaskHandle(value))
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    struct Echo;

    #[async_trait::async_trait]
    impl TaskHandler for Echo {
        async fn handle(&self, kwargs: serde_json::Map<String, serde_json::Value>) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Object(kwargs))
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let dispatcher = InMemoryTaskDispatcher::new().with("request.detail", Arc::new(Echo));
        let handle = dispatcher
            .apply_async(TaskSignature::new("request.detail").with_kwarg("app_id", "a"))
            .await
            .unwrap();
        let value = handle.join().await.unwrap();
        assert_eq!(value, json!({"app_id": "a"}));
    }

    #[tokio::test]
    async fn unregistered_task_errors() {
        let dispatcher = InMemoryTaskDispatcher::new();
        let result = dispatcher.apply_async(TaskSignature::new("request.unknown")).await;
        assert!(result.is_err());
    }
}
