//! The `TaskDispatcher` collaborator contract (C1, §6).
//!
//! The engine never runs a request, pipeline, terminator or callback itself —
//! it hands a [`TaskSignature`] to a caller-supplied [`TaskDispatcher`] and
//! either awaits the returned [`TaskHandle`] or fires-and-forgets it.

pub mod memory;
mod routes;
mod signature;

pub use routes::TaskRoutes;
pub use signature::TaskSignature;

use crate::Result;

/// Submits named tasks with keyword arguments and returns an awaitable handle.
///
/// Implemented by the hosting process against its actual broker/worker runtime
/// (e.g. Celery-style task queue, or an in-process `tokio::task` pool for
/// tests — see [`crate::store::memory`]). The engine only ever depends on this
/// trait, never on a concrete broker.
#[async_trait::async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// The awaitable handle returned by [`Self::apply_async`].
    type Handle: TaskHandle;

    /// Submits `signature` for asynchronous execution and returns a handle.
    ///
    /// Submission itself must not block on the task's completion: the handle
    /// is what makes the result awaitable.
    async fn apply_async(&self, signature: TaskSignature) -> Result<Self::Handle>;
}

/// A handle to one submitted task, returned by [`TaskDispatcher::apply_async`].
#[async_trait::async_trait]
pub trait TaskHandle: Send {
    /// Blocks until the task completes and returns its JSON result.
    ///
    /// Used by the [`Spider`](crate::types) to synchronously await a request
    /// task's [`RequestResult`](crate::types::RequestResult), and by the Stage
    /// Processor to join a pipeline fan-out group.
    async fn join(self) -> Result<serde_json::Value>;
}
