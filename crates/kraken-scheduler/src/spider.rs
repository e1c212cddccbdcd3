//! The Spider iteration protocol (C4, §4.3): a lazy, finite sequence of
//! [`RequestResult`]s for one target, driven by repeatedly dispatching the
//! target's `request` task with an evolving set of parameters.

use kraken_core::dispatch::{TaskDispatcher, TaskHandle, TaskSignature};
use kraken_core::types::{RequestResult, SlimTarget};
use kraken_core::{Error, ErrorKind, Result};

#[cfg(feature = "tracing")]
const TARGET: &str = "kraken_scheduler::spider";

/// Drives the per-target request loop described in §4.3.
///
/// Not restartable: once [`Self::next`] returns `None`, the spider is
/// exhausted and must not be polled again. Spider state (`parameters_for_next_request`)
/// lives only in-memory for the duration of the owning Crawl Task.
pub struct Spider<'a, D: TaskDispatcher> {
    dispatcher: &'a D,
    request: TaskSignature,
    parameters_for_next_request: serde_json::Map<String, serde_json::Value>,
    finished: bool,
    target_not_found: bool,
    target_exhausted: bool,
}

impl<'a, D: TaskDispatcher> Spider<'a, D> {
    /// Creates a new spider for `target`, issuing `request` with `target.kwargs` first.
    #[must_use]
    pub fn new(dispatcher: &'a D, request: TaskSignature, target: &SlimTarget) -> Self {
        Self {
            dispatcher,
            request,
            parameters_for_next_request: target.kwargs.clone(),
            finished: false,
            target_not_found: false,
            target_exhausted: false,
        }
    }

    /// Whether the source reported the target absent (§4.3 step 3).
    #[must_use]
    pub const fn target_not_found(&self) -> bool {
        self.target_not_found
    }

    /// Whether the last step carried no `subsequent_kwargs` (§4.3 step 4).
    #[must_use]
    pub const fn target_exhausted(&self) -> bool {
        self.target_exhausted
    }

    /// Issues the next request round-trip and returns its [`RequestResult`],
    /// or `None` once the spider has naturally terminated (§4.3).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), fields(request = %self.request.name)))]
    pub async fn next(&mut self) -> Option<Result<RequestResult>> {
        if self.finished {
            return None;
        }

        let signature = self.request.clone().with_kwargs(self.parameters_for_next_request.clone());

        let handle = match self.dispatcher.apply_async(signature).await {
            Ok(handle) => handle,
            Err(err) => {
                self.finished = true;
                return Some(Err(err));
            }
        };

        let value = match handle.join().await {
            Ok(value) => value,
            Err(err) => {
                self.finished = true;
                return Some(Err(err));
            }
        };

        let result: RequestResult = match serde_json::from_value(value) {
            Ok(result) => result,
            Err(err) => {
                self.finished = true;
                return Some(Err(Error::from_boxed(ErrorKind::Serde, err)));
            }
        };

        if result.target_not_found {
            #[cfg(feature = "tracing")]
            tracing::debug!(target: TARGET, "target not found, terminating spider");
            self.target_not_found = true;
            self.finished = true;
            return Some(Ok(result));
        }

        match &result.subsequent_kwargs {
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(target: TARGET, "no subsequent_kwargs, target exhausted");
                self.target_exhausted = true;
                self.finished = true;
            }
            Some(kwargs) => {
                for (key, value) in kwargs {
                    self.parameters_for_next_request.insert(key.clone(), value.clone());
                }
            }
        }

        Some(Ok(result))
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::Spider;
    use kraken_core::dispatch::{TaskDispatcher, TaskHandle, TaskSignature};
    use kraken_core::types::SlimTarget;
    use kraken_core::Result;

    struct PagedDispatcher {
        calls: AtomicUsize,
    }

    struct ImmediateHandle(serde_json::Value);

    #[async_trait]
    impl TaskHandle for ImmediateHandle {
        async fn join(self) -> Result<serde_json::Value> {
            Ok(self.0)
        }
    }

    #[async_trait]
    impl TaskDispatcher for PagedDispatcher {
        type Handle = ImmediateHandle;

        async fn apply_async(&self, signature: TaskSignature) -> Result<Self::Handle> {
            let page = signature.kwargs.get("page").and_then(serde_json::Value::as_i64).unwrap_or(1);
            let value = if page < 3 {
                json!({
                    "result": {"page": page},
                    "subsequent_kwargs": {"page": page + 1},
                    "cost": 1.0,
                    "gain": 1.0,
                })
            } else {
                json!({
                    "result": {"page": page},
                    "subsequent_kwargs": null,
                    "cost": 1.0,
                    "gain": 1.0,
                })
            };
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ImmediateHandle(value))
        }
    }

    fn target() -> SlimTarget {
        SlimTarget::new(json!({"app_id": "a"}).as_object().unwrap().clone())
    }

    #[tokio::test]
    async fn walks_pages_until_exhausted() {
        let dispatcher = PagedDispatcher { calls: AtomicUsize::new(0) };
        let mut spider = Spider::new(&dispatcher, TaskSignature::new("request.detail"), &target());

        let mut pages = Vec::new();
        while let Some(step) = spider.next().await {
            let result = step.unwrap();
            pages.push(result.result["page"].as_i64().unwrap());
        }

        assert_eq!(pages, vec![1, 2, 3]);
        assert!(spider.target_exhausted());
        assert!(!spider.target_not_found());
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
    }

    struct NotFoundDispatcher;

    #[async_trait]
    impl TaskDispatcher for NotFoundDispatcher {
        type Handle = ImmediateHandle;

        async fn apply_async(&self, _signature: TaskSignature) -> Result<Self::Handle> {
            Ok(ImmediateHandle(json!({
                "result": null,
                "subsequent_kwargs": null,
                "target_not_found": true,
            })))
        }
    }

    #[tokio::test]
    async fn stops_on_target_not_found() {
        let dispatcher = NotFoundDispatcher;
        let mut spider = Spider::new(&dispatcher, TaskSignature::new("request.detail"), &target());

        let first = spider.next().await.unwrap().unwrap();
        assert!(first.target_not_found);
        assert!(spider.target_not_found());

        assert!(spider.next().await.is_none());
    }
}
