use serde::{Deserialize, Serialize};

use crate::types::{Stage, Timestamp};

/// Lifecycle state of one in-flight Crawl Task invocation, driven by the
/// owning Crawl Task (§3, §4.2): `Created → Started → (Retry)* → {Finished | Failed}`.
///
/// `Removed` is not a distinct persisted state; a successful token is deleted
/// from the store rather than transitioned (§4.2: "`REMOVED` on success
/// collapses to deletion of the record").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Created,
    Started,
    Retry,
    Finished,
    Failed,
}

/// One retry observation, appended to [`ExecutionToken::retry_infos`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryInfo {
    pub timestamp: Timestamp,
    pub reason: String,
}

/// The terminal failure observation, set once on [`ExecutionToken::fail`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailInfo {
    pub timestamp: Timestamp,
    pub reason: String,
}

/// Out-of-band record of one in-flight Crawl Task invocation (§3, §4.2).
///
/// Created by the Scheduler *before* dispatch, so that a lost task is
/// detectable as a token stuck in [`TokenState::Created`] past a grace
/// window. Every transition is an idempotent upsert keyed by [`Self::id`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionToken {
    pub id: String,
    pub crawl: String,
    pub stages: Vec<Stage>,
    pub state: TokenState,
    pub created: Timestamp,
    pub started: Option<Timestamp>,
    pub finished: Option<Timestamp>,
    pub failed: Option<Timestamp>,
    pub retries: u32,
    #[serde(default)]
    pub retry_infos: Vec<RetryInfo>,
    pub fail_info: Option<FailInfo>,
    /// Snapshot of the owning Crawl Task's per-stage progress, refreshed by
    /// the Crawl Task on every emission from its Stage Processors.
    #[serde(default)]
    pub progress: Vec<Stage>,
}

impl ExecutionToken {
    /// Creates a new token in [`TokenState::Created`] for `crawl`, snapshotting `stages`.
    #[must_use]
    pub fn new(id: impl Into<String>, crawl: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            id: id.into(),
            crawl: crawl.into(),
            stages: stages.clone(),
            state: TokenState::Created,
            created: Timestamp::now(),
            started: None,
            finished: None,
            failed: None,
            retries: 0,
            retry_infos: Vec::new(),
            fail_info: None,
            progress: stages,
        }
    }

    /// Transitions to [`TokenState::Started`] at `timestamp`.
    pub fn start(&mut self, timestamp: Timestamp) {
        self.started = Some(timestamp);
        self.state = TokenState::Started;
    }

    /// Transitions to [`TokenState::Retry`], growing `retry_infos` monotonically.
    pub fn retry(&mut self, timestamp: Timestamp, reason: impl Into<String>) {
        self.retries += 1;
        self.retry_infos.push(RetryInfo {
            timestamp,
            reason: reason.into(),
        });
        self.state = TokenState::Retry;
    }

    /// Transitions to [`TokenState::Finished`] at `timestamp`.
    pub fn finish(&mut self, timestamp: Timestamp) {
        self.finished = Some(timestamp);
        self.state = TokenState::Finished;
    }

    /// Transitions to the terminal [`TokenState::Failed`] state, setting `fail_info` once.
    pub fn fail(&mut self, timestamp: Timestamp, reason: impl Into<String>) {
        self.failed = Some(timestamp);
        self.fail_info = Some(FailInfo {
            timestamp,
            reason: reason.into(),
        });
        self.state = TokenState::Failed;
    }

    /// Replaces the progress snapshot, as done by the enclosing Crawl Task
    /// after every Stage Processor emission.
    pub fn update_progress(&mut self, stages: Vec<Stage>) {
        self.progress = stages;
    }

    /// Whether this token is stuck in [`TokenState::Created`] for at least
    /// `grace_seconds`, i.e. a lost task (§4.2, §10.1).
    #[must_use]
    pub fn is_stuck(&self, now: Timestamp, grace_seconds: f64) -> bool {
        self.state == TokenState::Created && now.seconds_since(self.created) >= grace_seconds
    }
}
