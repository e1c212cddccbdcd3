use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Stage, TargetFilter, Timestamp};
use crate::util::add_json_maps;

/// One iteration of a [`Series`](super::Series) (§3).
///
/// `name` is derived as `series.name + "_" + iteration`. Counters are
/// monotone and, per §5/§9, must only ever be mutated through atomic
/// store-level operators in a real deployment — the mutating methods here
/// model those operators for the in-memory store and single-process tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Crawl {
    pub id: String,
    pub name: String,
    pub series: String,
    pub iteration: u64,
    pub created: Timestamp,
    pub started: Timestamp,
    pub finished: Option<Timestamp>,
    pub stages: Vec<Stage>,
    pub filter: TargetFilter,

    pub targets_scheduled: u64,
    pub targets_finished: u64,
    pub targets_failed: u64,
    pub targets_retried: u64,
    #[serde(default)]
    pub expectations: Map<String, Value>,
}

impl Crawl {
    /// Creates a new Crawl for `series_name`'s `iteration`-th run, snapshotting
    /// `stages` and `filter` from the Series blueprint.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        series_id: impl Into<String>,
        series_name: &str,
        iteration: u64,
        stages: Vec<Stage>,
        filter: TargetFilter,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: id.into(),
            name: format!("{series_name}_{iteration}"),
            series: series_id.into(),
            iteration,
            created: now,
            started: now,
            finished: None,
            stages,
            filter,
            targets_scheduled: 0,
            targets_finished: 0,
            targets_failed: 0,
            targets_retried: 0,
            expectations: Map::new(),
        }
    }

    /// Atomically increments `targets_scheduled` by `count` and merges
    /// `expectations` into the running total, per the Scheduler's step (§4.11).
    pub fn record_scheduled(&mut self, count: u64, expectations: &HashMap<String, Map<String, Value>>) {
        self.targets_scheduled += count;
        for (stage_name, stage_expectation) in expectations {
            let existing = self
                .expectations
                .get(stage_name)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let merged = add_json_maps(&existing, stage_expectation);
            self.expectations.insert(stage_name.clone(), Value::Object(merged));
        }
    }

    /// Increments `targets_finished`.
    pub fn record_finished(&mut self) {
        self.targets_finished += 1;
    }

    /// Increments `targets_failed`.
    pub fn record_failed(&mut self) {
        self.targets_failed += 1;
    }

    /// Increments `targets_retried`.
    pub fn record_retried(&mut self) {
        self.targets_retried += 1;
    }

    /// Marks this crawl as finished at `timestamp`.
    pub fn mark_finished(&mut self, timestamp: Timestamp) {
        self.finished = Some(timestamp);
    }

    /// The `submitted - finished` backpressure gauge (§4.11).
    #[must_use]
    pub fn backpressure(&self) -> i64 {
        self.targets_scheduled as i64 - self.targets_finished as i64
    }

    /// Operator status line: `scheduled`, `finished`, `retried`, `failed`, `backpressure` (§4.11, §10.4).
    #[must_use]
    pub fn status(&self) -> CrawlStatus {
        CrawlStatus {
            scheduled: self.targets_scheduled,
            finished: self.targets_finished,
            retried: self.targets_retried,
            failed: self.targets_failed.saturating_sub(self.targets_retried),
            backpressure: self.backpressure(),
        }
    }
}

/// Snapshot of a Crawl's progress counters, grounded in the original
/// deployment's `_get_status()` (§10.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrawlStatus {
    pub scheduled: u64,
    pub finished: u64,
    pub retried: u64,
    pub failed: u64,
    pub backpressure: i64,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn crawl() -> Crawl {
        Crawl::new("c1", "s1", "nightly", 1, Vec::new(), TargetFilter::All)
    }

    #[test]
    fn name_derives_from_series_and_iteration() {
        assert_eq!(crawl().name, "nightly_1");
    }

    #[test]
    fn record_scheduled_merges_expectations() {
        let mut crawl = crawl();
        let mut expectations = HashMap::new();
        expectations.insert(
            "detail".to_string(),
            json!({"cost": 1.0}).as_object().unwrap().clone(),
        );
        crawl.record_scheduled(2, &expectations);
        crawl.record_scheduled(3, &expectations);

        assert_eq!(crawl.targets_scheduled, 5);
        assert_eq!(crawl.expectations["detail"]["cost"], json!(2.0));
    }

    #[test]
    fn status_computes_backpressure_and_net_failed() {
        let mut crawl = crawl();
        crawl.targets_scheduled = 10;
        crawl.targets_finished = 4;
        crawl.targets_retried = 2;
        crawl.targets_failed = 3;

        let status = crawl.status();
        assert_eq!(status.backpressure, 6);
        assert_eq!(status.failed, 1);
    }
}
