use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{SlimTarget, Timestamp};

/// A point-in-time snapshot of a stage's statistics for a target, appended to
/// [`StageStatistics::history`] every time the Target Monitor callback runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageStatisticsSnapshot {
    pub timestamp: Timestamp,
    pub cost: f64,
    pub gain: f64,
    pub weight: Option<f64>,
    #[serde(default)]
    pub metrics: Map<String, Value>,
    pub result: Option<Value>,
}

/// Current and historical statistics for one `(series, stage)` pair of a [`Target`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageStatistics {
    pub cost: f64,
    pub gain: f64,
    pub weight: Option<f64>,
    #[serde(default)]
    pub metrics: Map<String, Value>,
    pub result: Option<Value>,
    #[serde(default)]
    pub history: Vec<StageStatisticsSnapshot>,
}

impl StageStatistics {
    /// Appends a snapshot of the current values to the history and applies
    /// the given values as the new current values.
    pub fn record(
        &mut self,
        timestamp: Timestamp,
        cost: f64,
        gain: f64,
        weight: Option<f64>,
        metrics: Map<String, Value>,
        result: Option<Value>,
    ) {
        self.cost = cost;
        self.gain = gain;
        self.weight = weight;
        self.metrics = metrics.clone();
        self.result = result.clone();
        self.history.push(StageStatisticsSnapshot {
            timestamp,
            cost,
            gain,
            weight,
            metrics,
            result,
        });
    }

    /// Returns the current values as a JSON object, for the expectations
    /// seeding performed by the Scheduler (§4.11).
    #[must_use]
    pub fn as_expectation(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("cost".into(), Value::from(self.cost));
        map.insert("gain".into(), Value::from(self.gain));
        if let Some(weight) = self.weight {
            map.insert("weight".into(), Value::from(weight));
        }
        map.insert("metrics".into(), Value::Object(self.metrics.clone()));
        map
    }
}

/// A crawlable entity uniquely identified by its `kwargs` map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub id: Option<String>,
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub discovered_by: Option<String>,
    pub discovered_at: Timestamp,
    /// `series_id -> ordered timestamps`, one per time this target was queued.
    #[serde(default)]
    pub queued: HashMap<String, Vec<Timestamp>>,
    /// `series_id -> ordered timestamps`, one per time this target finished processing.
    #[serde(default)]
    pub processed: HashMap<String, Vec<Timestamp>>,
    /// `series_id -> stage_name -> statistics`.
    #[serde(default)]
    pub statistics: HashMap<String, HashMap<String, StageStatistics>>,
}

impl Target {
    /// Creates a new, undiscovered [`Target`] with the given `kwargs`.
    #[must_use]
    pub fn new(kwargs: Map<String, Value>) -> Self {
        Self {
            id: None,
            kwargs,
            tags: BTreeSet::new(),
            discovered_by: None,
            discovered_at: Timestamp::now(),
            queued: HashMap::new(),
            processed: HashMap::new(),
            statistics: HashMap::new(),
        }
    }

    /// Projects this target to its transport-safe [`SlimTarget`] form.
    #[must_use]
    pub fn slim(&self) -> SlimTarget {
        SlimTarget {
            id: self.id.clone(),
            tags: self.tags.clone(),
            kwargs: self.kwargs.clone(),
        }
    }

    /// Returns the timestamp this target was last queued under `series_id`, if any.
    #[must_use]
    pub fn last_queued(&self, series_id: &str) -> Option<Timestamp> {
        self.queued.get(series_id).and_then(|xs| xs.last().copied())
    }

    /// Whether this target has ever been queued under `series_id`.
    #[must_use]
    pub fn was_queued(&self, series_id: &str) -> bool {
        self.queued.get(series_id).is_some_and(|xs| !xs.is_empty())
    }

    /// Appends `timestamp` to the `queued[series_id]` timeline.
    pub fn mark_queued(&mut self, series_id: &str, timestamp: Timestamp) {
        self.queued.entry(series_id.to_string()).or_default().push(timestamp);
    }

    /// Appends `timestamp` to the `processed[series_id]` timeline.
    pub fn mark_processed(&mut self, series_id: &str, timestamp: Timestamp) {
        self.processed
            .entry(series_id.to_string())
            .or_default()
            .push(timestamp);
    }

    /// Returns the latest statistics recorded for `(series_id, stage_name)`, as a
    /// JSON object, or an empty object if this target has never run that stage.
    ///
    /// Used by the Scheduler to seed a Crawl's `expectations` (§4.11).
    #[must_use]
    pub fn latest_statistics(&self, series_id: &str, stage_name: &str) -> Map<String, Value> {
        self.statistics
            .get(series_id)
            .and_then(|stages| stages.get(stage_name))
            .map(StageStatistics::as_expectation)
            .unwrap_or_default()
    }

    /// Returns a mutable handle to the statistics bundle for `(series_id, stage_name)`,
    /// creating an empty one if absent.
    pub fn statistics_mut(&mut self, series_id: &str, stage_name: &str) -> &mut StageStatistics {
        self.statistics
            .entry(series_id.to_string())
            .or_default()
            .entry(stage_name.to_string())
            .or_default()
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::Target;
    use crate::types::Timestamp;

    #[test]
    fn slim_projects_id_tags_kwargs() {
        let mut target = Target::new(json!({"app_id": "a"}).as_object().unwrap().clone());
        target.id = Some("abc".into());
        target.tags.insert("featured".into());

        let slim = target.slim();
        assert_eq!(slim.id, Some("abc".into()));
        assert!(slim.tags.contains("featured"));
        assert_eq!(slim.kwargs["app_id"], json!("a"));
    }

    #[test]
    fn last_queued_and_was_queued() {
        let mut target = Target::new(Default::default());
        assert!(!target.was_queued("s1"));
        assert_eq!(target.last_queued("s1"), None);

        let t1 = Timestamp::from_second(100);
        let t2 = Timestamp::from_second(200);
        target.mark_queued("s1", t1);
        target.mark_queued("s1", t2);

        assert!(target.was_queued("s1"));
        assert_eq!(target.last_queued("s1"), Some(t2));
        assert!(!target.was_queued("s2"));
    }

    #[test]
    fn statistics_round_trip() {
        let mut target = Target::new(Default::default());
        assert!(target
            .latest_statistics("s1", "detail")
            .is_empty());

        let stats = target.statistics_mut("s1", "detail");
        stats.record(
            Timestamp::from_second(1),
            2.0,
            3.0,
            Some(1.0),
            Default::default(),
            None,
        );

        let expectation = target.latest_statistics("s1", "detail");
        assert_eq!(expectation["cost"], json!(2.0));
        assert_eq!(expectation["gain"], json!(3.0));
        assert_eq!(expectation["weight"], json!(1.0));
    }
}
