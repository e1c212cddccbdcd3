use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dispatch::TaskSignature;
use crate::types::{PipelineResult, SlimTarget};

/// The terminator key used when a [`Spider`](crate::types) reports `target_not_found`.
pub const TERMINATOR_KEY_TARGET_NOT_FOUND: &str = "target_not_found";
/// The terminator key used when a [`Spider`](crate::types) reports `target_exhausted`.
pub const TERMINATOR_KEY_TARGET_EXHAUSTED: &str = "target_exhausted";

/// The running progress of one [`Stage`], updated step by step by the Stage
/// Processor (§4.4) and snapshotted into every [`ExecutionToken`](super::ExecutionToken).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageResult {
    pub cost: f64,
    pub gain: f64,
    /// `pipeline_name -> aggregated result`, accumulated with [`PipelineResult`]'s addition law.
    #[serde(default)]
    pub pipeline_results: HashMap<String, PipelineResult>,
    /// `terminator_name -> fired`, including the natural-termination keys
    /// [`TERMINATOR_KEY_TARGET_NOT_FOUND`] and [`TERMINATOR_KEY_TARGET_EXHAUSTED`].
    #[serde(default)]
    pub terminated_by: HashMap<String, bool>,
}

impl StageResult {
    /// Whether any terminator (including the natural-termination keys) has fired.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated_by.values().any(|fired| *fired)
    }

    /// Merges `results`, keyed by pipeline name, into [`Self::pipeline_results`]
    /// using [`PipelineResult`]'s addition law.
    pub fn merge_pipeline_results(&mut self, results: HashMap<String, PipelineResult>) {
        for (name, result) in results {
            let entry = self.pipeline_results.entry(name).or_default();
            *entry = &*entry + &result;
        }
    }

    /// Returns the aggregated statistic named `key` from `pipeline_name`'s
    /// result, as an `f64`, or `0.0` if absent — used by terminators (§4.8).
    #[must_use]
    pub fn pipeline_statistic(&self, pipeline_name: &str, key: &str) -> f64 {
        self.pipeline_results
            .get(pipeline_name)
            .and_then(|result| result.statistics.get(key))
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0)
    }

    /// Returns the aggregated metric named `key` from `pipeline_name`'s
    /// result, as an `f64`, or `0.0` if absent.
    #[must_use]
    pub fn pipeline_metric(&self, pipeline_name: &str, key: &str) -> f64 {
        self.pipeline_results
            .get(pipeline_name)
            .and_then(|result| result.metrics.get(key))
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0)
    }
}

/// One unit of work per target: request → pipelines → terminators → callbacks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    pub name: String,
    pub request: TaskSignature,
    /// Injected per scheduled target by the Scheduler; absent on a Series blueprint.
    #[serde(default)]
    pub target: Option<SlimTarget>,
    #[serde(default)]
    pub pipelines: Vec<TaskSignature>,
    #[serde(default)]
    pub terminators: Vec<TaskSignature>,
    #[serde(default)]
    pub callbacks: Vec<TaskSignature>,
    #[serde(default)]
    pub progress: StageResult,
}

impl Stage {
    /// Creates a Stage blueprint with no target injected and no progress yet.
    #[must_use]
    pub fn blueprint(name: impl Into<String>, request: TaskSignature) -> Self {
        Self {
            name: name.into(),
            request,
            target: None,
            pipelines: Vec::new(),
            terminators: Vec::new(),
            callbacks: Vec::new(),
            progress: StageResult::default(),
        }
    }

    /// Clones this stage with `target` injected and progress reset, as done
    /// by the Scheduler before submitting a Crawl Task (§4.11).
    #[must_use]
    pub fn for_target(&self, target: SlimTarget) -> Self {
        Self {
            target: Some(target),
            progress: StageResult::default(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{Stage, StageResult, TERMINATOR_KEY_TARGET_EXHAUSTED};
    use crate::dispatch::TaskSignature;
    use crate::types::{PipelineResult, SlimTarget};

    #[test]
    fn deserializes_a_blueprint_file_with_no_target_or_progress() {
        let json = json!({
            "name": "detail",
            "request": {"name": "request.detail", "kwargs": {}},
            "pipelines": [{"name": "pipeline.data_storage", "kwargs": {}}],
        });
        let stage: Stage = serde_json::from_value(json).unwrap();

        assert_eq!(stage.name, "detail");
        assert!(stage.target.is_none());
        assert_eq!(stage.progress, StageResult::default());
    }

    #[test]
    fn for_target_resets_progress() {
        let mut blueprint = Stage::blueprint("detail", TaskSignature::new("request.detail"));
        blueprint.progress.cost = 10.0;

        let slim = SlimTarget::new(json!({"app_id": "a"}).as_object().unwrap().clone());
        let injected = blueprint.for_target(slim.clone());

        assert_eq!(injected.target, Some(slim));
        assert_eq!(injected.progress.cost, 0.0);
    }

    #[test]
    fn merge_pipeline_results_accumulates() {
        let mut progress = StageResult::default();
        let mut first = std::collections::HashMap::new();
        first.insert(
            "storage".to_string(),
            PipelineResult {
                weight: Some(1.0),
                statistics: json!({"new_documents": 1}).as_object().unwrap().clone(),
                metrics: Default::default(),
            },
        );
        progress.merge_pipeline_results(first);

        let mut second = std::collections::HashMap::new();
        second.insert(
            "storage".to_string(),
            PipelineResult {
                weight: Some(2.0),
                statistics: json!({"new_documents": 2}).as_object().unwrap().clone(),
                metrics: Default::default(),
            },
        );
        progress.merge_pipeline_results(second);

        assert_eq!(progress.pipeline_statistic("storage", "new_documents"), 3.0);
    }

    #[test]
    fn is_terminated_checks_any_true() {
        let mut progress = StageResult::default();
        assert!(!progress.is_terminated());
        progress
            .terminated_by
            .insert(TERMINATOR_KEY_TARGET_EXHAUSTED.to_string(), true);
        assert!(progress.is_terminated());
    }
}
