use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::SlimTarget;

/// The result of one request-task round-trip, as produced for the [`Spider`](crate::types)
/// and consumed by the Stage Processor and pipelines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestResult {
    /// A single scraped record, or a batch of them when [`Self::batch`] is set.
    pub result: Value,
    /// Parameters to merge into the next request for this target, or `None`
    /// if the target is exhausted.
    pub subsequent_kwargs: Option<Map<String, Value>>,
    /// Whether [`Self::result`] is an array of records rather than one record.
    #[serde(default)]
    pub batch: bool,
    #[serde(default)]
    pub gain: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub target_not_found: bool,
    pub target_exhausted: Option<bool>,
    pub adjacent_targets: Option<Vec<SlimTarget>>,
}

impl RequestResult {
    /// Normalises [`Self::result`] to a list of raw records using [`Self::batch`].
    #[must_use]
    pub fn records(&self) -> Vec<Value> {
        if self.batch {
            match &self.result {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            }
        } else {
            vec![self.result.clone()]
        }
    }

    /// Whether the spider should stop issuing further requests for this target.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.target_not_found || self.subsequent_kwargs.is_none()
    }

    /// Deduplicated adjacent targets discovered by this request, if any.
    #[must_use]
    pub fn deduplicated_adjacent_targets(&self) -> Vec<SlimTarget> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for target in self.adjacent_targets.iter().flatten() {
            let key = serde_json::to_string(&target.kwargs).unwrap_or_default();
            if seen.insert(key) {
                out.push(target.clone());
            }
        }
        out
    }
}
