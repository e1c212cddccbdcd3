use std::ops::Add;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util::{add_json_maps, add_option_f64};

/// The result of invoking one pipeline for one [`RequestResult`](super::RequestResult).
///
/// Addition (§4.5) is the aggregation law used both across pipelines within a
/// step and across steps within a stage: `statistics`/`metrics` add per key
/// (`None` is identity, numeric leaves add, nested objects recurse); `weight`
/// sums with `None` as identity. Associative and commutative on well-formed
/// (numeric-leaf) inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineResult {
    pub weight: Option<f64>,
    #[serde(default)]
    pub statistics: Map<String, Value>,
    #[serde(default)]
    pub metrics: Map<String, Value>,
}

impl PipelineResult {
    /// Creates an empty, identity [`PipelineResult`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Add for PipelineResult {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        &self + &rhs
    }
}

impl Add for &PipelineResult {
    type Output = PipelineResult;

    fn add(self, rhs: Self) -> Self::Output {
        PipelineResult {
            weight: add_option_f64(self.weight, rhs.weight),
            statistics: add_json_maps(&self.statistics, &rhs.statistics),
            metrics: add_json_maps(&self.metrics, &rhs.metrics),
        }
    }
}
