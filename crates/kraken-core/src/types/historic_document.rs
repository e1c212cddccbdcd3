use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[cfg(feature = "tracing")]
use crate::TRACING_TARGET_HISTORY as TARGET;
use crate::types::Timestamp;

/// `CFM_MAX_AGE` expressed in days (§4.1): the continuous freshness model
/// saturates to `1.0` once the gap between the last two witnesses reaches
/// this many days.
pub const CFM_MAX_AGE_DAYS: f64 = 356.0;
const CFM_MAX_AGE_SECONDS: f64 = CFM_MAX_AGE_DAYS * 86_400.0;

/// A backward delta: applied to the current payload, reconstructs the
/// payload as observed at `witnesses[-2]` (§3, §6, §8 invariant 3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patch {
    pub crawl: String,
    pub timestamp: Timestamp,
    pub changes: Vec<Value>,
}

/// Timestamped proof that a payload state was observed (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Witness {
    pub timestamp: Timestamp,
}

impl Witness {
    #[must_use]
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }
}

/// A concrete document payload persisted as a [`HistoricDocument`].
///
/// Generalises the original's per-source `document_type` dynamic dispatch
/// (Detail, Permission, Review, DataSafety) into one trait every concrete
/// payload implements (§4.1, §9).
pub trait HistoricPayload: Serialize + DeserializeOwned + Clone + PartialEq {
    /// The store primary key this payload is identified by.
    fn primary_key(&self) -> String;

    /// Per-field weights declared for the Weighted Change Frequency model.
    /// Not wired into the default metric set (§9 Open Questions).
    fn wcf_weights(&self) -> Map<String, Value> {
        Map::new()
    }

    /// This document's contribution to a pipeline's total weight.
    fn weight(&self) -> f64 {
        0.0
    }
}

/// Converts a raw, untyped record plus a `document_type` tag into a boxed
/// concrete payload, mirroring the original's per-source document factory task.
pub trait DocumentFactory<P: HistoricPayload> {
    /// Builds a concrete payload from `document_type` and a raw JSON record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::Validation`] if `document_type` is unknown
    /// or `raw` does not match the expected shape.
    fn build(&self, document_type: &str, raw: Value) -> crate::Result<P>;
}

/// Any persisted payload `P`, wrapped with its version-control information:
/// `witnesses` (ordered observations) and `updates` (backward deltas) (§3, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricDocument<P> {
    pub payload: P,
    #[serde(default)]
    pub witnesses: Vec<Witness>,
    #[serde(default)]
    pub updates: Vec<Patch>,
}

impl<P: HistoricPayload> HistoricDocument<P> {
    /// Wraps a freshly observed payload with no history, as produced before its first save.
    #[must_use]
    pub fn observed(payload: P) -> Self {
        Self {
            payload,
            witnesses: Vec::new(),
            updates: Vec::new(),
        }
    }

    /// Merges this freshly observed document with its persisted predecessor
    /// (if any) and appends a witness, per the algorithm in §4.1.
    ///
    /// This is the pure half of the `save` contract: the caller (the Data
    /// Storage Pipeline, backed by a [`crate::store::DataStore`]) is
    /// responsible for the lookup before calling this and the persist after.
    ///
    /// Returns the merged document ready to persist, along with
    /// `(new_document, changes_observed, metrics)`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, persisted), fields(crawl)))]
    #[must_use]
    pub fn merge_and_witness(
        mut self,
        persisted: Option<Self>,
        crawl: &str,
        now: Timestamp,
    ) -> (Self, bool, usize, Map<String, Value>) {
        let (new_document, patch) = match persisted {
            None => (true, None),
            Some(predecessor) => {
                self.witnesses = predecessor.witnesses;
                self.updates = predecessor.updates;

                if self.payload == predecessor.payload {
                    (false, None)
                } else {
                    let changes = diff_backward(&self.payload, &predecessor.payload);
                    let patch = Patch {
                        crawl: crawl.to_string(),
                        timestamp: now,
                        changes,
                    };
                    self.updates.insert(0, patch.clone());
                    (false, Some(patch))
                }
            }
        };

        self.witnesses.push(Witness::new(now));

        let changes_observed = patch.as_ref().map_or(0, |p| p.changes.len());
        let metrics = self.metrics(new_document, changes_observed, patch.as_ref());

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: TARGET,
            new_document,
            changes_observed,
            witnesses = self.witnesses.len(),
            "merged historic document"
        );

        (self, new_document, changes_observed, metrics)
    }

    /// Computes the registered metric set: BFM and CFM by default (§4.1, §9).
    #[must_use]
    pub fn metrics(&self, new_document: bool, changes_observed: usize, patch: Option<&Patch>) -> Map<String, Value> {
        let mut metrics = Map::new();
        metrics.insert(
            "bfm".to_string(),
            Value::from(bfm_model(new_document, changes_observed)),
        );
        metrics.insert(
            "cfm".to_string(),
            Value::from(self.cfm_model(new_document, patch)),
        );
        metrics
    }

    /// Continuous Freshness Model (§4.1): `1` if new, `0` if unchanged, else
    /// `min(1, Δt / CFM_MAX_AGE)` between the last two witnesses.
    #[must_use]
    pub fn cfm_model(&self, new_document: bool, patch: Option<&Patch>) -> f64 {
        if new_document {
            return 1.0;
        }
        if patch.is_none() {
            return 0.0;
        }
        let len = self.witnesses.len();
        if len < 2 {
            return 1.0;
        }
        let latest = self.witnesses[len - 1].timestamp;
        let previous = self.witnesses[len - 2].timestamp;
        (latest.seconds_since(previous) / CFM_MAX_AGE_SECONDS).min(1.0)
    }

    /// Weighted Change Frequency model (§4.1). Available but not registered
    /// in [`Self::metrics`] by default (§9 Open Questions).
    #[must_use]
    pub fn wcf_model(&self, new_document: bool, patch: Option<&Patch>) -> f64 {
        if new_document {
            return 1.0;
        }
        let Some(patch) = patch else {
            return 0.0;
        };

        let weights = self.payload.wcf_weights();
        let total_weight: f64 = weights.values().filter_map(Value::as_f64).sum();
        if total_weight <= 0.0 {
            return 0.0;
        }

        let mut wcf = 0.0;
        for (key, value) in &weights {
            let prefix = format!("/{key}");
            let touched = patch.changes.iter().any(|change| {
                change
                    .get("path")
                    .and_then(Value::as_str)
                    .is_some_and(|path| path.starts_with(&prefix))
            });
            if touched {
                wcf += value.as_f64().unwrap_or(0.0) / total_weight;
            }
        }
        wcf
    }
}

/// Binary Freshness Model (§4.1): `1` if new or changed, else `0`.
#[must_use]
pub fn bfm_model(new_document: bool, changes_observed: usize) -> f64 {
    if new_document || changes_observed > 0 {
        1.0
    } else {
        0.0
    }
}

/// Diffs `new -> old` over the canonical JSON form of both payloads, so that
/// the resulting patch, applied to `new`, reconstructs `old` (§4.1).
fn diff_backward<P: Serialize>(new: &P, old: &P) -> Vec<Value> {
    let new_value = serde_json::to_value(new).unwrap_or(Value::Null);
    let old_value = serde_json::to_value(old).unwrap_or(Value::Null);
    let patch = json_patch::diff(&new_value, &old_value);
    patch
        .0
        .into_iter()
        .map(|op| serde_json::to_value(op).unwrap_or(Value::Null))
        .collect()
}
