//! Terminators (C9, §4.8): pure predicates over a Stage's running progress.
//!
//! Declared on a [`Stage`] as [`TaskSignature`]s (so a Series blueprint can
//! configure `limit`/`overlap`/`budget` parameters from JSON), but evaluated
//! locally by the Stage Processor rather than dispatched: each of the three
//! built-in terminators is a pure function of `stage.progress` and needs no
//! external collaborator.

use kraken_core::dispatch::TaskSignature;
use kraken_core::types::StageResult;
use kraken_core::{Error, ErrorKind, Result};

/// Dotted task name recognised as the Static terminator.
pub const TERMINATOR_STATIC: &str = "terminator.static";
/// Dotted task name recognised as the Overlap terminator.
pub const TERMINATOR_OVERLAP: &str = "terminator.overlap";
/// Dotted task name recognised as the Budget terminator.
pub const TERMINATOR_BUDGET: &str = "terminator.budget";

const DEFAULT_PIPELINE: &str = "pipeline.data_storage";

/// One of the three built-in terminator predicates (§4.8), parsed from a
/// [`TaskSignature`]'s `kwargs`.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    /// Fires once `processed_documents >= limit`.
    Static { pipeline: String, limit: u64 },
    /// Fires once `processed_documents - new_documents >= overlap`.
    Overlap { pipeline: String, overlap: u64 },
    /// Fires once `processed_documents * budget_dec > budget + new_documents * budget_inc`.
    Budget {
        pipeline: String,
        budget: f64,
        budget_inc: f64,
        budget_dec: f64,
    },
}

fn pipeline_name(signature: &TaskSignature) -> String {
    signature
        .kwargs
        .get("pipeline")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(DEFAULT_PIPELINE)
        .to_string()
}

fn require_f64(signature: &TaskSignature, key: &str) -> Result<f64> {
    signature
        .kwargs
        .get(key)
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| Error::new(ErrorKind::Validation, format!("terminator '{}' missing '{key}'", signature.name)))
}

impl Terminator {
    /// Parses a built-in terminator from its declared [`TaskSignature`].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Validation`] if `signature.name` is not one of
    /// the three built-in terminator names, or a required parameter is missing.
    pub fn from_signature(signature: &TaskSignature) -> Result<Self> {
        match signature.name.as_str() {
            TERMINATOR_STATIC => Ok(Self::Static {
                pipeline: pipeline_name(signature),
                limit: require_f64(signature, "limit")? as u64,
            }),
            TERMINATOR_OVERLAP => Ok(Self::Overlap {
                pipeline: pipeline_name(signature),
                overlap: require_f64(signature, "overlap")? as u64,
            }),
            TERMINATOR_BUDGET => Ok(Self::Budget {
                pipeline: pipeline_name(signature),
                budget: require_f64(signature, "budget")?,
                budget_inc: require_f64(signature, "budget_inc")?,
                budget_dec: require_f64(signature, "budget_dec")?,
            }),
            other => Err(Error::new(ErrorKind::Validation, format!("unknown terminator task '{other}'"))),
        }
    }

    /// Evaluates this terminator against `progress` (§4.8).
    #[must_use]
    pub fn fires(&self, progress: &StageResult) -> bool {
        match self {
            Self::Static { pipeline, limit } => {
                progress.pipeline_statistic(pipeline, "processed_documents") >= *limit as f64
            }
            Self::Overlap { pipeline, overlap } => {
                let processed = progress.pipeline_statistic(pipeline, "processed_documents");
                let new = progress.pipeline_statistic(pipeline, "new_documents");
                processed - new >= *overlap as f64
            }
            Self::Budget {
                pipeline,
                budget,
                budget_inc,
                budget_dec,
            } => {
                let processed = progress.pipeline_statistic(pipeline, "processed_documents");
                let new_documents = progress.pipeline_statistic(pipeline, "new_documents");
                let acquired = budget + new_documents * budget_inc;
                let spent = processed * budget_dec;
                spent > acquired
            }
        }
    }
}
