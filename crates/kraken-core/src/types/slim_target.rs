use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, ErrorKind, Result};

/// Transport projection of a [`Target`](crate::types::Target): `{id?, tags, kwargs}`,
/// used to pass a target across task boundaries without its metadata (queue
/// timelines, per-stage statistics).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SlimTarget {
    pub id: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl SlimTarget {
    /// Creates a new [`SlimTarget`] with no id and no tags.
    #[must_use]
    pub fn new(kwargs: Map<String, Value>) -> Self {
        Self {
            id: None,
            tags: BTreeSet::new(),
            kwargs,
        }
    }

    /// Merges `a` and `b`: tag sets union, `kwargs` keys in `b` override `a`,
    /// and `id` must match when both sides carry one.
    ///
    /// Idempotent for `a == b`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Validation`] if both sides carry a differing `id`.
    pub fn merge(a: &Self, b: &Self) -> Result<Self> {
        let id = match (&a.id, &b.id) {
            (Some(x), Some(y)) if x != y => {
                return Err(Error::new(
                    ErrorKind::Validation,
                    format!("cannot merge SlimTargets with differing ids: {x} != {y}"),
                ));
            }
            (Some(x), _) => Some(x.clone()),
            (None, y) => y.clone(),
        };

        let tags = a.tags.union(&b.tags).cloned().collect();

        let mut kwargs = a.kwargs.clone();
        for (key, value) in &b.kwargs {
            kwargs.insert(key.clone(), value.clone());
        }

        Ok(Self { id, tags, kwargs })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::SlimTarget;

    fn slim(kwargs: serde_json::Value, tags: &[&str]) -> SlimTarget {
        SlimTarget {
            id: None,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            kwargs: kwargs.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let a = slim(json!({"app_id": "a"}), &["featured"]);
        let merged = SlimTarget::merge(&a, &a).unwrap();
        assert_eq!(merged, a);
    }

    #[test]
    fn merge_unions_tags_and_right_biases_kwargs() {
        let a = slim(json!({"app_id": "a", "lang": "en"}), &["featured"]);
        let b = slim(json!({"lang": "de"}), &["new"]);

        let merged = SlimTarget::merge(&a, &b).unwrap();
        assert_eq!(merged.tags.len(), 2);
        assert!(merged.tags.contains("featured"));
        assert!(merged.tags.contains("new"));
        assert_eq!(merged.kwargs["lang"], json!("de"));
        assert_eq!(merged.kwargs["app_id"], json!("a"));
    }

    #[test]
    fn merge_rejects_conflicting_ids() {
        let mut a = slim(json!({}), &[]);
        a.id = Some("1".into());
        let mut b = slim(json!({}), &[]);
        b.id = Some("2".into());

        assert!(SlimTarget::merge(&a, &b).is_err());
    }
}
