use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Target;

/// A structured query over [`Target`], deserialisable from the JSON filter
/// files accepted by `setup-series --filter FILE` (§6).
///
/// Deliberately small: it covers the predicates the reference deployment's
/// crawls are built from (tag membership, `kwargs` equality, boolean
/// composition) rather than a general query language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TargetFilter {
    /// Matches every target.
    All,
    /// Matches targets carrying the given tag.
    HasTag { tag: String },
    /// Matches targets whose `kwargs[key] == value`.
    KwargsEq { key: String, value: Value },
    /// Matches targets for which every inner filter matches.
    And { filters: Vec<TargetFilter> },
    /// Matches targets for which at least one inner filter matches.
    Or { filters: Vec<TargetFilter> },
    /// Matches targets for which the inner filter does not match.
    Not { filter: Box<TargetFilter> },
}

impl Default for TargetFilter {
    fn default() -> Self {
        Self::All
    }
}

impl TargetFilter {
    /// Evaluates the filter against a [`Target`].
    #[must_use]
    pub fn matches(&self, target: &Target) -> bool {
        match self {
            Self::All => true,
            Self::HasTag { tag } => target.tags.contains(tag),
            Self::KwargsEq { key, value } => target.kwargs.get(key) == Some(value),
            Self::And { filters } => filters.iter().all(|f| f.matches(target)),
            Self::Or { filters } => filters.iter().any(|f| f.matches(target)),
            Self::Not { filter } => !filter.matches(target),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::TargetFilter;
    use crate::types::Target;

    fn target_with(kwargs: serde_json::Value, tags: &[&str]) -> Target {
        let mut target = Target::new(kwargs.as_object().cloned().unwrap_or_default());
        for tag in tags {
            target.tags.insert((*tag).to_string());
        }
        target
    }

    #[test]
    fn all_matches_everything() {
        let target = target_with(json!({"app_id": "a"}), &[]);
        assert!(TargetFilter::All.matches(&target));
    }

    #[test]
    fn kwargs_eq() {
        let target = target_with(json!({"app_id": "a", "lang": "en"}), &[]);
        let filter = TargetFilter::KwargsEq {
            key: "lang".into(),
            value: json!("en"),
        };
        assert!(filter.matches(&target));

        let filter = TargetFilter::KwargsEq {
            key: "lang".into(),
            value: json!("de"),
        };
        assert!(!filter.matches(&target));
    }

    #[test]
    fn and_or_not_compose() {
        let target = target_with(json!({"lang": "en"}), &["featured"]);

        let filter = TargetFilter::And {
            filters: vec![
                TargetFilter::HasTag {
                    tag: "featured".into(),
                },
                TargetFilter::KwargsEq {
                    key: "lang".into(),
                    value: json!("en"),
                },
            ],
        };
        assert!(filter.matches(&target));

        let filter = TargetFilter::Not {
            filter: Box::new(TargetFilter::HasTag {
                tag: "missing".into(),
            }),
        };
        assert!(filter.matches(&target));

        let filter = TargetFilter::Or {
            filters: vec![
                TargetFilter::HasTag {
                    tag: "missing".into(),
                },
                TargetFilter::KwargsEq {
                    key: "lang".into(),
                    value: json!("de"),
                },
            ],
        };
        assert!(!filter.matches(&target));
    }
}
