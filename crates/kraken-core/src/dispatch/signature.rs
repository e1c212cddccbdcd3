use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A task "signature" as a first-class value: `{task_name, kwargs}`, routed
/// through the [`TaskDispatcher`](super::TaskDispatcher) by the `task_name`
/// prefix (`crawler.*`, `pipeline.*`, `callback.*`, `terminator.*`, `request.*`).
///
/// Must serialise and round-trip through the broker byte-for-byte, hence the
/// plain `serde_json` representation rather than a richer in-process closure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSignature {
    pub name: String,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl TaskSignature {
    /// Creates a new signature with no keyword arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kwargs: Map::new(),
        }
    }

    /// Returns a clone of this signature with `key` set to `value` in `kwargs`.
    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Returns a clone of this signature with `kwargs` merged in, right-biased.
    #[must_use]
    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        for (key, value) in kwargs {
            self.kwargs.insert(key, value);
        }
        self
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::TaskSignature;

    #[test]
    fn builds_and_merges_kwargs() {
        let sig = TaskSignature::new("request.detail")
            .with_kwarg("app_id", "a")
            .with_kwargs(json!({"lang": "en"}).as_object().unwrap().clone());

        assert_eq!(sig.name, "request.detail");
        assert_eq!(sig.kwargs["app_id"], json!("a"));
        assert_eq!(sig.kwargs["lang"], json!("en"));
    }

    #[test]
    fn round_trips_through_json() {
        let sig = TaskSignature::new("pipeline.data_storage").with_kwarg("crawl_id", "c1");
        let encoded = serde_json::to_string(&sig).unwrap();
        let decoded: TaskSignature = serde_json::from_str(&encoded).unwrap();
        assert_eq!(sig, decoded);
    }
}
