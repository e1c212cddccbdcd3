use serde_json::{Map, Value};

/// Adds two optional `f64`-like JSON numbers: `None` is identity, otherwise numeric `+`.
pub fn add_option_f64(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (None, x) | (x, None) => x,
        (Some(a), Some(b)) => Some(a + b),
    }
}

/// Recursively adds two JSON object maps per the `PipelineResult` addition law:
/// per-key addition, `null`/missing is identity, numbers add, nested objects
/// recurse, and any other value pair is right-biased (the newer value wins).
///
/// Associative and commutative on well-formed (numeric-leaf) inputs.
pub fn add_json_maps(a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
    let mut out = a.clone();

    for (key, b_value) in b {
        match out.get(key).cloned() {
            None => {
                out.insert(key.clone(), b_value.clone());
            }
            Some(a_value) => {
                out.insert(key.clone(), add_json_values(&a_value, b_value));
            }
        }
    }

    out
}

fn add_json_values(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Null, x) => x.clone(),
        (x, Value::Null) => x.clone(),
        (Value::Object(a), Value::Object(b)) => Value::Object(add_json_maps(a, b)),
        (Value::Number(a), Value::Number(b)) => {
            let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
            serde_json::Number::from_f64(sum).map_or(Value::Null, Value::Number)
        }
        // Non-numeric, non-object leaves: not well-formed for the addition law,
        // keep the newer observation rather than panic.
        (_, b) => b.clone(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn option_f64_identity() {
        assert_eq!(add_option_f64(None, Some(4.0)), Some(4.0));
        assert_eq!(add_option_f64(Some(4.0), None), Some(4.0));
        assert_eq!(add_option_f64(None, None), None);
    }

    #[test]
    fn option_f64_sums() {
        assert_eq!(add_option_f64(Some(1.5), Some(2.5)), Some(4.0));
    }

    #[test]
    fn maps_add_per_key() {
        let a = json!({"new_documents": 1, "metrics": {"bfm": 1}}).as_object().unwrap().clone();
        let b = json!({"new_documents": 2, "metrics": {"bfm": 0, "cfm": 1}})
            .as_object()
            .unwrap()
            .clone();

        let sum = add_json_maps(&a, &b);
        assert_eq!(sum["new_documents"], json!(3));
        assert_eq!(sum["metrics"]["bfm"], json!(1));
        assert_eq!(sum["metrics"]["cfm"], json!(1));
    }

    #[test]
    fn maps_add_is_commutative_and_associative() {
        let a = json!({"x": 1, "nested": {"y": 2}}).as_object().unwrap().clone();
        let b = json!({"x": 2, "nested": {"y": 3}}).as_object().unwrap().clone();
        let c = json!({"x": 3, "nested": {"z": 1}}).as_object().unwrap().clone();

        let ab_c = add_json_maps(&add_json_maps(&a, &b), &c);
        let a_bc = add_json_maps(&a, &add_json_maps(&b, &c));
        assert_eq!(ab_c, a_bc);

        let ab = add_json_maps(&a, &b);
        let ba = add_json_maps(&b, &a);
        assert_eq!(ab, ba);
    }

    #[test]
    fn empty_is_identity() {
        let a = json!({"x": 1}).as_object().unwrap().clone();
        let empty = Map::new();
        assert_eq!(add_json_maps(&a, &empty), a);
        assert_eq!(add_json_maps(&empty, &a), a);
    }
}
