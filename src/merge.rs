use serde_json::Value;

/// Deep-merge `higher` onto `lower` (higher priority wins).
///
/// Rules:
/// - mappings merge recursively; a key present in `higher` overrides the
///   same key in `lower`
/// - sequences are replaced wholesale unless the key's dotted path is in
///   `append_paths`, in which case the higher sequence appends
/// - scalars overwrite
/// - `null` in `higher` deletes the key
pub fn deep_merge(lower: &Value, higher: &Value, append_paths: &[&str]) -> Value {
    merge_at(lower, higher, "", append_paths)
}

/// Fold a priority-ordered stack of layers (lowest first) into one value.
pub fn merge_layers(layers: &[&Value], append_paths: &[&str]) -> Value {
    let mut result = Value::Object(serde_json::Map::new());
    for layer in layers {
        result = deep_merge(&result, layer, append_paths);
    }
    result
}

fn merge_at(lower: &Value, higher: &Value, path: &str, append_paths: &[&str]) -> Value {
    match (lower, higher) {
        (Value::Object(low), Value::Object(high)) => {
            let mut merged = low.clone();
            for (key, high_value) in high {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match high_value {
                    Value::Null => {
                        merged.remove(key);
                    }
                    _ => {
                        let next = match merged.get(key) {
                            Some(low_value) => {
                                merge_at(low_value, high_value, &child_path, append_paths)
                            }
                            None => strip_nulls(high_value),
                        };
                        merged.insert(key.clone(), next);
                    }
                }
            }
            Value::Object(merged)
        }
        (Value::Array(low), Value::Array(high)) if append_paths.contains(&path) => {
            let mut merged = low.clone();
            merged.extend(high.iter().cloned());
            Value::Array(merged)
        }
        (_, replacement) => strip_nulls(replacement),
    }
}

/// A `null` that survives into a freshly-introduced subtree carries no
/// delete semantics; drop it so the resolved config never contains nulls.
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn higher_layer_scalars_win() {
        let lower = json!({"instance": {"class": "db.t3.micro", "count": 1}});
        let higher = json!({"instance": {"class": "db.r5.xlarge"}});
        let merged = deep_merge(&lower, &higher, &[]);
        assert_eq!(merged["instance"]["class"], "db.r5.xlarge");
        assert_eq!(merged["instance"]["count"], 1);
    }

    #[test]
    fn sequences_replace_wholesale() {
        let lower = json!({"cors": {"allowOrigins": ["https://a.example"]}});
        let higher = json!({"cors": {"allowOrigins": ["https://b.example"]}});
        let merged = deep_merge(&lower, &higher, &[]);
        assert_eq!(
            merged["cors"]["allowOrigins"],
            json!(["https://b.example"])
        );
    }

    #[test]
    fn marked_paths_append_sequences() {
        let lower = json!({"network": {"securityGroups": ["sg-base"]}});
        let higher = json!({"network": {"securityGroups": ["sg-extra"]}});
        let merged = deep_merge(&lower, &higher, &["network.securityGroups"]);
        assert_eq!(
            merged["network"]["securityGroups"],
            json!(["sg-base", "sg-extra"])
        );
    }

    #[test]
    fn null_deletes_the_key() {
        let lower = json!({"backup": {"retentionDays": 30}, "logging": true});
        let higher = json!({"backup": null});
        let merged = deep_merge(&lower, &higher, &[]);
        assert!(merged.get("backup").is_none());
        assert_eq!(merged["logging"], true);
    }

    #[test]
    fn merge_is_idempotent() {
        let lower = json!({"a": {"b": [1, 2]}, "c": "x"});
        let higher = json!({"a": {"b": [3]}, "d": {"e": null, "f": 1}});
        let once = deep_merge(&lower, &higher, &[]);
        let twice = deep_merge(&once, &higher, &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn layer_stack_respects_priority_order() {
        let fallbacks = json!({"instance": {"class": "db.t3.micro"}, "multiAz": false});
        let platform = json!({"instance": {"class": "db.r5.large"}});
        let overrides = json!({"instance": {"class": "db.r5.4xlarge"}});
        let merged = merge_layers(&[&fallbacks, &platform, &overrides], &[]);
        assert_eq!(merged["instance"]["class"], "db.r5.4xlarge");
        assert_eq!(merged["multiAz"], false);
    }
}
