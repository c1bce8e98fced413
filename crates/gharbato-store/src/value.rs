//! Server-side value placeholders.
//!
//! Writers put `{".sv": "timestamp"}` where the server clock should be used.
//! The store replaces every placeholder with its own time at write time, so
//! records never carry a client clock.

use serde_json::{Map, Value};

pub const SERVER_VALUE_KEY: &str = ".sv";
pub const SERVER_TIMESTAMP: &str = "timestamp";

/// Placeholder resolved to the store's clock on write.
pub fn server_timestamp() -> Value {
    let mut placeholder = Map::new();
    placeholder.insert(SERVER_VALUE_KEY.to_string(), Value::from(SERVER_TIMESTAMP));
    Value::Object(placeholder)
}

pub fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.len() == 1 && map.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some(SERVER_TIMESTAMP)
        }
        _ => false,
    }
}

/// Replace every server-timestamp placeholder in `value` with `now_millis`.
pub fn resolve_server_values(value: &mut Value, now_millis: i64) {
    if is_server_timestamp(value) {
        *value = Value::from(now_millis);
        return;
    }
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                resolve_server_values(child, now_millis);
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                resolve_server_values(child, now_millis);
            }
        }
        _ => {}
    }
}

/// Shallow-merge `fields` into `target`, turning a non-object into one.
pub(crate) fn merge_fields(target: &mut Value, fields: Map<String, Value>) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        map.extend(fields);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn resolves_nested_placeholders() {
        let mut value = json!({
            "sentAt": server_timestamp(),
            "meta": { "editedAt": server_timestamp(), "tags": [server_timestamp(), 1] },
            "body": "hi",
        });
        resolve_server_values(&mut value, 77);
        assert_eq!(
            value,
            json!({"sentAt": 77, "meta": {"editedAt": 77, "tags": [77, 1]}, "body": "hi"})
        );
    }

    #[test]
    fn leaves_lookalikes_alone() {
        let mut value = json!({".sv": "increment"});
        resolve_server_values(&mut value, 5);
        assert_eq!(value, json!({".sv": "increment"}));

        let mut value = json!({".sv": "timestamp", "extra": 1});
        resolve_server_values(&mut value, 5);
        assert_eq!(value, json!({".sv": "timestamp", "extra": 1}));
    }

    #[test]
    fn merge_replaces_scalars() {
        let mut target = json!("scalar");
        let mut fields = Map::new();
        fields.insert("read".into(), json!(true));
        merge_fields(&mut target, fields);
        assert_eq!(target, json!({"read": true}));
    }
}
