//! Parser payloads inside widget settings.
//!
//! A setting is parser-shaped when it is an object carrying `dataType`. Each
//! of its `incoming_parser` / `outgoing_parser` sides holds a `value` that is
//! either a JavaScript string or an object whose first `HTML`, `JavaScript`
//! and `CSS` strings hold the sources.

use serde_json::{Map, Value};

pub const SIDES: [&str; 2] = ["incoming_parser", "outgoing_parser"];

/// Source keys inside an object payload and the file each one is written to.
pub const SOURCE_KEYS: [(&str, &str); 3] = [
    ("HTML", "index.html"),
    ("JavaScript", "index.js"),
    ("CSS", "index.css"),
];

/// File holding a plain string payload.
pub const STRING_FILE: &str = "index.js";

pub fn is_parser_setting(setting: &Value) -> bool {
    setting
        .as_object()
        .is_some_and(|obj| obj.contains_key("dataType"))
}

/// Shape of one parser side's payload.
pub enum Payload {
    Source(String),
    /// `(file name, JSON pointer to the string)` for every source key found.
    Sources(Vec<(&'static str, String)>),
    Other,
}

pub fn payload(value: &Value) -> Payload {
    match value {
        Value::String(s) => Payload::Source(s.clone()),
        Value::Object(_) => Payload::Sources(
            SOURCE_KEYS
                .iter()
                .filter_map(|(key, file)| find_string(value, key, String::new()).map(|p| (*file, p)))
                .collect(),
        ),
        _ => Payload::Other,
    }
}

/// JSON pointer to the first string stored under `key`, walking objects in
/// key order and arrays in index order.
fn find_string(value: &Value, key: &str, prefix: String) -> Option<String> {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let here = format!("{prefix}/{}", escape(k));
                if k == key && v.is_string() {
                    return Some(here);
                }
                if let Some(found) = find_string(v, key, here) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, v)| find_string(v, key, format!("{prefix}/{i}"))),
        _ => None,
    }
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// The `value` of a parser side, if the side is present.
pub fn side_value<'a>(setting: &'a Map<String, Value>, side: &str) -> Option<&'a Value> {
    setting.get(side)?.as_object()?.get("value")
}

pub fn side_value_mut<'a>(setting: &'a mut Map<String, Value>, side: &str) -> Option<&'a mut Value> {
    setting.get_mut(side)?.as_object_mut()?.get_mut("value")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_first_string_in_key_order() {
        let value = json!({
            "b": {"HTML": "<p>second</p>"},
            "a": [{"HTML": {"nested": 1}}, {"HTML": "<p>first</p>"}]
        });
        match payload(&value) {
            Payload::Sources(found) => {
                assert_eq!(found, vec![("index.html", "/a/1/HTML".to_string())]);
            }
            _ => panic!("expected sources"),
        }
    }

    #[test]
    fn test_pointer_escaping() {
        let value = json!({"a/b": {"CSS": "x"}});
        match payload(&value) {
            Payload::Sources(found) => {
                assert_eq!(found[0].1, "/a~1b/CSS");
                assert_eq!(value.pointer(&found[0].1), Some(&json!("x")));
            }
            _ => panic!("expected sources"),
        }
    }

    #[test]
    fn test_parser_setting_detection() {
        assert!(is_parser_setting(&json!({"dataType": "JSON"})));
        assert!(!is_parser_setting(&json!({"value": 1})));
        assert!(!is_parser_setting(&json!("dataType")));
    }
}
