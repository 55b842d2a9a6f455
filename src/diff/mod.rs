//! Structural comparison of JSON records with per-path ignore lists and
//! key-aware matching of sequence elements.

mod registry;

pub use registry::Registry;

use serde_json::{Map, Value};

const MAX_SHOWN: usize = 80;

/// Accumulates differences between pairs of records.
pub struct Differ<'a> {
    registry: &'a Registry,
    names: Vec<String>,
    messages: Vec<String>,
    count: usize,
    suppress: u32,
}

impl<'a> Differ<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            names: Vec::new(),
            messages: Vec::new(),
            count: 0,
            suppress: 0,
        }
    }

    /// Compares `local` against `remote` under `context` (usually the kind
    /// label) and records every difference. Returns true when equal.
    pub fn compare(&mut self, context: &str, local: &Value, remote: &Value) -> bool {
        self.names.push(context.to_string());
        let equal = self.values(context, local, remote);
        self.names.pop();
        equal
    }

    /// Compares without recording anything.
    pub fn equal(&mut self, context: &str, local: &Value, remote: &Value) -> bool {
        self.suppress += 1;
        let equal = self.values(context, local, remote);
        self.suppress -= 1;
        equal
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.count == 0
    }

    fn report(&mut self, message: String) {
        if self.suppress > 0 {
            return;
        }
        self.count += 1;
        self.messages
            .push(format!("{}: {message}", self.names.join(" > ")));
    }

    fn values(&mut self, path: &str, local: &Value, remote: &Value) -> bool {
        match (local, remote) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => {
                let equal = match (a.as_i64(), b.as_i64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.as_f64() == b.as_f64(),
                };
                if !equal {
                    self.report(format!("{} != {}", shown(local), shown(remote)));
                }
                equal
            }
            (Value::Object(a), Value::Object(b)) => self.maps(path, a, b),
            (Value::Array(a), Value::Array(b)) => self.slices(path, a, b),
            _ if local == remote => true,
            _ => {
                self.report(format!("{} != {}", shown(local), shown(remote)));
                false
            }
        }
    }

    fn maps(&mut self, path: &str, local: &Map<String, Value>, remote: &Map<String, Value>) -> bool {
        let mut keys: Vec<&String> = local.keys().chain(remote.keys()).collect();
        keys.sort();
        keys.dedup();

        let mut equal = true;
        for key in keys {
            if self.registry.is_ignored(path, key) {
                continue;
            }
            let child = format!("{path}:{key}");
            self.names.push(key.clone());
            match (local.get(key), remote.get(key)) {
                (Some(a), Some(b)) => equal &= self.values(&child, a, b),
                (Some(a), None) => {
                    self.report(format!("only in local: {}", shown(a)));
                    equal = false;
                }
                (None, Some(b)) => {
                    self.report(format!("only in remote: {}", shown(b)));
                    equal = false;
                }
                (None, None) => {}
            }
            self.names.pop();
        }
        equal
    }

    fn slices(&mut self, path: &str, local: &[Value], remote: &[Value]) -> bool {
        match self.registry.unique_key(path) {
            Some(key) => {
                let key = key.to_string();
                self.keyed_slices(path, &key, local, remote)
            }
            None => self.scanned_slices(path, local, remote),
        }
    }

    fn keyed_slices(&mut self, path: &str, key: &str, local: &[Value], remote: &[Value]) -> bool {
        let mut matched = vec![false; remote.len()];
        let mut equal = true;

        for item in local {
            let Some(id) = item.get(key) else {
                equal &= self.scan_one(path, item, remote, &mut matched);
                continue;
            };
            let label = format!("[{key}={}]", plain(id));
            match remote
                .iter()
                .enumerate()
                .find(|(i, r)| !matched[*i] && r.get(key) == Some(id))
            {
                Some((i, other)) => {
                    matched[i] = true;
                    self.names.push(label);
                    equal &= self.values(path, item, other);
                    self.names.pop();
                }
                None => {
                    self.report(format!("{label} only in local"));
                    equal = false;
                }
            }
        }

        equal & self.report_unmatched(key, remote, &matched)
    }

    fn scanned_slices(&mut self, path: &str, local: &[Value], remote: &[Value]) -> bool {
        let mut matched = vec![false; remote.len()];
        let mut equal = true;
        for item in local {
            equal &= self.scan_one(path, item, remote, &mut matched);
        }
        equal & self.report_unmatched("", remote, &matched)
    }

    fn scan_one(&mut self, path: &str, item: &Value, remote: &[Value], matched: &mut [bool]) -> bool {
        let found = (0..remote.len()).find(|&i| !matched[i] && self.equal(path, item, &remote[i]));
        match found {
            Some(i) => {
                matched[i] = true;
                true
            }
            None => {
                self.report(format!("only in local: {}", shown(item)));
                false
            }
        }
    }

    fn report_unmatched(&mut self, key: &str, remote: &[Value], matched: &[bool]) -> bool {
        let mut equal = true;
        for (item, _) in remote.iter().zip(matched).filter(|(_, m)| !**m) {
            let label = match item.get(key) {
                Some(id) if !key.is_empty() => format!("[{key}={}]", plain(id)),
                _ => shown(item),
            };
            self.report(format!("only in remote: {label}"));
            equal = false;
        }
        equal
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn shown(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > MAX_SHOWN {
        let cut: String = text.chars().take(MAX_SHOWN).collect();
        format!("{cut}...")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_compare_numerically() {
        let reg = Registry::new();
        let mut differ = Differ::new(&reg);
        assert!(differ.compare("x", &json!({"a": 1}), &json!({"a": 1.0})));
        assert!(differ.compare("x", &json!(null), &json!(null)));
        assert!(!differ.compare("x", &json!({"a": 1}), &json!({"a": 2})));
        assert_eq!(differ.count(), 1);
    }

    #[test]
    fn test_missing_keys_reported_with_path() {
        let reg = Registry::new();
        let mut differ = Differ::new(&reg);
        differ.compare("service", &json!({"name": "A", "params": []}), &json!({"name": "A"}));
        assert_eq!(differ.messages(), ["service > params: only in local: []"]);
    }

    #[test]
    fn test_ignored_fields_skipped() {
        let reg = Registry::standard();
        let mut differ = Differ::new(&reg);
        assert!(differ.compare(
            "service",
            &json!({"name": "A", "current_version": 1}),
            &json!({"name": "A", "current_version": 9, "last_updated": "now"})
        ));
    }

    #[test]
    fn test_keyed_matching_ignores_order() {
        let reg = Registry::standard();
        let mut differ = Differ::new(&reg);
        let local = json!({"Name": "r", "Permissions": {"CodeServices": [
            {"Name": "a", "Level": 1}, {"Name": "b", "Level": 2}
        ]}});
        let remote = json!({"Name": "r", "Permissions": {"CodeServices": [
            {"Name": "b", "Level": 2}, {"Name": "a", "Level": 1}
        ]}});
        assert!(differ.compare("role", &local, &remote));
    }

    #[test]
    fn test_keyed_matching_reports_level_change() {
        let reg = Registry::standard();
        let mut differ = Differ::new(&reg);
        let local = json!({"Permissions": {"CodeServices": [{"Name": "a", "Level": 1}]}});
        let remote = json!({"Permissions": {"CodeServices": [{"Name": "a", "Level": 3}, {"Name": "z", "Level": 1}]}});
        assert!(!differ.compare("role", &local, &remote));
        assert_eq!(differ.count(), 2);
        assert!(differ.messages()[0].contains("[Name=a]"));
        assert!(differ.messages()[1].contains("only in remote: [Name=z]"));
    }

    #[test]
    fn test_unkeyed_slices_scan_for_equal_elements() {
        let reg = Registry::new();
        let mut differ = Differ::new(&reg);
        assert!(differ.compare("x", &json!([1, {"a": 2}, "s"]), &json!(["s", 1, {"a": 2}])));
        assert!(!differ.compare("x", &json!([1, 2]), &json!([1, 3])));
        assert_eq!(differ.count(), 2);
    }

    #[test]
    fn test_suppressed_comparison_does_not_count() {
        let reg = Registry::new();
        let mut differ = Differ::new(&reg);
        assert!(!differ.equal("x", &json!(1), &json!(2)));
        assert!(differ.is_clean());
    }
}
