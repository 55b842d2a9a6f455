use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Kind, Record};

pub const DEFAULT_DEVICE_COLUMNS: &[&str] = &[
    "device_key",
    "name",
    "system_key",
    "type",
    "state",
    "description",
    "enabled",
    "allow_key_auth",
    "active_key",
    "keys",
    "allow_certificate_auth",
    "certificate",
    "created_date",
    "last_active_date",
    "salt",
    "cb_service_account",
    "cb_token",
    "cb_ttl_override",
];

pub const DEFAULT_EDGE_COLUMNS: &[&str] = &[
    "edge_key",
    "novi_system_key",
    "system_key",
    "system_secret",
    "name",
    "description",
    "location",
    "mac_address",
    "public_addr",
    "public_port",
    "local_addr",
    "local_port",
    "broker_port",
    "broker_tls_port",
    "broker_ws_port",
    "broker_wss_port",
    "broker_auth_port",
    "broker_ws_auth_port",
    "first_talked",
    "last_talked",
    "communication_style",
    "last_seen_version",
    "policy_name",
    "resolver_func",
    "sync_edge_tables",
    "token",
    "isConnected",
];

/// `devices/<name>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_key_auth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_certificate_auth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,
    #[serde(flatten)]
    pub columns: BTreeMap<String, Value>,
}

impl Record for Device {
    const KIND: Kind = Kind::Device;

    fn name(&self) -> &str {
        &self.name
    }

    fn retain_columns(&mut self, custom: &BTreeSet<String>) {
        self.columns.retain(|k, _| custom.contains(k));
    }
}

impl Device {
    /// Minimum length the platform accepts for a device's active key.
    pub const MIN_KEY_LEN: usize = 6;

    /// The standard fields alone, for the create call.
    pub fn standard_fields(&self) -> Map<String, Value> {
        let mut std_only = self.clone();
        std_only.columns.clear();
        to_map(&std_only)
    }

    #[must_use]
    pub fn needs_generated_key(&self) -> bool {
        self.active_key
            .as_deref()
            .is_none_or(|k| k.len() < Self::MIN_KEY_LEN)
    }
}

/// `edges/<name>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_port: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_port: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication_style: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver_func: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_edge_tables: Option<Value>,
    #[serde(flatten)]
    pub columns: BTreeMap<String, Value>,
}

impl Record for Edge {
    const KIND: Kind = Kind::Edge;

    fn name(&self) -> &str {
        &self.name
    }

    fn retain_columns(&mut self, custom: &BTreeSet<String>) {
        self.columns.retain(|k, _| custom.contains(k));
    }
}

impl Edge {
    pub fn standard_fields(&self) -> Map<String, Value> {
        let mut std_only = self.clone();
        std_only.columns.clear();
        to_map(&std_only)
    }
}

fn to_map<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_whitelist_strips_transient_fields() {
        let mut device: Device = serde_json::from_value(json!({
            "name": "sensor",
            "type": "thermo",
            "device_key": "k::sensor",
            "system_key": "abc",
            "last_active_date": "2024-01-01",
            "salt": "xyz",
            "floor": 3
        }))
        .unwrap();
        let custom: BTreeSet<String> = ["floor".to_string()].into();
        device.retain_columns(&custom);
        assert_eq!(
            serde_json::to_value(&device).unwrap(),
            json!({"name": "sensor", "type": "thermo", "floor": 3})
        );
    }

    #[test]
    fn test_standard_fields_exclude_custom_columns() {
        let mut device = Device {
            name: "d".into(),
            active_key: Some("abcdefgh".into()),
            ..Device::default()
        };
        device.columns.insert("floor".into(), json!(3));
        let fields = device.standard_fields();
        assert!(fields.contains_key("active_key"));
        assert!(!fields.contains_key("floor"));
    }

    #[test]
    fn test_needs_generated_key() {
        let mut device = Device::default();
        assert!(device.needs_generated_key());
        device.active_key = Some("short".into());
        assert!(device.needs_generated_key());
        device.active_key = Some("longenough".into());
        assert!(!device.needs_generated_key());
    }
}
