use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Kind, Record};

/// `portals/<name>/<name>.json`. `config` is present only for legacy portals
/// that have not been decompressed into `config/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portal {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl Record for Portal {
    const KIND: Kind = Kind::Portal;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Portal {
    /// The config as a JSON value, parsing it when the platform sent it as an embedded string.
    pub fn config_value(&self) -> serde_json::Result<Option<Value>> {
        match &self.config {
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => serde_json::from_str(s).map(Some),
            Some(other) => Ok(Some(other.clone())),
            None => Ok(None),
        }
    }
}

/// `plugins/<name>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl Record for Plugin {
    const KIND: Kind = Kind::Plugin;

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_value_parses_embedded_string() {
        let portal = Portal {
            name: "p".into(),
            config: Some(json!("{\"widgets\": {}}")),
            ..Portal::default()
        };
        assert_eq!(portal.config_value().unwrap(), Some(json!({"widgets": {}})));
    }

    #[test]
    fn test_config_value_empty_string_is_none() {
        let portal = Portal {
            name: "p".into(),
            config: Some(json!("")),
            ..Portal::default()
        };
        assert_eq!(portal.config_value().unwrap(), None);
    }
}
