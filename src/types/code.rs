use serde::{Deserialize, Serialize};

use super::{Kind, Record};

/// A code service. `code` lives in `<name>.js` next to the JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_balance: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_restart: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging_enabled: Option<bool>,
    /// Email of the user the service runs as; resolved to a user ID on push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_user: Option<String>,
    #[serde(skip)]
    pub code: String,
}

impl Record for Service {
    const KIND: Kind = Kind::Service;

    fn name(&self) -> &str {
        &self.name
    }

    fn code(&self) -> Option<&str> {
        Some(&self.code)
    }

    fn set_code(&mut self, code: String) {
        self.code = code;
    }
}

impl Service {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip)]
    pub code: String,
}

impl Record for Library {
    const KIND: Kind = Kind::Library;

    fn name(&self) -> &str {
        &self.name
    }

    fn code(&self) -> Option<&str> {
        Some(&self.code)
    }

    fn set_code(&mut self, code: String) {
        self.code = code;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::whitelist;
    use serde_json::json;

    #[test]
    fn test_service_whitelist_drops_server_fields() {
        let remote = json!({
            "name": "A",
            "code": "function A(req, resp) {}",
            "params": ["a", "b"],
            "current_version": 7,
            "last_updated": "2024-01-01T00:00:00Z",
            "system_key": "abc",
            "system_secret": "def",
            "execution_timeout": 60
        });
        let svc: Service = whitelist(remote).unwrap();
        let persisted = serde_json::to_value(&svc).unwrap();
        assert_eq!(
            persisted,
            json!({"name": "A", "params": ["a", "b"], "execution_timeout": 60})
        );
    }
}
