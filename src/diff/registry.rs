use std::collections::{HashMap, HashSet};

/// Per-path matching rules for the differ.
///
/// A path is the context name followed by the object keys walked to reach a
/// value, joined with `:` (`role:Permissions:CodeServices`). Array elements
/// share their array's path.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    unique_keys: HashMap<String, String>,
    ignores: HashMap<String, HashSet<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for every asset kind the sync engine compares.
    pub fn standard() -> Self {
        let mut reg = Self::new();

        for list in ["CodeServices", "Collections", "Portals", "Topics"] {
            reg.register_unique_key(&format!("role:Permissions:{list}"), "Name");
        }
        reg.register_unique_key("collection:schema", "ColumnName");
        reg.register_unique_key("collection:items", "item_id");
        reg.register_unique_key("schema:columns", "ColumnName");
        reg.register_unique_key("deployment:assets", "asset_id");
        reg.register_unique_key("portal:config:pages", "name");

        let code_ignores = [
            "current_version",
            "version",
            "last_updated",
            "modified_by",
            "created_at",
            "updated_at",
            "system_key",
            "system_secret",
            "source",
            "code",
        ];
        reg.register_ignores("service", &code_ignores);
        reg.register_ignores("library", &code_ignores);
        reg.register_ignores("role", &["ID", "Type"]);
        reg.register_ignores("role:Permissions:Collections", &["ID"]);
        reg.register_ignores(
            "user",
            &["user_id", "creation_date", "cb_token", "cb_ttl_override", "password"],
        );
        reg.register_ignores(
            "device",
            &["device_key", "system_key", "created_date", "last_active_date", "salt", "cb_token"],
        );
        reg.register_ignores(
            "edge",
            &[
                "edge_key",
                "system_key",
                "system_secret",
                "token",
                "first_talked",
                "last_talked",
                "last_seen_version",
                "isConnected",
            ],
        );
        reg.register_ignores("trigger", &["system_key", "system_secret", "def_module", "def_name"]);
        reg.register_ignores("timer", &["system_key", "system_secret", "timer_key", "user_id", "user_token"]);
        reg.register_ignores("portal", &["last_updated", "system_key"]);
        reg.register_ignores("plugin", &["last_updated", "system_key"]);
        reg.register_ignores("adapter", &["system_key"]);
        reg.register_ignores("deployment", &["system_key", "id"]);
        reg
    }

    pub fn register_unique_key(&mut self, path: &str, key: &str) {
        self.unique_keys.insert(path.to_string(), key.to_string());
    }

    pub fn register_ignores(&mut self, path: &str, fields: &[&str]) {
        self.ignores
            .entry(path.to_string())
            .or_default()
            .extend(fields.iter().map(|f| f.to_string()));
    }

    #[must_use]
    pub fn unique_key(&self, path: &str) -> Option<&str> {
        self.unique_keys.get(path).map(String::as_str)
    }

    #[must_use]
    pub fn is_ignored(&self, path: &str, field: &str) -> bool {
        self.ignores.get(path).is_some_and(|set| set.contains(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registrations() {
        let reg = Registry::standard();
        assert_eq!(reg.unique_key("role:Permissions:CodeServices"), Some("Name"));
        assert_eq!(reg.unique_key("role:Permissions"), None);
        assert!(reg.is_ignored("service", "current_version"));
        assert!(!reg.is_ignored("service", "params"));
        assert!(reg.is_ignored("user", "user_id"));
    }
}
