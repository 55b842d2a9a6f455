use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::json::{read_json, write_json};

/// The three name to ID maps kept under `.cb-cli/map/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    Collections,
    Roles,
    Users,
}

impl MapKind {
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            MapKind::Collections => "collections.json",
            MapKind::Roles => "roles.json",
            MapKind::Users => "users.json",
        }
    }
}

/// A `{name: id}` dictionary persisted as one JSON object. Last write wins.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl IdMap {
    /// Loads the map, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            read_json(path)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn save(&self) -> Result<()> {
        write_json(&self.path, &self.entries)
    }

    #[must_use]
    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn name_for(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| v.as_str() == id)
            .map(|(k, _)| k.as_str())
    }

    pub fn put(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.entries.insert(name.into(), id.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    /// Replaces every entry, used when re-targeting another remote.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = (String, String)>) {
        self.entries = entries.into_iter().collect();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        let map = IdMap::load(&temp.path().join("roles.json")).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_put_save_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("map/collections.json");
        let mut map = IdMap::load(&path).unwrap();
        map.put("Widgets", "c1");
        map.put("Gadgets", "c2");
        map.put("Widgets", "c3");
        map.save().unwrap();

        let loaded = IdMap::load(&path).unwrap();
        assert_eq!(loaded.id_for("Widgets"), Some("c3"));
        assert_eq!(loaded.name_for("c2"), Some("Gadgets"));
        assert_eq!(loaded.id_for("Ghost"), None);
        assert_eq!(loaded.len(), 2);
    }
}
