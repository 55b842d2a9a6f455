use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Kind, Record};

pub type Row = Map<String, Value>;

/// A schema column as the platform reports it for collections, users, devices and edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    #[serde(rename = "ColumnName")]
    pub name: String,
    #[serde(rename = "ColumnType")]
    pub column_type: String,
    #[serde(rename = "PK", default, skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            primary_key: false,
        }
    }
}

/// Row retention limits for a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutodeletionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_kb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_age_seconds: Option<u64>,
}

/// `data/<name>.json`: schema plus, when exported, the rows under `items`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default)]
    pub schema: Vec<Column>,
    #[serde(default)]
    pub items: Vec<Row>,
    /// Kept in the repo only: a pull carries the local value forward and a
    /// push never sends it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autodelete: Option<AutodeletionSettings>,
}

impl Record for Collection {
    const KIND: Kind = Kind::Collection;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: vec![Column {
                name: "item_id".into(),
                column_type: "string".into(),
                primary_key: true,
            }],
            items: Vec::new(),
            autodelete: None,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> BTreeSet<String> {
        self.schema.iter().map(|c| c.name.clone()).collect()
    }

    /// Sorts rows by `item_id` ascending; rows without one sort first.
    pub fn sort_rows(&mut self) {
        self.items.sort_by(|a, b| item_id(a).cmp(&item_id(b)));
    }

    /// Drops `item_id` from every row.
    pub fn strip_item_ids(&mut self) {
        for row in &mut self.items {
            row.remove("item_id");
        }
    }

    /// Drops row fields that are not schema columns.
    pub fn retain_schema_fields(&mut self) {
        let names = self.column_names();
        if names.is_empty() {
            return;
        }
        for row in &mut self.items {
            row.retain(|k, _| names.contains(k));
        }
    }
}

/// Reads a row's `item_id` when it is a string.
pub fn item_id(row: &Row) -> Option<&str> {
    row.get("item_id").and_then(Value::as_str)
}

/// Summary the platform returns when listing collections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CollectionInfo {
    #[serde(alias = "collectionID", alias = "collection_id")]
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_sort_rows_by_item_id() {
        let mut coll = Collection::new("things");
        coll.items = vec![
            row(json!({"item_id": "c", "v": 3})),
            row(json!({"item_id": "a", "v": 1})),
            row(json!({"item_id": "b", "v": 2})),
        ];
        coll.sort_rows();
        let ids: Vec<_> = coll.items.iter().map(|r| item_id(r).unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_retain_schema_fields() {
        let mut coll = Collection::new("things");
        coll.schema.push(Column::new("foo", "string"));
        coll.items = vec![row(json!({"item_id": "a", "foo": "x", "stray": 1}))];
        coll.retain_schema_fields();
        assert_eq!(Value::Object(coll.items[0].clone()), json!({"item_id": "a", "foo": "x"}));
    }

    #[test]
    fn test_autodelete_tags_match_fields() {
        let settings: AutodeletionSettings = serde_json::from_value(json!({
            "max_size_kb": 10,
            "max_rows": 20,
            "expiration_age_seconds": 30
        }))
        .unwrap();
        assert_eq!(settings.max_size_kb, Some(10));
        assert_eq!(settings.max_rows, Some(20));
        assert_eq!(settings.expiration_age_seconds, Some(30));
    }

    #[test]
    fn test_collection_info_accepts_platform_aliases() {
        let info: CollectionInfo =
            serde_json::from_value(json!({"collectionID": "c1", "name": "things"})).unwrap();
        assert_eq!(info.id, "c1");
    }
}
