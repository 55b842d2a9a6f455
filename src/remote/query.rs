use serde::Deserialize;
use serde_json::{Value, json};

use crate::types::Row;

/// Row query: an optional `item_id` equality filter plus paging.
/// Pages are numbered from 1 and ordered by `item_id` ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub item_id: Option<String>,
    pub page_size: usize,
    pub page_number: usize,
}

impl Query {
    pub fn page(page_size: usize, page_number: usize) -> Self {
        Self {
            item_id: None,
            page_size,
            page_number,
        }
    }

    pub fn by_item_id(item_id: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id.into()),
            page_size: 0,
            page_number: 0,
        }
    }

    /// The platform's query document.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut query = json!({
            "PAGESIZE": self.page_size,
            "PAGENUM": self.page_number,
            "SORT": [{"ASC": "item_id"}],
        });
        if let Some(id) = &self.item_id {
            query["FILTERS"] = json!([[{"EQ": [{"item_id": id}]}]]);
        }
        query
    }
}

/// One page of rows plus the table's total row count.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page {
    #[serde(rename = "TOTAL", alias = "total", default)]
    pub total: u64,
    #[serde(rename = "DATA", alias = "data", default)]
    pub rows: Vec<Row>,
}
