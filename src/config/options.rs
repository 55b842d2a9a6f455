use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Modifiers shared by export, pull and push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Pull collection rows, not only schemas.
    #[serde(default)]
    pub export_rows: bool,
    /// Pull users along with the rest of the system.
    #[serde(default)]
    pub export_users: bool,
    /// Keep `item_id` in exported rows. Without it rows cannot be re-imported round-trip.
    #[serde(default = "default_true")]
    pub export_item_id: bool,
    #[serde(default)]
    pub sort_collections: bool,
    #[serde(default = "default_page_size")]
    pub data_page_size: usize,
    #[serde(skip)]
    pub auto_approve: bool,
    #[serde(skip)]
    pub cleanup: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for Options {
    fn default() -> Self {
        Self {
            export_rows: false,
            export_users: false,
            export_item_id: true,
            sort_collections: false,
            data_page_size: DEFAULT_PAGE_SIZE,
            auto_approve: false,
            cleanup: false,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Options {
    /// Page size clamped to at least one row.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.data_page_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert!(opts.export_item_id);
        assert_eq!(opts.page_size(), 100);
        assert!(!opts.auto_approve);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let opts: Options = serde_json::from_str("{\"sort_collections\": true}").unwrap();
        assert!(opts.sort_collections);
        assert!(opts.export_item_id);
        assert_eq!(opts.data_page_size, 100);
        assert_eq!(opts.max_retries, 3);
    }

    #[test]
    fn test_zero_page_size_clamped() {
        let opts = Options {
            data_page_size: 0,
            ..Options::default()
        };
        assert_eq!(opts.page_size(), 1);
    }
}
