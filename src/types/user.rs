use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Kind, Record};

pub const DEFAULT_USER_COLUMNS: &[&str] = &[
    "user_id",
    "email",
    "creation_date",
    "cb_service_account",
    "cb_token",
    "cb_ttl_override",
    "password",
];

/// `users/<email>.json`: the email plus the values of custom user columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    #[serde(flatten)]
    pub columns: BTreeMap<String, Value>,
}

impl Record for User {
    const KIND: Kind = Kind::User;

    fn name(&self) -> &str {
        &self.email
    }

    fn retain_columns(&mut self, custom: &BTreeSet<String>) {
        self.columns.retain(|k, _| custom.contains(k));
    }
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            columns: BTreeMap::new(),
        }
    }
}
