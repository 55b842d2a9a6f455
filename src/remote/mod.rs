//! The platform as the sync engine sees it.
//!
//! [`Remote`] is the narrow contract the engine is written against.
//! [`HttpRemote`] speaks the platform's REST API; tests substitute an
//! in-memory implementation.

mod auth;
mod http;
mod http_client;
mod query;

pub use auth::{CredentialSource, Login, StaticCredentials, login};
pub use http::HttpRemote;
pub use http_client::{HttpClient, classify};
pub use query::{Page, Query};

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::types::{CollectionInfo, Column, Kind, Row};

/// A table whose columns can be altered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table<'a> {
    Collection(&'a str),
    Users,
    Devices,
    Edges,
}

impl Table<'_> {
    /// Table holding the custom columns of a schemaful kind.
    #[must_use]
    pub fn for_kind(kind: Kind) -> Option<Table<'static>> {
        match kind {
            Kind::User => Some(Table::Users),
            Kind::Device => Some(Table::Devices),
            Kind::Edge => Some(Table::Edges),
            _ => None,
        }
    }
}

/// What the platform returns for a freshly created system.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SystemCreated {
    #[serde(alias = "appID", alias = "systemKey")]
    pub system_key: String,
    #[serde(alias = "appSecret", alias = "systemSecret", default)]
    pub system_secret: String,
}

/// Descriptive fields of an existing system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "secret", alias = "systemSecret", default)]
    pub system_secret: String,
}

/// Operations the sync engine needs from the platform.
///
/// Simple kinds (services, libraries, triggers, timers, edges, devices,
/// portals, plugins, adapters, deployments) share the generic `names` /
/// `get` / `create` / `update` / `delete` calls. Collections, users and
/// roles are addressed by ID and have their own calls.
pub trait Remote {
    fn set_token(&mut self, token: &str);

    fn authenticate(&mut self, email: &str, password: &str) -> Result<Login>;

    fn verify_two_factor(&mut self, email: &str, otp_id: &str, code: &str) -> Result<String>;

    fn system_info(&mut self) -> Result<SystemInfo>;

    fn create_system(&mut self, name: &str, description: &str) -> Result<SystemCreated>;

    fn names(&mut self, kind: Kind) -> Result<Vec<String>>;

    fn get(&mut self, kind: Kind, name: &str) -> Result<Value>;

    fn create(&mut self, kind: Kind, name: &str, body: &Value) -> Result<()>;

    fn update(&mut self, kind: Kind, name: &str, body: &Value) -> Result<()>;

    fn delete(&mut self, kind: Kind, name: &str) -> Result<()>;

    fn columns(&mut self, table: Table<'_>) -> Result<Vec<Column>>;

    fn add_column(&mut self, table: Table<'_>, column: &Column) -> Result<()>;

    fn delete_column(&mut self, table: Table<'_>, name: &str) -> Result<()>;

    fn collections(&mut self) -> Result<Vec<CollectionInfo>>;

    /// Returns the new collection's ID.
    fn create_collection(&mut self, name: &str) -> Result<String>;

    fn delete_collection(&mut self, id: &str) -> Result<()>;

    fn rows(&mut self, id: &str, query: &Query) -> Result<Page>;

    fn count(&mut self, id: &str) -> Result<u64>;

    fn create_rows(&mut self, id: &str, rows: &[Row]) -> Result<()>;

    /// Applies `changes` to every row matching `query`; returns how many matched.
    fn update_rows(&mut self, id: &str, query: &Query, changes: &Row) -> Result<u64>;

    fn users(&mut self) -> Result<Vec<Value>>;

    /// Returns the new user's ID.
    fn create_user(&mut self, email: &str, password: &str) -> Result<String>;

    fn update_user(&mut self, id: &str, changes: &Row) -> Result<()>;

    fn delete_user(&mut self, id: &str) -> Result<()>;

    /// Role names assigned to a user.
    fn user_roles(&mut self, id: &str) -> Result<Vec<String>>;

    fn set_user_roles(&mut self, id: &str, add: &[String], remove: &[String]) -> Result<()>;

    fn roles(&mut self) -> Result<Vec<Value>>;

    /// Returns the new role's ID.
    fn create_role(&mut self, name: &str, description: Option<&str>) -> Result<String>;

    fn update_role(&mut self, update: &crate::types::RoleUpdate) -> Result<()>;

    fn delete_role(&mut self, id: &str) -> Result<()>;

    fn adapter_files(&mut self, adapter: &str) -> Result<Vec<String>>;

    fn get_adapter_file(&mut self, adapter: &str, file: &str) -> Result<Value>;

    fn create_adapter_file(&mut self, adapter: &str, body: &Value) -> Result<()>;

    fn update_adapter_file(&mut self, adapter: &str, file: &str, body: &Value) -> Result<()>;

    fn execute_service(&mut self, name: &str, params: &Value) -> Result<Value>;
}

/// Reads a string field under any of `keys`.
pub fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}
