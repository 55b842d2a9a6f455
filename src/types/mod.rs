mod adapter;
mod code;
mod collection;
mod deployment;
mod device;
mod portal;
mod role;
mod trigger;
mod user;

pub use adapter::{Adapter, AdapterFile};
pub use code::{Library, Service};
pub use collection::{AutodeletionSettings, Collection, CollectionInfo, Column, Row};
pub use deployment::{Deployment, DeploymentAsset, DeploymentDelta, SetDelta};
pub use device::{DEFAULT_DEVICE_COLUMNS, DEFAULT_EDGE_COLUMNS, Device, Edge};
pub use portal::{Plugin, Portal};
pub use role::{ItemPermission, Level, LevelOnly, NamedLevel, Permissions, Role, RoleChanges, RoleUpdate};
pub use trigger::{EventDefinition, Timer, Trigger};
pub use user::{DEFAULT_USER_COLUMNS, User};

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Every asset kind the repo layout knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Collection,
    Role,
    User,
    Service,
    Library,
    Trigger,
    Timer,
    Edge,
    Device,
    Portal,
    Plugin,
    Adapter,
    Deployment,
}

impl Kind {
    /// Order assets are pushed in: roles reference collections, services may
    /// reference libraries, triggers reference services and deployments
    /// reference everything else.
    pub const PUSH_ORDER: [Kind; 13] = [
        Kind::Collection,
        Kind::Role,
        Kind::User,
        Kind::Service,
        Kind::Library,
        Kind::Trigger,
        Kind::Timer,
        Kind::Edge,
        Kind::Device,
        Kind::Portal,
        Kind::Plugin,
        Kind::Adapter,
        Kind::Deployment,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Kind::Collection => "collection",
            Kind::Role => "role",
            Kind::User => "user",
            Kind::Service => "service",
            Kind::Library => "library",
            Kind::Trigger => "trigger",
            Kind::Timer => "timer",
            Kind::Edge => "edge",
            Kind::Device => "device",
            Kind::Portal => "portal",
            Kind::Plugin => "plugin",
            Kind::Adapter => "adapter",
            Kind::Deployment => "deployment",
        }
    }

    /// Directory under the repo root holding this kind.
    #[must_use]
    pub const fn directory(self) -> &'static str {
        match self {
            Kind::Collection => "data",
            Kind::Role => "roles",
            Kind::User => "users",
            Kind::Service => "code/services",
            Kind::Library => "code/libraries",
            Kind::Trigger => "triggers",
            Kind::Timer => "timers",
            Kind::Edge => "edges",
            Kind::Device => "devices",
            Kind::Portal => "portals",
            Kind::Plugin => "plugins",
            Kind::Adapter => "adapters",
            Kind::Deployment => "deployments",
        }
    }

    /// Kinds stored as `<dir>/<name>/<name>.json` rather than `<dir>/<name>.json`.
    #[must_use]
    pub const fn is_nested(self) -> bool {
        matches!(
            self,
            Kind::Service | Kind::Library | Kind::Portal | Kind::Adapter
        )
    }

    /// Kinds with a `<dir>/schema.json` listing custom columns.
    #[must_use]
    pub const fn has_schema_file(self) -> bool {
        matches!(self, Kind::User | Kind::Device | Kind::Edge)
    }

    /// Columns the platform always defines for this kind; never removed by a schema diff.
    #[must_use]
    pub fn default_columns(self) -> &'static [&'static str] {
        match self {
            Kind::Collection => &["item_id"],
            Kind::User => DEFAULT_USER_COLUMNS,
            Kind::Device => DEFAULT_DEVICE_COLUMNS,
            Kind::Edge => DEFAULT_EDGE_COLUMNS,
            _ => &[],
        }
    }

    #[must_use]
    pub fn parse(label: &str) -> Option<Kind> {
        Kind::PUSH_ORDER
            .into_iter()
            .find(|k| k.label() == label)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A persisted asset. The struct's fields are the kind's whitelist: serializing
/// through it drops everything the platform sends that should not reach disk.
pub trait Record: Clone + Serialize + DeserializeOwned {
    const KIND: Kind;

    fn name(&self) -> &str;

    /// Source code kept in a sibling `.js` file, for kinds that have one.
    fn code(&self) -> Option<&str> {
        None
    }

    fn set_code(&mut self, _code: String) {}

    /// Drops custom columns not present in the kind's schema file.
    fn retain_columns(&mut self, _custom: &BTreeSet<String>) {}
}

/// Projects an arbitrary JSON value through `R`'s whitelist.
pub fn whitelist<R: Record>(value: serde_json::Value) -> serde_json::Result<R> {
    serde_json::from_value(value)
}
