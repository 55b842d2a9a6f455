//! # cb-cli
//!
//! Keeps a local working copy of a ClearBlade system (code services,
//! libraries, collections, roles, users, triggers, timers, edges, devices,
//! portals, plugins, adapters and deployments) in sync with the platform.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! cb-cli = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use cb_cli::config::{Context, Options};
//! use cb_cli::remote::{HttpRemote, Remote};
//! use cb_cli::store::RepoStore;
//! use cb_cli::sync::{AutoApprove, Engine, Selection};
//! use cb_cli::types::Kind;
//!
//! let store = RepoStore::new("./MySystem", Options::default());
//! let system = store.load_system()?;
//! let mut remote = HttpRemote::new(&system, 3)?;
//! remote.set_token(&store.load_meta()?.token);
//!
//! let ctx = Context::new("./MySystem", system, Options::default());
//! let mut engine = Engine::new(ctx, remote, Box::new(AutoApprove));
//! let mut selection = Selection::new();
//! selection.add_name(Kind::Service, "Hello");
//! let report = engine.push(&selection)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod mqtt;
pub mod portal;
pub mod remote;
pub mod store;
pub mod sync;
pub mod types;
