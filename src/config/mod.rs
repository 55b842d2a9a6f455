mod credentials;
mod options;
mod system;

pub use credentials::{auth_file_path, delete_cached_token, load_cached_token, save_cached_token};
pub use options::Options;
pub use system::{Meta, SystemConfig, find_repo_root};

use std::path::PathBuf;

/// Name of the anchor file marking the root of a system repo.
pub const SYSTEM_FILE: &str = "system.json";

/// Hidden directory holding the cached token and the name to ID maps.
pub const HIDDEN_DIR: &str = ".cb-cli";

/// Process-wide state for one command, threaded through every engine call.
#[derive(Debug, Clone)]
pub struct Context {
    pub root: PathBuf,
    pub system: SystemConfig,
    pub options: Options,
}

impl Context {
    pub fn new(root: impl Into<PathBuf>, system: SystemConfig, options: Options) -> Self {
        Self {
            root: root.into(),
            system,
            options,
        }
    }

    #[must_use]
    pub fn system_key(&self) -> &str {
        &self.system.system_key
    }
}
