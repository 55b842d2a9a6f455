use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Options, SYSTEM_FILE};

/// Contents of `system.json` at the repo root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub name: String,
    pub system_key: String,
    pub system_secret: String,
    #[serde(default)]
    pub description: String,
    pub platform_url: String,
    #[serde(default)]
    pub messaging_url: String,
    #[serde(default)]
    pub developer_email: String,
}

impl SystemConfig {
    /// Host and port of the MQTT broker, derived from `messaging_url`
    /// or, failing that, from the platform host on port 1883.
    #[must_use]
    pub fn broker_address(&self) -> (String, u16) {
        let source = if self.messaging_url.is_empty() {
            strip_scheme(&self.platform_url)
        } else {
            strip_scheme(&self.messaging_url)
        };
        let source = source.split('/').next().unwrap_or_default();
        match source.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (source.to_string(), 1883),
            },
            None => (source.to_string(), 1883),
        }
    }
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

/// Contents of `.cb-cli/cbmeta`: the cached token plus the options the repo was exported with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub developer_email: String,
    #[serde(default)]
    pub options: Option<Options>,
}

/// Walks up from `start` until a directory containing `system.json` is found.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(SYSTEM_FILE).is_file())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn system(platform: &str, messaging: &str) -> SystemConfig {
        SystemConfig {
            platform_url: platform.into(),
            messaging_url: messaging.into(),
            ..SystemConfig::default()
        }
    }

    #[test]
    fn test_broker_address_from_messaging_url() {
        let sys = system("https://platform.example.com", "platform.example.com:1884");
        assert_eq!(sys.broker_address(), ("platform.example.com".to_string(), 1884));
    }

    #[test]
    fn test_broker_address_defaults_port() {
        let sys = system("https://platform.example.com/", "");
        assert_eq!(sys.broker_address(), ("platform.example.com".to_string(), 1883));
    }

    #[test]
    fn test_find_repo_root_walks_up() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(SYSTEM_FILE), "{}").unwrap();
        let nested = temp.path().join("code/services/a");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_repo_root(&nested).unwrap(), temp.path());
    }

    #[test]
    fn test_find_repo_root_outside_repo() {
        let temp = TempDir::new().unwrap();
        assert!(find_repo_root(temp.path()).is_none());
    }
}
