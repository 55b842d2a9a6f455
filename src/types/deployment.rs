use serde::{Deserialize, Serialize};

use super::{Kind, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentAsset {
    pub asset_class: String,
    pub asset_id: String,
    #[serde(default)]
    pub sync_to_edge: bool,
    #[serde(default)]
    pub sync_to_platform: bool,
}

/// `deployments/<name>.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub assets: Vec<DeploymentAsset>,
    #[serde(default)]
    pub edges: Vec<String>,
}

impl Record for Deployment {
    const KIND: Kind = Kind::Deployment;

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetDelta<T> {
    pub add: Vec<T>,
    pub remove: Vec<T>,
}

impl<T: PartialEq + Clone> SetDelta<T> {
    /// `add = local - remote`, `remove = remote - local`, matched by value.
    pub fn between(local: &[T], remote: &[T]) -> Self {
        Self {
            add: local.iter().filter(|x| !remote.contains(x)).cloned().collect(),
            remove: remote.iter().filter(|x| !local.contains(x)).cloned().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Update body for an existing deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub assets: SetDelta<DeploymentAsset>,
    pub edges: SetDelta<String>,
}

impl DeploymentDelta {
    pub fn between(local: &Deployment, remote: &Deployment) -> Self {
        Self {
            description: local.description.clone(),
            assets: SetDelta::between(&local.assets, &remote.assets),
            edges: SetDelta::between(&local.edges, &remote.edges),
        }
    }

    #[must_use]
    pub fn is_noop(&self, remote: &Deployment) -> bool {
        self.assets.is_empty() && self.edges.is_empty() && self.description == remote.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str) -> DeploymentAsset {
        DeploymentAsset {
            asset_class: "service".into(),
            asset_id: id.into(),
            sync_to_edge: true,
            sync_to_platform: false,
        }
    }

    #[test]
    fn test_delta_is_set_difference() {
        let local = Deployment {
            name: "d".into(),
            assets: vec![asset("a"), asset("b")],
            edges: vec!["e1".into(), "e2".into()],
            ..Deployment::default()
        };
        let remote = Deployment {
            name: "d".into(),
            assets: vec![asset("b"), asset("c")],
            edges: vec!["e2".into(), "e3".into()],
            ..Deployment::default()
        };
        let delta = DeploymentDelta::between(&local, &remote);
        assert_eq!(delta.assets.add, vec![asset("a")]);
        assert_eq!(delta.assets.remove, vec![asset("c")]);
        assert_eq!(delta.edges.add, vec!["e1".to_string()]);
        assert_eq!(delta.edges.remove, vec!["e3".to_string()]);
        assert!(!delta.is_noop(&remote));
    }

    #[test]
    fn test_identical_deployments_noop() {
        let d = Deployment {
            name: "d".into(),
            assets: vec![asset("a")],
            edges: vec!["e1".into()],
            ..Deployment::default()
        };
        assert!(DeploymentDelta::between(&d, &d).is_noop(&d));
    }
}
