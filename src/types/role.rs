use serde::{Deserialize, Serialize};

use super::{Kind, Record};

/// Permission bitmask: 1 read, 2 create, 4 update, 8 delete.
pub type Level = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedLevel {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Level")]
    pub level: Level,
}

impl NamedLevel {
    pub fn new(name: impl Into<String>, level: Level) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelOnly {
    #[serde(rename = "Level")]
    pub level: Level,
}

/// Role permissions in the camel-case shape the platform returns and the repo stores.
/// Keys the platform adds that are not listed here are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_services: Option<Vec<NamedLevel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<NamedLevel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portals: Option<Vec<NamedLevel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<NamedLevel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_list: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_history: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges_list: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices_list: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timers: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployments: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_services: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_collections: Option<LevelOnly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_services: Option<LevelOnly>,
}

/// `roles/<name>.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Permissions", default)]
    pub permissions: Permissions,
}

impl Record for Role {
    const KIND: Kind = Kind::Role;

    fn name(&self) -> &str {
        &self.name
    }
}

/// `{"name": ...}` for services, portals and topics; `{"id": ...}` for collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ItemInfo {
    fn key(&self) -> &str {
        self.name.as_deref().or(self.id.as_deref()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemPermission {
    #[serde(rename = "itemInfo")]
    pub item_info: ItemInfo,
    pub permissions: Level,
}

impl ItemPermission {
    fn named(name: &str, level: Level) -> Self {
        Self {
            item_info: ItemInfo {
                name: Some(name.to_string()),
                id: None,
            },
            permissions: level,
        }
    }

    fn with_id(id: String, level: Level) -> Self {
        Self {
            item_info: ItemInfo {
                name: None,
                id: Some(id),
            },
            permissions: level,
        }
    }
}

/// Role permissions in the lower-case shape the platform accepts on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleChanges {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ItemPermission>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<ItemPermission>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub portals: Vec<ItemPermission>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<ItemPermission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Level>,
    #[serde(rename = "msgHistory", skip_serializing_if = "Option::is_none")]
    pub msg_history: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timers: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployments: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Level>,
    #[serde(rename = "allservices", skip_serializing_if = "Option::is_none")]
    pub all_services: Option<Level>,
    #[serde(rename = "allcollections", skip_serializing_if = "Option::is_none")]
    pub all_collections: Option<Level>,
    #[serde(rename = "systemservices", skip_serializing_if = "Option::is_none")]
    pub system_services: Option<Level>,
}

/// Body of a role update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleUpdate {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub changes: RoleChanges,
}

impl Role {
    /// Converts the stored permission map to the update shape.
    ///
    /// `collection_id` resolves collection names to IDs. Names it cannot
    /// resolve are left out of the changes and returned so the caller can
    /// report them. Duplicate entries for the same item are merged by OR-ing
    /// their levels.
    pub fn changes(
        &self,
        mut collection_id: impl FnMut(&str) -> Option<String>,
    ) -> (RoleChanges, Vec<String>) {
        let perms = &self.permissions;
        let mut unresolved = Vec::new();

        let named = |list: &Option<Vec<NamedLevel>>| {
            collapse(
                list.iter()
                    .flatten()
                    .map(|p| ItemPermission::named(&p.name, p.level)),
            )
        };

        let collections = collapse(perms.collections.iter().flatten().filter_map(|p| {
            match collection_id(&p.name) {
                Some(id) => Some(ItemPermission::with_id(id, p.level)),
                None => {
                    unresolved.push(p.name.clone());
                    None
                }
            }
        }));

        let level = |l: &Option<LevelOnly>| l.map(|l| l.level);

        let changes = RoleChanges {
            services: named(&perms.code_services),
            collections,
            portals: named(&perms.portals),
            topics: named(&perms.topics),
            users: level(&perms.users_list),
            msg_history: level(&perms.msg_history),
            push: level(&perms.push),
            edges: level(&perms.edges_list),
            devices: level(&perms.devices_list),
            triggers: level(&perms.triggers),
            timers: level(&perms.timers),
            deployments: level(&perms.deployments),
            roles: level(&perms.roles),
            all_services: level(&perms.all_services),
            all_collections: level(&perms.all_collections),
            system_services: level(&perms.system_services),
        };

        (changes, unresolved)
    }
}

fn collapse(items: impl Iterator<Item = ItemPermission>) -> Vec<ItemPermission> {
    let mut out: Vec<ItemPermission> = Vec::new();
    for item in items {
        match out.iter_mut().find(|p| p.item_info.key() == item.item_info.key()) {
            Some(existing) => existing.permissions |= item.permissions,
            None => out.push(item),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "Widgets" => Some("coll-1".into()),
            _ => None,
        }
    }

    #[test]
    fn test_every_known_key_converts() {
        let role: Role = serde_json::from_value(json!({
            "Name": "Operator",
            "Permissions": {
                "CodeServices": [{"Name": "svc", "Level": 1}],
                "Collections": [{"Name": "Widgets", "Level": 15}],
                "Portals": [{"Name": "dash", "Level": 1}],
                "Topics": [{"Name": "a/b", "Level": 3}],
                "UsersList": {"Level": 1},
                "MsgHistory": {"Level": 2},
                "Push": {"Level": 4},
                "EdgesList": {"Level": 5},
                "DevicesList": {"Level": 6},
                "Triggers": {"Level": 7},
                "Timers": {"Level": 8},
                "Deployments": {"Level": 9},
                "Roles": {"Level": 10},
                "AllServices": {"Level": 11},
                "AllCollections": {"Level": 12},
                "SystemServices": {"Level": 13}
            }
        }))
        .unwrap();

        let (changes, unresolved) = role.changes(lookup);
        assert!(unresolved.is_empty());
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            json!({
                "services": [{"itemInfo": {"name": "svc"}, "permissions": 1}],
                "collections": [{"itemInfo": {"id": "coll-1"}, "permissions": 15}],
                "portals": [{"itemInfo": {"name": "dash"}, "permissions": 1}],
                "topics": [{"itemInfo": {"name": "a/b"}, "permissions": 3}],
                "users": 1,
                "msgHistory": 2,
                "push": 4,
                "edges": 5,
                "devices": 6,
                "triggers": 7,
                "timers": 8,
                "deployments": 9,
                "roles": 10,
                "allservices": 11,
                "allcollections": 12,
                "systemservices": 13
            })
        );
    }

    #[test]
    fn test_unknown_keys_dropped() {
        let role: Role = serde_json::from_value(json!({
            "Name": "r",
            "Permissions": {"Bogus": [{"Name": "x", "Level": 1}], "Push": {"Level": 1}}
        }))
        .unwrap();
        let (changes, _) = role.changes(lookup);
        assert_eq!(serde_json::to_value(&changes).unwrap(), json!({"push": 1}));
    }

    #[test]
    fn test_unresolved_collection_skipped() {
        let mut role = Role {
            name: "r".into(),
            ..Role::default()
        };
        role.permissions.collections = Some(vec![
            NamedLevel::new("GhostColl", 1),
            NamedLevel::new("Widgets", 1),
        ]);
        let (changes, unresolved) = role.changes(lookup);
        assert_eq!(unresolved, vec!["GhostColl".to_string()]);
        assert_eq!(changes.collections.len(), 1);
        assert_eq!(changes.collections[0].item_info.id.as_deref(), Some("coll-1"));
    }

    #[test]
    fn test_duplicates_collapse_by_item_key() {
        let mut role = Role {
            name: "r".into(),
            ..Role::default()
        };
        role.permissions.code_services = Some(vec![
            NamedLevel::new("svc", 1),
            NamedLevel::new("other", 1),
            NamedLevel::new("svc", 4),
        ]);
        let (changes, _) = role.changes(lookup);
        assert_eq!(changes.services.len(), 2);
        assert_eq!(changes.services[0].permissions, 5);
    }
}
