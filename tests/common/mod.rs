//! In-memory platform used by the engine tests.
//!
//! Every call is appended to `calls` as a short line such as
//! `"update service A"` so tests can assert on what was sent and in which order.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use cb_cli::config::{Context, Options, SystemConfig};
use cb_cli::error::{Error, Result};
use cb_cli::remote::{Login, Page, Query, Remote, SystemCreated, SystemInfo, Table};
use cb_cli::sync::{AutoApprove, Engine};
use cb_cli::types::{CollectionInfo, Column, Kind, RoleUpdate, Row};
use serde_json::{Map, Value, json};

pub struct FakeCollection {
    pub id: String,
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

#[derive(Default)]
pub struct FakeRemote {
    pub calls: Vec<String>,
    /// Name-addressed assets, stored the way the platform returns them.
    pub assets: BTreeMap<(Kind, String), Value>,
    pub collections: Vec<FakeCollection>,
    pub roles: Vec<Value>,
    pub users: Vec<Value>,
    /// Role names per user ID.
    pub user_roles: BTreeMap<String, Vec<String>>,
    pub user_columns: Vec<Column>,
    pub device_columns: Vec<Column>,
    pub edge_columns: Vec<Column>,
    pub adapter_files: BTreeMap<(String, String), Value>,
    /// Body of the most recent name-addressed create or update.
    pub last_body: Option<Value>,
    /// Pages after the first start one row early, as if a row was inserted
    /// ahead of the read offset, so each repeats the previous page's last
    /// row while staying page-sized.
    pub repeat_row_across_pages: bool,
    /// How many upcoming calls fail with a rejected token.
    pub auth_failures: usize,
    pub password: String,
    pub token: Option<String>,
    logins: usize,
    next_id: usize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            password: "secret".into(),
            ..Self::default()
        }
    }

    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn log(&mut self, line: impl Into<String>) {
        self.calls.push(line.into());
    }

    /// Fails the call when a token rejection is pending.
    fn guard(&mut self) -> Result<()> {
        if self.auth_failures > 0 {
            self.auth_failures -= 1;
            self.log("401");
            return Err(Error::AuthFailure("token expired".into()));
        }
        Ok(())
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    pub fn add_collection(&mut self, name: &str, columns: Vec<Column>, rows: Vec<Row>) -> String {
        let id = self.id("coll");
        self.collections.push(FakeCollection {
            id: id.clone(),
            name: name.into(),
            columns,
            rows,
        });
        id
    }

    pub fn collection(&self, name: &str) -> Option<&FakeCollection> {
        self.collections.iter().find(|c| c.name == name)
    }

    fn collection_mut(&mut self, id: &str) -> Result<&mut FakeCollection> {
        self.collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("collection {id}")))
    }

    fn collection_name(&self, id: &str) -> Option<String> {
        self.collections.iter().find(|c| c.id == id).map(|c| c.name.clone())
    }

    fn table_columns(&mut self, table: Table<'_>) -> Result<&mut Vec<Column>> {
        match table {
            Table::Collection(id) => Ok(&mut self.collection_mut(id)?.columns),
            Table::Users => Ok(&mut self.user_columns),
            Table::Devices => Ok(&mut self.device_columns),
            Table::Edges => Ok(&mut self.edge_columns),
        }
    }

    pub fn role(&self, name: &str) -> Option<&Value> {
        self.roles.iter().find(|r| r["Name"] == name)
    }
}

fn table_label(table: Table<'_>) -> String {
    match table {
        Table::Collection(id) => id.to_string(),
        Table::Users => "users".into(),
        Table::Devices => "devices".into(),
        Table::Edges => "edges".into(),
    }
}

/// What a GET would return after the platform stored `body`.
fn stored(kind: Kind, body: &Value) -> Value {
    let mut value = body.clone();
    if let (Kind::Service, Value::Object(map)) = (kind, &mut value) {
        if let Some(params) = map.remove("parameters") {
            map.insert("params".into(), params);
        }
    }
    value
}

/// Rebuilds the stored permission shape from an update's changes.
fn permissions_from(changes: &Value, collection_name: impl Fn(&str) -> Option<String>) -> Value {
    let mut perms = Map::new();
    let lists = [
        ("services", "CodeServices"),
        ("portals", "Portals"),
        ("topics", "Topics"),
    ];
    for (wire, stored) in lists {
        if let Some(items) = changes.get(wire).and_then(Value::as_array) {
            let list: Vec<Value> = items
                .iter()
                .map(|p| json!({"Name": p["itemInfo"]["name"], "Level": p["permissions"]}))
                .collect();
            perms.insert(stored.into(), Value::Array(list));
        }
    }
    if let Some(items) = changes.get("collections").and_then(Value::as_array) {
        let list: Vec<Value> = items
            .iter()
            .filter_map(|p| {
                let id = p["itemInfo"]["id"].as_str()?;
                Some(json!({"Name": collection_name(id)?, "ID": id, "Level": p["permissions"]}))
            })
            .collect();
        perms.insert("Collections".into(), Value::Array(list));
    }
    let levels = [
        ("users", "UsersList"),
        ("msgHistory", "MsgHistory"),
        ("push", "Push"),
        ("edges", "EdgesList"),
        ("devices", "DevicesList"),
        ("triggers", "Triggers"),
        ("timers", "Timers"),
        ("deployments", "Deployments"),
        ("roles", "Roles"),
        ("allservices", "AllServices"),
        ("allcollections", "AllCollections"),
        ("systemservices", "SystemServices"),
    ];
    for (wire, stored) in levels {
        if let Some(level) = changes.get(wire) {
            perms.insert(stored.into(), json!({"Level": level}));
        }
    }
    Value::Object(perms)
}

impl Remote for FakeRemote {
    fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    fn authenticate(&mut self, email: &str, password: &str) -> Result<Login> {
        self.log(format!("authenticate {email}"));
        if password != self.password {
            return Err(Error::AuthFailure("bad password".into()));
        }
        self.logins += 1;
        Ok(Login::Token(format!("token-{}", self.logins)))
    }

    fn verify_two_factor(&mut self, _email: &str, _otp_id: &str, _code: &str) -> Result<String> {
        Err(Error::AuthFailure("two-factor is not enabled".into()))
    }

    fn system_info(&mut self) -> Result<SystemInfo> {
        self.guard()?;
        Ok(SystemInfo {
            name: "Fake".into(),
            description: String::new(),
            system_secret: "fake-secret".into(),
        })
    }

    fn create_system(&mut self, name: &str, _description: &str) -> Result<SystemCreated> {
        self.guard()?;
        self.log(format!("create_system {name}"));
        Ok(SystemCreated {
            system_key: self.id("key"),
            system_secret: "fresh-secret".into(),
        })
    }

    fn names(&mut self, kind: Kind) -> Result<Vec<String>> {
        self.guard()?;
        Ok(self
            .assets
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, n)| n.clone())
            .collect())
    }

    fn get(&mut self, kind: Kind, name: &str) -> Result<Value> {
        self.guard()?;
        self.log(format!("get {kind} {name}"));
        self.assets
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{kind} {name}")))
    }

    fn create(&mut self, kind: Kind, name: &str, body: &Value) -> Result<()> {
        self.guard()?;
        self.log(format!("create {kind} {name}"));
        self.last_body = Some(body.clone());
        let key = (kind, name.to_string());
        if self.assets.contains_key(&key) {
            return Err(Error::Conflict(format!("{kind} {name} already exists")));
        }
        self.assets.insert(key, stored(kind, body));
        Ok(())
    }

    fn update(&mut self, kind: Kind, name: &str, body: &Value) -> Result<()> {
        self.guard()?;
        self.log(format!("update {kind} {name}"));
        self.last_body = Some(body.clone());
        let existing = self
            .assets
            .get_mut(&(kind, name.to_string()))
            .ok_or_else(|| Error::NotFound(format!("{kind} {name}")))?;

        if kind == Kind::Deployment {
            apply_deployment_delta(existing, body);
            return Ok(());
        }
        if let (Value::Object(target), Value::Object(changes)) = (existing, stored(kind, body)) {
            for (k, v) in changes {
                target.insert(k, v);
            }
        }
        Ok(())
    }

    fn delete(&mut self, kind: Kind, name: &str) -> Result<()> {
        self.guard()?;
        self.log(format!("delete {kind} {name}"));
        self.assets
            .remove(&(kind, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("{kind} {name}")))
    }

    fn columns(&mut self, table: Table<'_>) -> Result<Vec<Column>> {
        self.guard()?;
        Ok(self.table_columns(table)?.clone())
    }

    fn add_column(&mut self, table: Table<'_>, column: &Column) -> Result<()> {
        self.guard()?;
        self.log(format!("add_column {} {}", table_label(table), column.name));
        self.table_columns(table)?.push(column.clone());
        Ok(())
    }

    fn delete_column(&mut self, table: Table<'_>, name: &str) -> Result<()> {
        self.guard()?;
        self.log(format!("delete_column {} {name}", table_label(table)));
        self.table_columns(table)?.retain(|c| c.name != name);
        Ok(())
    }

    fn collections(&mut self) -> Result<Vec<CollectionInfo>> {
        self.guard()?;
        Ok(self
            .collections
            .iter()
            .map(|c| CollectionInfo {
                id: c.id.clone(),
                name: c.name.clone(),
            })
            .collect())
    }

    fn create_collection(&mut self, name: &str) -> Result<String> {
        self.guard()?;
        self.log(format!("create_collection {name}"));
        Ok(self.add_collection(name, vec![Column::new("item_id", "string")], Vec::new()))
    }

    fn delete_collection(&mut self, id: &str) -> Result<()> {
        self.guard()?;
        self.log(format!("delete_collection {id}"));
        let before = self.collections.len();
        self.collections.retain(|c| c.id != id);
        if self.collections.len() == before {
            return Err(Error::NotFound(format!("collection {id}")));
        }
        Ok(())
    }

    fn rows(&mut self, id: &str, query: &Query) -> Result<Page> {
        self.guard()?;
        self.log(format!("rows {id} page {}", query.page_number));
        let repeat = self.repeat_row_across_pages;
        let coll = self.collection_mut(id)?;
        let mut sorted = coll.rows.clone();
        sorted.sort_by(|a, b| a["item_id"].as_str().cmp(&b["item_id"].as_str()));

        let shift = usize::from(repeat && query.page_number > 1);
        let start = ((query.page_number - 1) * query.page_size)
            .saturating_sub(shift)
            .min(sorted.len());
        let end = (start + query.page_size).min(sorted.len());
        let rows = sorted[start..end].to_vec();
        Ok(Page {
            total: sorted.len() as u64,
            rows,
        })
    }

    fn count(&mut self, id: &str) -> Result<u64> {
        self.guard()?;
        Ok(self.collection_mut(id)?.rows.len() as u64)
    }

    fn create_rows(&mut self, id: &str, rows: &[Row]) -> Result<()> {
        self.guard()?;
        self.log(format!("create_rows {id} {}", rows.len()));
        let mut fresh = Vec::new();
        for row in rows {
            let mut row = row.clone();
            if !row.contains_key("item_id") {
                row.insert("item_id".into(), Value::String(self.id("item")));
            }
            fresh.push(row);
        }
        self.collection_mut(id)?.rows.extend(fresh);
        Ok(())
    }

    fn update_rows(&mut self, id: &str, query: &Query, changes: &Row) -> Result<u64> {
        self.guard()?;
        let item_id = query.item_id.clone().unwrap_or_default();
        self.log(format!("update_rows {id} {item_id}"));
        let mut matched = 0;
        for row in &mut self.collection_mut(id)?.rows {
            if row.get("item_id").and_then(Value::as_str) == Some(item_id.as_str()) {
                for (k, v) in changes {
                    row.insert(k.clone(), v.clone());
                }
                matched += 1;
            }
        }
        Ok(matched)
    }

    fn users(&mut self) -> Result<Vec<Value>> {
        self.guard()?;
        Ok(self.users.clone())
    }

    fn create_user(&mut self, email: &str, _password: &str) -> Result<String> {
        self.guard()?;
        self.log(format!("create_user {email}"));
        let id = self.id("user");
        self.users.push(json!({"email": email, "user_id": id}));
        Ok(id)
    }

    fn update_user(&mut self, id: &str, changes: &Row) -> Result<()> {
        self.guard()?;
        self.log(format!("update_user {id}"));
        let user = self
            .users
            .iter_mut()
            .find(|u| u["user_id"] == id)
            .ok_or_else(|| Error::NotFound(format!("user {id}")))?;
        if let Value::Object(map) = user {
            for (k, v) in changes {
                map.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }

    fn delete_user(&mut self, id: &str) -> Result<()> {
        self.guard()?;
        self.log(format!("delete_user {id}"));
        self.users.retain(|u| u["user_id"] != id);
        Ok(())
    }

    fn user_roles(&mut self, id: &str) -> Result<Vec<String>> {
        self.guard()?;
        Ok(self.user_roles.get(id).cloned().unwrap_or_default())
    }

    fn set_user_roles(&mut self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        self.guard()?;
        self.log(format!("set_user_roles {id} +{} -{}", add.join(","), remove.join(",")));
        if let Some(unknown) = add
            .iter()
            .chain(remove)
            .find(|rid| !self.roles.iter().any(|r| r["ID"] == rid.as_str()))
        {
            return Err(Error::NotFound(format!("role {unknown}")));
        }
        let names = |ids: &[String], roles: &[Value]| -> Vec<String> {
            ids.iter()
                .filter_map(|rid| roles.iter().find(|r| r["ID"] == rid.as_str()))
                .filter_map(|r| r["Name"].as_str().map(str::to_string))
                .collect()
        };
        let add = names(add, &self.roles);
        let remove = names(remove, &self.roles);
        let entry = self.user_roles.entry(id.to_string()).or_default();
        entry.retain(|r| !remove.contains(r));
        entry.extend(add);
        Ok(())
    }

    fn roles(&mut self) -> Result<Vec<Value>> {
        self.guard()?;
        Ok(self.roles.clone())
    }

    fn create_role(&mut self, name: &str, description: Option<&str>) -> Result<String> {
        self.guard()?;
        self.log(format!("create_role {name}"));
        let id = self.id("role");
        let mut role = json!({"ID": id, "Name": name, "Permissions": {}});
        if let Some(description) = description {
            role["Description"] = json!(description);
        }
        self.roles.push(role);
        Ok(id)
    }

    fn update_role(&mut self, update: &RoleUpdate) -> Result<()> {
        self.guard()?;
        self.log(format!("update_role {}", update.name));
        let changes = serde_json::to_value(&update.changes).map_err(|e| Error::Protocol(e.to_string()))?;
        let permissions = permissions_from(&changes, |id| self.collection_name(id));
        let role = self
            .roles
            .iter_mut()
            .find(|r| r["ID"] == update.id.as_str())
            .ok_or_else(|| Error::NotFound(format!("role {}", update.id)))?;
        role["Permissions"] = permissions;
        if let Some(description) = &update.description {
            role["Description"] = json!(description);
        }
        Ok(())
    }

    fn delete_role(&mut self, id: &str) -> Result<()> {
        self.guard()?;
        self.log(format!("delete_role {id}"));
        self.roles.retain(|r| r["ID"] != id);
        Ok(())
    }

    fn adapter_files(&mut self, adapter: &str) -> Result<Vec<String>> {
        self.guard()?;
        Ok(self
            .adapter_files
            .keys()
            .filter(|(a, _)| a == adapter)
            .map(|(_, f)| f.clone())
            .collect())
    }

    fn get_adapter_file(&mut self, adapter: &str, file: &str) -> Result<Value> {
        self.guard()?;
        self.adapter_files
            .get(&(adapter.to_string(), file.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("adapter file {adapter}/{file}")))
    }

    fn create_adapter_file(&mut self, adapter: &str, body: &Value) -> Result<()> {
        self.guard()?;
        let file = body["name"].as_str().unwrap_or_default().to_string();
        self.log(format!("create_adapter_file {adapter} {file}"));
        self.adapter_files.insert((adapter.to_string(), file), body.clone());
        Ok(())
    }

    fn update_adapter_file(&mut self, adapter: &str, file: &str, body: &Value) -> Result<()> {
        self.guard()?;
        self.log(format!("update_adapter_file {adapter} {file}"));
        self.adapter_files
            .insert((adapter.to_string(), file.to_string()), body.clone());
        Ok(())
    }

    fn execute_service(&mut self, name: &str, params: &Value) -> Result<Value> {
        self.guard()?;
        self.log(format!("execute {name}"));
        Ok(json!({"success": true, "results": params}))
    }
}

fn apply_deployment_delta(existing: &mut Value, delta: &Value) {
    for field in ["assets", "edges"] {
        let mut current: Vec<Value> = existing[field].as_array().cloned().unwrap_or_default();
        if let Some(remove) = delta[field]["remove"].as_array() {
            current.retain(|v| !remove.contains(v));
        }
        if let Some(add) = delta[field]["add"].as_array() {
            current.extend(add.iter().cloned());
        }
        existing[field] = Value::Array(current);
    }
    if let Some(description) = delta.get("description") {
        existing["description"] = description.clone();
    }
}

pub fn system() -> SystemConfig {
    SystemConfig {
        name: "Fake".into(),
        system_key: "fake-key".into(),
        system_secret: "fake-secret".into(),
        platform_url: "https://platform.invalid".into(),
        ..SystemConfig::default()
    }
}

/// An auto-approving engine over `remote` rooted at `root`.
pub fn engine(root: &Path, remote: FakeRemote, options: Options) -> Engine<FakeRemote> {
    let options = Options {
        auto_approve: true,
        ..options
    };
    let ctx = Context::new(root, system(), options);
    ctx_engine(ctx, remote)
}

pub fn ctx_engine(ctx: Context, remote: FakeRemote) -> Engine<FakeRemote> {
    Engine::new(ctx, remote, Box::new(AutoApprove))
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}
