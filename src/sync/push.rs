use std::collections::{BTreeMap, HashMap};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::diff::Differ;
use crate::error::{Error, Result};
use crate::portal;
use crate::remote::{Remote, string_field};
use crate::store::MapKind;
use crate::store::path::user_roles_path;
use crate::types::{
    Adapter, AdapterFile, Deployment, DeploymentDelta, Device, Edge, Kind, Library, Plugin, Portal, Record,
    Role, RoleUpdate, Row, Service, SetDelta, Timer, Trigger, User, whitelist,
};

use super::pull::code_of;
use super::report::{Outcome, Report};
use super::selection::{Scope, Selection};
use super::{Engine, is_fatal, protocol};

const GENERATED_KEY_LEN: usize = 8;
const GENERATED_PASSWORD_LEN: usize = 16;

/// Brings a fetched remote record into the same shape as the local one
/// before they are compared.
type Normalize<S, T> = fn(&mut S, &T, &mut T) -> Result<()>;

impl<R: Remote> Engine<R> {
    /// Sends the selected assets from the repo to the remote. Local wins.
    pub fn push(&mut self, selection: &Selection) -> Result<Report> {
        let mut report = Report::default();

        for (kind, scope) in selection.iter() {
            let names = match scope {
                Scope::All => self.store.list(kind)?,
                Scope::Named(names) => names.clone(),
            };
            if names.is_empty() {
                continue;
            }

            if kind.has_schema_file() {
                match self.push_table_schema(kind) {
                    Ok(changed) => {
                        if changed {
                            info!(%kind, "schema updated");
                        }
                    }
                    Err(err) if is_fatal(&err) => return Err(err),
                    Err(err) => {
                        warn!(%kind, error = %err, "schema push failed");
                        report.record(
                            kind,
                            "schema",
                            Outcome::Failed {
                                action: "update the schema of",
                                detail: err.to_string(),
                            },
                        );
                    }
                }
            }

            for name in &names {
                match self.push_one(kind, name) {
                    Ok(outcome) => {
                        info!(%kind, name, ?outcome, "pushed");
                        report.record(kind, name, outcome);
                    }
                    Err(err) if is_fatal(&err) => return Err(err),
                    Err(err) => {
                        warn!(%kind, name, error = %err, "push failed");
                        report.record(
                            kind,
                            name,
                            Outcome::Failed {
                                action: "push",
                                detail: err.to_string(),
                            },
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    fn push_one(&mut self, kind: Kind, name: &str) -> Result<Outcome> {
        match kind {
            Kind::Collection => self.push_collection(name),
            Kind::Role => self.push_role(name),
            Kind::User => self.push_user(name),
            Kind::Service => self.push_service(name),
            Kind::Library => {
                let library: Library = self.store.read(name)?;
                let body = with_code(&library, kind, name)?;
                self.upsert(&library, &body, |_, _, _| Ok(()))
            }
            Kind::Trigger => {
                let trigger: Trigger = self.store.read(name)?;
                let body = trigger.push_body().map_err(|e| protocol(kind, name, &e))?;
                self.upsert(&trigger, &Value::Object(body), |_, _, _| Ok(()))
            }
            Kind::Timer => {
                let timer: Timer = self.store.read(name)?;
                let body = timer.push_body().map_err(|e| protocol(kind, name, &e))?;
                self.upsert(&timer, &Value::Object(body), |_, local, remote| {
                    if local.start_time.as_deref() == Some(Timer::START_NOW) {
                        remote.start_time.clone_from(&local.start_time);
                    }
                    Ok(())
                })
            }
            Kind::Edge => self.push_edge(name),
            Kind::Device => self.push_device(name),
            Kind::Portal => self.push_portal(name),
            Kind::Plugin => {
                let plugin: Plugin = self.store.read(name)?;
                let body = to_body(&plugin, kind, name)?;
                self.upsert(&plugin, &body, |_, _, _| Ok(()))
            }
            Kind::Adapter => self.push_adapter(name),
            Kind::Deployment => self.push_deployment(name),
        }
    }

    /// True when `local` and `remote` agree after ignoring server-owned fields.
    pub(super) fn same<T: Record>(&self, local: &T, remote: &T) -> Result<bool> {
        let name = local.name();
        let l = serde_json::to_value(local).map_err(|e| protocol(T::KIND, name, &e))?;
        let r = serde_json::to_value(remote).map_err(|e| protocol(T::KIND, name, &e))?;
        let mut differ = Differ::new(&self.registry);
        Ok(differ.equal(T::KIND.label(), &l, &r) && local.code() == remote.code())
    }

    /// Updates a name-addressed asset when the remote copy differs, or
    /// creates it after confirmation when the remote has none.
    fn upsert<T: Record>(&mut self, local: &T, body: &Value, normalize: Normalize<Self, T>) -> Result<Outcome> {
        let kind = T::KIND;
        let name = local.name().to_string();

        // Hand-added fields on disk travel with the body.
        let mut extra = self.store.unknown_fields::<T>(&name)?;
        let mut body = body.clone();
        if let Value::Object(map) = &mut body {
            extra.retain(|k, _| !map.contains_key(k));
            map.extend(extra.clone());
        }

        match self.fetch::<T>(&name) {
            Ok((mut remote, value)) => {
                if remote.code().is_some() {
                    remote.set_code(code_of(&value));
                }
                normalize(self, local, &mut remote)?;
                let extra_same = extra.iter().all(|(k, v)| value.get(k) == Some(v));
                if extra_same && self.same(local, &remote)? {
                    return Ok(Outcome::Unchanged);
                }
                self.call(|r| r.update(kind, &name, &body))?;
                Ok(Outcome::Updated)
            }
            Err(err) if err.is_not_found() => {
                if !self.ask(&format!("Create new {kind} named '{name}'?"))? {
                    return Ok(Outcome::Skipped);
                }
                self.call(|r| r.create(kind, &name, &body))?;
                Ok(Outcome::Created)
            }
            Err(err) => Err(err),
        }
    }

    fn push_service(&mut self, name: &str) -> Result<Outcome> {
        let mut service: Service = self.store.read(name)?;

        let run_user_id = match service.run_user.as_deref().filter(|e| !e.is_empty()) {
            Some(email) => {
                let id = self.user_id(email)?;
                if id.is_none() {
                    warn!(service = name, run_user = email, "run_user is not a known user, clearing it");
                    service.run_user = None;
                }
                id
            }
            None => None,
        };

        let mut body = with_code(&service, Kind::Service, name)?;
        if let Value::Object(map) = &mut body {
            if let Some(params) = map.remove("params") {
                map.insert("parameters".into(), params);
            }
            match run_user_id {
                Some(id) => {
                    map.insert("run_user".into(), Value::String(id));
                }
                None => {
                    map.remove("run_user");
                }
            }
        }

        self.upsert(&service, &body, |engine, _, remote| {
            if let Some(id) = remote.run_user.take().filter(|id| !id.is_empty()) {
                remote.run_user = engine.user_email(&id)?;
            }
            Ok(())
        })
    }

    fn push_role(&mut self, name: &str) -> Result<Outcome> {
        let local: Role = self.store.read(name)?;
        let mut outcome = Outcome::Unchanged;

        let (id, remote) = match self.remote_role(name)? {
            Some(value) => {
                let id = string_field(&value, &["ID", "role_id", "id"])
                    .ok_or_else(|| Error::Protocol(format!("role '{name}' has no ID")))?;
                let remote: Role = whitelist(value).map_err(|e| protocol(Kind::Role, name, &e))?;
                (id, remote)
            }
            None => {
                if !self.ask(&format!("Create new role named '{name}'?"))? {
                    return Ok(Outcome::Skipped);
                }
                let description = local.description.clone();
                let id = self.call(|r| r.create_role(name, description.as_deref()))?;
                self.listings.roles = None;
                outcome = Outcome::Created;
                let blank = Role {
                    name: name.to_string(),
                    ..Role::default()
                };
                (id, blank)
            }
        };
        self.store.put_id(MapKind::Roles, name, &id)?;

        let mut resolved = HashMap::new();
        for perm in local.permissions.collections.iter().flatten() {
            if let Some(coll_id) = self.collection_id(&perm.name)? {
                resolved.insert(perm.name.clone(), coll_id);
            }
        }
        let (changes, unresolved) = local.changes(|coll| resolved.get(coll).cloned());
        for coll in &unresolved {
            warn!(role = name, collection = %coll, "collection not found, permission skipped");
        }

        // The remote can only ever hold the permissions that resolved.
        let mut effective = local.clone();
        if !unresolved.is_empty() {
            if let Some(colls) = &mut effective.permissions.collections {
                colls.retain(|p| !unresolved.contains(&p.name));
                if colls.is_empty() {
                    effective.permissions.collections = None;
                }
            }
        }
        if self.same(&effective, &remote)? {
            return Ok(outcome);
        }

        let update = RoleUpdate {
            id,
            name: name.to_string(),
            description: local.description.clone(),
            changes,
        };
        self.call(|r| r.update_role(&update))?;
        self.listings.roles = None;

        Ok(match outcome {
            Outcome::Created => Outcome::Created,
            _ => Outcome::Updated,
        })
    }

    fn push_user(&mut self, email: &str) -> Result<Outcome> {
        let mut local: User = self.store.read(email)?;
        let password = local
            .columns
            .get("password")
            .and_then(Value::as_str)
            .map(str::to_string);
        let custom = self.custom_columns(Kind::User)?;
        local.retain_columns(&custom);
        let mut outcome = Outcome::Unchanged;

        let (id, mut remote) = match self.remote_user(email)? {
            Some(value) => {
                let id = string_field(&value, &["user_id"])
                    .ok_or_else(|| Error::Protocol(format!("user '{email}' has no user_id")))?;
                let remote: User = whitelist(value).map_err(|e| protocol(Kind::User, email, &e))?;
                (id, remote)
            }
            None => {
                if !self.ask(&format!("Create new user named '{email}'?"))? {
                    return Ok(Outcome::Skipped);
                }
                let password = match password {
                    Some(password) => password,
                    None => {
                        warn!(user = email, "no password on file, generated a random one");
                        random_string(GENERATED_PASSWORD_LEN)
                    }
                };
                let id = self.call(|r| r.create_user(email, &password))?;
                self.listings.users = None;
                outcome = Outcome::Created;
                (id, User::new(email))
            }
        };
        self.store.put_id(MapKind::Users, email, &id)?;
        remote.retain_columns(&custom);

        if !local.columns.is_empty() && !self.same(&local, &remote)? {
            let changes: Row = local.columns.clone().into_iter().collect();
            self.call(|r| r.update_user(&id, &changes))?;
            if outcome == Outcome::Unchanged {
                outcome = Outcome::Updated;
            }
        }

        if self.push_user_roles(email, &id)? && outcome == Outcome::Unchanged {
            outcome = Outcome::Updated;
        }
        Ok(outcome)
    }

    /// Aligns a user's roles with `users/roles/<email>.json`, when that file exists.
    fn push_user_roles(&mut self, email: &str, id: &str) -> Result<bool> {
        if !user_roles_path(self.store.root(), email).is_file() {
            return Ok(false);
        }
        let wanted = self.store.read_user_roles(email)?;
        let current = self.call(|r| r.user_roles(id))?;
        let delta = SetDelta::between(&wanted, &current);
        if delta.is_empty() {
            return Ok(false);
        }

        let (add, remove) = self.role_ids(email, &delta)?;
        if add.is_empty() && remove.is_empty() {
            return Ok(false);
        }
        match self.call(|r| r.set_user_roles(id, &add, &remove)) {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                warn!(user = email, error = %err, "mapped role IDs not found remotely, looking up by name");
                for role in delta.add.iter().chain(&delta.remove) {
                    self.store.remove_id(MapKind::Roles, role)?;
                }
                self.listings.roles = None;
                let (add, remove) = self.role_ids(email, &delta)?;
                if add.is_empty() && remove.is_empty() {
                    return Ok(false);
                }
                self.call(|r| r.set_user_roles(id, &add, &remove))?;
            }
            Err(err) => return Err(err),
        }
        Ok(true)
    }

    /// Role IDs to add and remove for a user. Roles missing remotely are
    /// not assigned.
    fn role_ids(&mut self, email: &str, delta: &SetDelta<String>) -> Result<(Vec<String>, Vec<String>)> {
        let mut add = Vec::new();
        for role in &delta.add {
            match self.role_id(role)? {
                Some(role_id) => add.push(role_id),
                None => warn!(user = email, role = %role, "role not found, not assigned"),
            }
        }
        let mut remove = Vec::new();
        for role in &delta.remove {
            if let Some(role_id) = self.role_id(role)? {
                remove.push(role_id);
            }
        }
        Ok((add, remove))
    }

    fn push_device(&mut self, name: &str) -> Result<Outcome> {
        let mut local: Device = self.store.read(name)?;
        let custom = self.custom_columns(Kind::Device)?;
        local.retain_columns(&custom);

        match self.fetch::<Device>(name) {
            Ok((mut remote, _)) => {
                remote.retain_columns(&custom);
                if local.needs_generated_key() || remote.active_key.is_none() {
                    remote.active_key.clone_from(&local.active_key);
                }
                if self.same(&local, &remote)? {
                    return Ok(Outcome::Unchanged);
                }
                let mut body = to_body(&local, Kind::Device, name)?;
                if local.needs_generated_key() {
                    if let Value::Object(map) = &mut body {
                        map.remove("active_key");
                    }
                }
                self.call(|r| r.update(Kind::Device, name, &body))?;
                Ok(Outcome::Updated)
            }
            Err(err) if err.is_not_found() => {
                if !self.ask(&format!("Create new device named '{name}'?"))? {
                    return Ok(Outcome::Skipped);
                }
                if local.needs_generated_key() {
                    warn!(device = name, "no usable active key on file, generated a random one");
                    local.active_key = Some(random_string(GENERATED_KEY_LEN));
                }
                self.create_split(Kind::Device, name, local.standard_fields(), &local.columns)?;
                Ok(Outcome::Created)
            }
            Err(err) => Err(err),
        }
    }

    fn push_edge(&mut self, name: &str) -> Result<Outcome> {
        let mut local: Edge = self.store.read(name)?;
        let custom = self.custom_columns(Kind::Edge)?;
        local.retain_columns(&custom);

        match self.fetch::<Edge>(name) {
            Ok((mut remote, _)) => {
                remote.retain_columns(&custom);
                if self.same(&local, &remote)? {
                    return Ok(Outcome::Unchanged);
                }
                let body = to_body(&local, Kind::Edge, name)?;
                self.call(|r| r.update(Kind::Edge, name, &body))?;
                Ok(Outcome::Updated)
            }
            Err(err) if err.is_not_found() => {
                if !self.ask(&format!("Create new edge named '{name}'?"))? {
                    return Ok(Outcome::Skipped);
                }
                self.create_split(Kind::Edge, name, local.standard_fields(), &local.columns)?;
                Ok(Outcome::Created)
            }
            Err(err) => Err(err),
        }
    }

    /// Creates with the standard fields, then sets custom columns in a
    /// second call since the platform rejects unknown columns on create.
    fn create_split(
        &mut self,
        kind: Kind,
        name: &str,
        standard: Map<String, Value>,
        custom: &BTreeMap<String, Value>,
    ) -> Result<()> {
        let body = Value::Object(standard);
        self.call(|r| r.create(kind, name, &body))?;
        if !custom.is_empty() {
            let columns: Map<String, Value> = custom.clone().into_iter().collect();
            let body = Value::Object(columns);
            self.call(|r| r.update(kind, name, &body))?;
        }
        Ok(())
    }

    fn push_portal(&mut self, name: &str) -> Result<Outcome> {
        let mut portal: Portal = self.store.read(name)?;
        let config_dir = self.store.portal_dir(name).join("config");
        let config = if portal::is_decompressed(&config_dir) {
            Some(portal::compress(&config_dir)?)
        } else {
            portal
                .config_value()
                .map_err(|e| protocol(Kind::Portal, name, &e))?
        };
        portal.config.clone_from(&config);

        let mut wire = portal.clone();
        wire.config = config.map(|c| Value::String(c.to_string()));
        let body = to_body(&wire, Kind::Portal, name)?;

        self.upsert(&portal, &body, |_, _, remote| {
            remote.config = remote
                .config_value()
                .map_err(|e| protocol(Kind::Portal, &remote.name, &e))?;
            Ok(())
        })
    }

    fn push_adapter(&mut self, name: &str) -> Result<Outcome> {
        let adapter: Adapter = self.store.read(name)?;
        let body = to_body(&adapter, Kind::Adapter, name)?;
        let mut outcome = self.upsert(&adapter, &body, |_, _, _| Ok(()))?;
        if outcome == Outcome::Skipped {
            return Ok(outcome);
        }

        for file in self.store.list_adapter_files(name)? {
            let (meta, bytes) = self.store.read_adapter_file(name, &file)?;
            let mut body = to_body(&meta, Kind::Adapter, name)?;
            let encoded = BASE64.encode(&bytes);
            if let Value::Object(map) = &mut body {
                map.insert("file".into(), Value::String(encoded.clone()));
            }

            match self.call(|r| r.get_adapter_file(name, &file)) {
                Ok(remote) => {
                    let same_bytes = remote.get("file").and_then(Value::as_str) == Some(encoded.as_str());
                    let same_meta = serde_json::from_value::<AdapterFile>(remote)
                        .is_ok_and(|m| m == meta);
                    if same_bytes && same_meta {
                        continue;
                    }
                    self.call(|r| r.update_adapter_file(name, &file, &body))?;
                }
                Err(err) if err.is_not_found() => {
                    self.call(|r| r.create_adapter_file(name, &body))?;
                }
                Err(err) => return Err(err),
            }
            info!(adapter = name, file = %file, "adapter file pushed");
            if outcome == Outcome::Unchanged {
                outcome = Outcome::Updated;
            }
        }
        Ok(outcome)
    }

    fn push_deployment(&mut self, name: &str) -> Result<Outcome> {
        let local: Deployment = self.store.read(name)?;
        match self.fetch::<Deployment>(name) {
            Ok((remote, _)) => {
                let delta = DeploymentDelta::between(&local, &remote);
                if delta.is_noop(&remote) {
                    return Ok(Outcome::Unchanged);
                }
                let body = to_body(&delta, Kind::Deployment, name)?;
                self.call(|r| r.update(Kind::Deployment, name, &body))?;
                Ok(Outcome::Updated)
            }
            Err(err) if err.is_not_found() => {
                if !self.ask(&format!("Create new deployment named '{name}'?"))? {
                    return Ok(Outcome::Skipped);
                }
                let body = to_body(&local, Kind::Deployment, name)?;
                self.call(|r| r.create(Kind::Deployment, name, &body))?;
                Ok(Outcome::Created)
            }
            Err(err) => Err(err),
        }
    }
}

fn to_body<T: Serialize>(value: &T, kind: Kind, name: &str) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| protocol(kind, name, &e))
}

/// The record's JSON with its source code under `code`.
fn with_code<T: Record>(record: &T, kind: Kind, name: &str) -> Result<Value> {
    let mut body = to_body(record, kind, name)?;
    if let (Value::Object(map), Some(code)) = (&mut body, record.code()) {
        map.insert("code".into(), Value::String(code.to_string()));
    }
    Ok(body)
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
