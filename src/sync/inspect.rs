use serde_json::json;
use tracing::warn;

use crate::diff::Differ;
use crate::error::{Error, Result};
use crate::portal;
use crate::remote::{Remote, Table};
use crate::types::{
    Adapter, Collection, Deployment, Device, Edge, Kind, Library, Plugin, Portal, Record, Role,
    Service, Timer, Trigger, User, whitelist,
};

use super::pull::code_of;
use super::selection::{Scope, Selection};
use super::{Engine, is_fatal, protocol};

/// Differences between the local and remote copies of one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDiff {
    pub kind: Kind,
    pub name: String,
    pub messages: Vec<String>,
    pub missing_remote: bool,
    /// Remote source code, for kinds that have it, so callers can run a line diff.
    pub remote_code: Option<String>,
}

impl AssetDiff {
    fn new(kind: Kind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            messages: Vec::new(),
            missing_remote: false,
            remote_code: None,
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.missing_remote && self.messages.is_empty()
    }
}

impl<R: Remote> Engine<R> {
    /// Compares the selected local assets with their remote copies without
    /// changing either side.
    pub fn diff(&mut self, selection: &Selection) -> Result<Vec<AssetDiff>> {
        let mut diffs = Vec::new();
        for (kind, scope) in selection.iter() {
            let names = match scope {
                Scope::All => self.store.list(kind)?,
                Scope::Named(names) => names.clone(),
            };
            for name in &names {
                match self.diff_one(kind, name) {
                    Ok(diff) => diffs.push(diff),
                    Err(err) if is_fatal(&err) => return Err(err),
                    Err(err) if err.is_not_found() => {
                        let mut diff = AssetDiff::new(kind, name);
                        diff.missing_remote = true;
                        diffs.push(diff);
                    }
                    Err(err) => {
                        warn!(%kind, name, error = %err, "diff failed");
                        let mut diff = AssetDiff::new(kind, name);
                        diff.messages.push(format!("could not compare: {err}"));
                        diffs.push(diff);
                    }
                }
            }
        }
        Ok(diffs)
    }

    fn diff_one(&mut self, kind: Kind, name: &str) -> Result<AssetDiff> {
        match kind {
            Kind::Collection => {
                let local: Collection = self.store.read(name)?;
                let id = self
                    .collection_id(name)?
                    .ok_or_else(|| Error::NotFound(format!("collection '{name}'")))?;
                let columns = self.call(|r| r.columns(Table::Collection(&id)))?;
                let mut diff = AssetDiff::new(kind, name);
                let mut differ = Differ::new(&self.registry);
                differ.compare(
                    "collection",
                    &json!({"schema": local.schema}),
                    &json!({"schema": columns}),
                );
                diff.messages = differ.messages().to_vec();
                Ok(diff)
            }
            Kind::Role => {
                let local: Role = self.store.read(name)?;
                let value = self
                    .remote_role(name)?
                    .ok_or_else(|| Error::NotFound(format!("role '{name}'")))?;
                let remote: Role = whitelist(value).map_err(|e| protocol(kind, name, &e))?;
                self.compare(&local, &remote)
            }
            Kind::User => {
                let mut local: User = self.store.read(name)?;
                let value = self
                    .remote_user(name)?
                    .ok_or_else(|| Error::NotFound(format!("user '{name}'")))?;
                let mut remote: User = whitelist(value).map_err(|e| protocol(kind, name, &e))?;
                let custom = self.custom_columns(kind)?;
                local.retain_columns(&custom);
                remote.retain_columns(&custom);
                self.compare(&local, &remote)
            }
            Kind::Service => {
                let local: Service = self.store.read(name)?;
                let (mut remote, value) = self.fetch::<Service>(name)?;
                remote.code = code_of(&value);
                if let Some(id) = remote.run_user.take().filter(|id| !id.is_empty()) {
                    remote.run_user = self.user_email(&id)?;
                }
                self.compare(&local, &remote)
            }
            Kind::Library => {
                let local: Library = self.store.read(name)?;
                let (mut remote, value) = self.fetch::<Library>(name)?;
                remote.code = code_of(&value);
                self.compare(&local, &remote)
            }
            Kind::Portal => {
                let mut local: Portal = self.store.read(name)?;
                let config_dir = self.store.portal_dir(name).join("config");
                local.config = if portal::is_decompressed(&config_dir) {
                    Some(portal::compress(&config_dir)?)
                } else {
                    local.config_value().map_err(|e| protocol(kind, name, &e))?
                };
                let (mut remote, _) = self.fetch::<Portal>(name)?;
                remote.config = remote.config_value().map_err(|e| protocol(kind, name, &e))?;
                self.compare(&local, &remote)
            }
            Kind::Device => {
                let custom = self.custom_columns(kind)?;
                let mut local: Device = self.store.read(name)?;
                let (mut remote, _) = self.fetch::<Device>(name)?;
                local.retain_columns(&custom);
                remote.retain_columns(&custom);
                if remote.active_key.is_none() {
                    remote.active_key.clone_from(&local.active_key);
                }
                self.compare(&local, &remote)
            }
            Kind::Edge => {
                let custom = self.custom_columns(kind)?;
                let mut local: Edge = self.store.read(name)?;
                let (mut remote, _) = self.fetch::<Edge>(name)?;
                local.retain_columns(&custom);
                remote.retain_columns(&custom);
                self.compare(&local, &remote)
            }
            Kind::Trigger => self.diff_simple::<Trigger>(name),
            Kind::Timer => self.diff_simple::<Timer>(name),
            Kind::Plugin => self.diff_simple::<Plugin>(name),
            Kind::Adapter => self.diff_simple::<Adapter>(name),
            Kind::Deployment => self.diff_simple::<Deployment>(name),
        }
    }

    fn diff_simple<T: Record>(&mut self, name: &str) -> Result<AssetDiff> {
        let local: T = self.store.read(name)?;
        let (remote, _) = self.fetch::<T>(name)?;
        self.compare(&local, &remote)
    }

    fn compare<T: Record>(&self, local: &T, remote: &T) -> Result<AssetDiff> {
        let kind = T::KIND;
        let name = local.name();
        let l = serde_json::to_value(local).map_err(|e| protocol(kind, name, &e))?;
        let r = serde_json::to_value(remote).map_err(|e| protocol(kind, name, &e))?;

        let mut differ = Differ::new(&self.registry);
        differ.compare(kind.label(), &l, &r);

        let mut diff = AssetDiff::new(kind, name);
        diff.messages = differ.messages().to_vec();
        if let (Some(local_code), Some(remote_code)) = (local.code(), remote.code()) {
            if local_code != remote_code {
                diff.messages.push(format!("{kind} > code: source differs"));
            }
            diff.remote_code = Some(remote_code.to_string());
        }
        Ok(diff)
    }
}
