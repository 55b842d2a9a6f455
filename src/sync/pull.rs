use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::portal;
use crate::remote::{Remote, Table, string_field};
use crate::store::MapKind;
use crate::types::{
    Adapter, AdapterFile, Collection, Deployment, Device, Edge, Kind, Library, Plugin, Portal,
    Record, Role, Service, Timer, Trigger, User, whitelist,
};

use super::report::{Outcome, Report};
use super::selection::{Scope, Selection};
use super::{Engine, is_fatal, protocol};

impl<R: Remote> Engine<R> {
    /// Brings the selected assets from the remote into the repo. Remote wins.
    pub fn pull(&mut self, selection: &Selection) -> Result<Report> {
        let mut report = Report::default();

        for (kind, scope) in selection.iter() {
            if kind == Kind::User && selection.is_everything() && !self.ctx.options.export_users {
                continue;
            }

            let names = match scope {
                Scope::All => self.remote_names(kind)?,
                Scope::Named(names) => names.clone(),
            };

            if let Some(table) = Table::for_kind(kind) {
                let columns = self.call(|r| r.columns(table))?;
                self.store.write_schema(kind, &columns)?;
            }

            for name in &names {
                match self.pull_one(kind, name) {
                    Ok(()) => {
                        info!(%kind, name, "pulled");
                        report.record(kind, name, Outcome::Pulled);
                    }
                    Err(err) if is_fatal(&err) => return Err(err),
                    Err(err) => {
                        warn!(%kind, name, error = %err, "pull failed");
                        report.record(
                            kind,
                            name,
                            Outcome::Failed {
                                action: "pull",
                                detail: err.to_string(),
                            },
                        );
                    }
                }
            }

            if *scope == Scope::All && self.ctx.options.cleanup {
                self.cleanup(kind, &names, &mut report)?;
            }
        }

        Ok(report)
    }

    fn pull_one(&mut self, kind: Kind, name: &str) -> Result<()> {
        match kind {
            Kind::Collection => self.pull_collection(name),
            Kind::Role => self.pull_role(name),
            Kind::User => self.pull_user(name),
            Kind::Service => self.pull_service(name),
            Kind::Library => {
                let (mut library, value) = self.fetch::<Library>(name)?;
                library.code = code_of(&value);
                self.store.write(&library)
            }
            Kind::Portal => self.pull_portal(name),
            Kind::Adapter => self.pull_adapter(name),
            Kind::Trigger => self.pull_simple::<Trigger>(name),
            Kind::Timer => self.pull_simple::<Timer>(name),
            Kind::Edge => self.pull_simple::<Edge>(name),
            Kind::Device => self.pull_simple::<Device>(name),
            Kind::Plugin => self.pull_simple::<Plugin>(name),
            Kind::Deployment => self.pull_simple::<Deployment>(name),
        }
    }

    /// Gets one asset of a name-addressed kind and projects it through the whitelist.
    pub(super) fn fetch<T: Record>(&mut self, name: &str) -> Result<(T, Value)> {
        let value = self.call(|r| r.get(T::KIND, name))?;
        let record = whitelist(value.clone()).map_err(|e| protocol(T::KIND, name, &e))?;
        Ok((record, value))
    }

    fn pull_simple<T: Record>(&mut self, name: &str) -> Result<()> {
        let (record, _) = self.fetch::<T>(name)?;
        self.store.write(&record)
    }

    fn pull_service(&mut self, name: &str) -> Result<()> {
        let (mut service, value) = self.fetch::<Service>(name)?;
        service.code = code_of(&value);
        if let Some(id) = service.run_user.take().filter(|id| !id.is_empty()) {
            service.run_user = self.user_email(&id)?;
            if service.run_user.is_none() {
                warn!(service = name, user_id = %id, "run_user does not match a known user, clearing it");
            }
        }
        self.store.write(&service)
    }

    fn pull_collection(&mut self, name: &str) -> Result<()> {
        let (id, schema) = self
            .collection_columns(name)?
            .ok_or_else(|| Error::NotFound(format!("collection '{name}'")))?;

        let local = match self.store.read::<Collection>(name) {
            Ok(local) => Some(local),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };

        let items = if self.ctx.options.export_rows {
            self.fetch_rows(name, &id)?
        } else {
            local.as_ref().map(|c| c.items.clone()).unwrap_or_default()
        };

        let collection = Collection {
            name: name.to_string(),
            schema,
            items,
            autodelete: local.and_then(|c| c.autodelete),
        };
        self.store.write_collection(&collection)
    }

    fn pull_role(&mut self, name: &str) -> Result<()> {
        let value = self
            .remote_role(name)?
            .ok_or_else(|| Error::NotFound(format!("role '{name}'")))?;
        let id = string_field(&value, &["ID", "role_id", "id"]);
        let role: Role = whitelist(value).map_err(|e| protocol(Kind::Role, name, &e))?;
        self.store.write(&role)?;
        if let Some(id) = id {
            self.store.put_id(MapKind::Roles, name, &id)?;
        }
        Ok(())
    }

    fn pull_user(&mut self, email: &str) -> Result<()> {
        let value = self
            .remote_user(email)?
            .ok_or_else(|| Error::NotFound(format!("user '{email}'")))?;
        let id = string_field(&value, &["user_id"])
            .ok_or_else(|| Error::Protocol(format!("user '{email}' has no user_id")))?;
        let user: User = whitelist(value).map_err(|e| protocol(Kind::User, email, &e))?;
        self.store.write(&user)?;
        self.store.put_id(MapKind::Users, email, &id)?;

        let roles = self.call(|r| r.user_roles(&id))?;
        self.store.write_user_roles(email, &roles)
    }

    fn pull_portal(&mut self, name: &str) -> Result<()> {
        let (mut portal, _) = self.fetch::<Portal>(name)?;
        let config = portal
            .config_value()
            .map_err(|e| protocol(Kind::Portal, name, &e))?;
        portal.config = None;
        self.store.write(&portal)?;

        if let Some(config) = config {
            portal::decompress(&config, &self.store.portal_dir(name).join("config"))?;
        }
        Ok(())
    }

    fn pull_adapter(&mut self, name: &str) -> Result<()> {
        let (adapter, _) = self.fetch::<Adapter>(name)?;
        self.store.write(&adapter)?;

        let files = self.call(|r| r.adapter_files(name))?;
        for file in files {
            let value = self.call(|r| r.get_adapter_file(name, &file))?;
            let encoded = value.get("file").and_then(Value::as_str).unwrap_or_default();
            let bytes = BASE64
                .decode(encoded)
                .map_err(|e| Error::Protocol(format!("adapter '{name}' file '{file}': {e}")))?;
            let meta: AdapterFile =
                serde_json::from_value(value).map_err(|e| protocol(Kind::Adapter, name, &e))?;
            self.store.write_adapter_file(name, &meta, &bytes)?;
        }
        Ok(())
    }

    /// Removes local assets of `kind` that the remote no longer has.
    fn cleanup(&mut self, kind: Kind, remote: &[String], report: &mut Report) -> Result<()> {
        for name in self.store.list(kind)? {
            if remote.contains(&name) {
                continue;
            }
            self.store.delete(kind, &name)?;
            match kind {
                Kind::Collection => self.store.remove_id(MapKind::Collections, &name)?,
                Kind::Role => self.store.remove_id(MapKind::Roles, &name)?,
                Kind::User => self.store.remove_id(MapKind::Users, &name)?,
                _ => {}
            }
            info!(%kind, name, "removed stale local copy");
            report.record(kind, name, Outcome::Deleted);
        }
        Ok(())
    }
}

pub(super) fn code_of(value: &Value) -> String {
    value
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
