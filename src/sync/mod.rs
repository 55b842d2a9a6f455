//! Reconciliation between the repo on disk and the remote system.
//!
//! [`Engine`] owns the store, the remote and the prompt strategy for one
//! command. Bulk operations record a per-asset [`Outcome`] and keep going;
//! only authentication failures that survive a re-login, and user aborts,
//! stop a run.

mod collections;
mod inspect;
mod local;
mod prompt;
mod pull;
mod push;
mod report;
mod selection;

pub use collections::SchemaDiff;
pub use inspect::AssetDiff;
pub use local::{decompress_portal, scaffold};
pub use prompt::{AutoApprove, Confirm, DenyAll};
pub use report::{Entry, Outcome, Report};
pub use selection::{Scope, Selection};

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Context;
use crate::diff::Registry;
use crate::error::{Error, Result};
use crate::remote::{CredentialSource, Remote, login, string_field};
use crate::store::{MapKind, RepoStore};
use crate::types::{CollectionInfo, Kind};

/// Remote lists fetched at most once per run, dropped whenever the engine
/// creates or deletes something they describe.
#[derive(Debug, Default)]
struct Listings {
    collections: Option<Vec<CollectionInfo>>,
    roles: Option<Vec<Value>>,
    users: Option<Vec<Value>>,
}

pub struct Engine<R: Remote> {
    ctx: Context,
    store: RepoStore,
    remote: R,
    confirm: Box<dyn Confirm>,
    credentials: Option<Box<dyn CredentialSource>>,
    registry: Registry,
    listings: Listings,
}

impl<R: Remote> Engine<R> {
    pub fn new(ctx: Context, remote: R, confirm: Box<dyn Confirm>) -> Self {
        let store = RepoStore::new(ctx.root.clone(), ctx.options.clone());
        Self {
            ctx,
            store,
            remote,
            confirm,
            credentials: None,
            registry: Registry::standard(),
            listings: Listings::default(),
        }
    }

    /// Enables one re-login per failing call when the token is rejected.
    #[must_use]
    pub fn with_credentials(mut self, source: Box<dyn CredentialSource>) -> Self {
        self.credentials = Some(source);
        self
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    #[must_use]
    pub fn store(&self) -> &RepoStore {
        &self.store
    }

    #[must_use]
    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    pub fn into_remote(self) -> R {
        self.remote
    }

    /// Logs in with the configured credentials and caches the token in the repo.
    pub fn authenticate(&mut self) -> Result<String> {
        let source = self
            .credentials
            .as_mut()
            .ok_or_else(|| Error::AuthFailure("no credentials available".into()))?;
        let token = login(&mut self.remote, source.as_mut())?;
        self.store.save_token(&token)?;
        Ok(token)
    }

    /// Runs one remote call. An authentication failure triggers a single
    /// re-login and retry; a second failure is returned as is.
    fn call<T>(&mut self, mut op: impl FnMut(&mut R) -> Result<T>) -> Result<T> {
        match op(&mut self.remote) {
            Err(err) if err.is_auth_failure() && self.credentials.is_some() => {
                warn!(error = %err, "token rejected, logging in again");
                self.authenticate()?;
                op(&mut self.remote)
            }
            other => other,
        }
    }

    fn ask(&mut self, message: &str) -> Result<bool> {
        if self.ctx.options.auto_approve {
            return Ok(true);
        }
        self.confirm.confirm(message)
    }

    // Listings

    fn collection_list(&mut self) -> Result<Vec<CollectionInfo>> {
        if let Some(list) = &self.listings.collections {
            return Ok(list.clone());
        }
        let list = self.call(|r| r.collections())?;
        self.listings.collections = Some(list.clone());
        Ok(list)
    }

    fn role_list(&mut self) -> Result<Vec<Value>> {
        if let Some(list) = &self.listings.roles {
            return Ok(list.clone());
        }
        let list = self.call(|r| r.roles())?;
        self.listings.roles = Some(list.clone());
        Ok(list)
    }

    fn user_list(&mut self) -> Result<Vec<Value>> {
        if let Some(list) = &self.listings.users {
            return Ok(list.clone());
        }
        let list = self.call(|r| r.users())?;
        self.listings.users = Some(list.clone());
        Ok(list)
    }

    /// Names of every remote asset of `kind`.
    fn remote_names(&mut self, kind: Kind) -> Result<Vec<String>> {
        let mut names: Vec<String> = match kind {
            Kind::Collection => self.collection_list()?.into_iter().map(|c| c.name).collect(),
            Kind::Role => self
                .role_list()?
                .iter()
                .filter_map(|r| string_field(r, &["Name", "name"]))
                .collect(),
            Kind::User => self
                .user_list()?
                .iter()
                .filter_map(|u| string_field(u, &["email"]))
                .collect(),
            _ => self.call(|r| r.names(kind))?,
        };
        names.sort();
        names.dedup();
        Ok(names)
    }

    // Name to ID resolution: map first, then the remote listing.

    fn collection_id(&mut self, name: &str) -> Result<Option<String>> {
        if let Some(id) = self.store.id_for(MapKind::Collections, name)? {
            return Ok(Some(id));
        }
        let found = self.collection_list()?.into_iter().find(|c| c.name == name);
        if let Some(info) = &found {
            self.store.put_id(MapKind::Collections, name, &info.id)?;
        }
        Ok(found.map(|c| c.id))
    }

    fn remote_role(&mut self, name: &str) -> Result<Option<Value>> {
        Ok(self
            .role_list()?
            .into_iter()
            .find(|r| string_field(r, &["Name", "name"]).as_deref() == Some(name)))
    }

    fn role_id(&mut self, name: &str) -> Result<Option<String>> {
        if let Some(id) = self.store.id_for(MapKind::Roles, name)? {
            return Ok(Some(id));
        }
        let id = self
            .remote_role(name)?
            .and_then(|r| string_field(&r, &["ID", "role_id", "id"]));
        if let Some(id) = &id {
            self.store.put_id(MapKind::Roles, name, id)?;
        }
        Ok(id)
    }

    fn remote_user(&mut self, email: &str) -> Result<Option<Value>> {
        Ok(self
            .user_list()?
            .into_iter()
            .find(|u| string_field(u, &["email"]).as_deref() == Some(email)))
    }

    fn user_id(&mut self, email: &str) -> Result<Option<String>> {
        if let Some(id) = self.store.id_for(MapKind::Users, email)? {
            return Ok(Some(id));
        }
        let id = self
            .remote_user(email)?
            .and_then(|u| string_field(&u, &["user_id"]));
        if let Some(id) = &id {
            self.store.put_id(MapKind::Users, email, id)?;
        }
        Ok(id)
    }

    fn user_email(&mut self, id: &str) -> Result<Option<String>> {
        if let Some(email) = self.store.name_for(MapKind::Users, id)? {
            return Ok(Some(email));
        }
        Ok(self
            .user_list()?
            .into_iter()
            .find(|u| string_field(u, &["user_id"]).as_deref() == Some(id))
            .and_then(|u| string_field(&u, &["email"])))
    }

    /// Rewrites the three name to ID maps from the remote listings.
    pub fn refresh_maps(&mut self) -> Result<()> {
        self.listings = Listings::default();

        let collections = self.collection_list()?;
        let mut map = self.store.id_map(MapKind::Collections)?;
        map.replace_all(collections.into_iter().map(|c| (c.name, c.id)));
        map.save()?;

        let roles = self.role_list()?;
        let mut map = self.store.id_map(MapKind::Roles)?;
        map.replace_all(roles.iter().filter_map(|r| {
            Some((
                string_field(r, &["Name", "name"])?,
                string_field(r, &["ID", "role_id", "id"])?,
            ))
        }));
        map.save()?;

        let users = self.user_list()?;
        let mut map = self.store.id_map(MapKind::Users)?;
        map.replace_all(users.iter().filter_map(|u| {
            Some((string_field(u, &["email"])?, string_field(u, &["user_id"])?))
        }));
        map.save()?;

        debug!("name to ID maps refreshed");
        Ok(())
    }

    /// Custom column names from a schemaful kind's schema file.
    fn custom_columns(&self, kind: Kind) -> Result<BTreeSet<String>> {
        Ok(self
            .store
            .read_schema(kind)?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Runs a code service with `params` and returns its response.
    pub fn execute_service(&mut self, name: &str, params: &Value) -> Result<Value> {
        self.call(|r| r.execute_service(name, params))
    }

    /// Deletes an asset remotely, after confirmation, then removes its local
    /// files and map entries. An asset already gone remotely is still
    /// removed locally.
    pub fn delete(&mut self, kind: Kind, name: &str) -> Result<Outcome> {
        if !self.ask(&format!("Delete {kind} named '{name}'?"))? {
            return Ok(Outcome::Skipped);
        }

        let result = match kind {
            Kind::Collection => match self.collection_id(name)? {
                Some(id) => self.call(|r| r.delete_collection(&id)),
                None => Err(Error::NotFound(format!("collection '{name}'"))),
            },
            Kind::Role => match self.role_id(name)? {
                Some(id) => self.call(|r| r.delete_role(&id)),
                None => Err(Error::NotFound(format!("role '{name}'"))),
            },
            Kind::User => match self.user_id(name)? {
                Some(id) => self.call(|r| r.delete_user(&id)),
                None => Err(Error::NotFound(format!("user '{name}'"))),
            },
            _ => self.call(|r| r.delete(kind, name)),
        };

        match result {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                warn!(%kind, name, "not found remotely, removing local copy only");
            }
            Err(err) => return Err(err),
        }

        self.store.delete(kind, name)?;
        match kind {
            Kind::Collection => self.store.remove_id(MapKind::Collections, name)?,
            Kind::Role => self.store.remove_id(MapKind::Roles, name)?,
            Kind::User => self.store.remove_id(MapKind::Users, name)?,
            _ => {}
        }
        self.listings = Listings::default();
        info!(%kind, name, "deleted");
        Ok(Outcome::Deleted)
    }
}

/// Errors that end a bulk run instead of being recorded against one asset.
fn is_fatal(err: &Error) -> bool {
    err.is_auth_failure() || matches!(err, Error::UserAborted)
}

fn protocol(kind: Kind, name: &str, err: &serde_json::Error) -> Error {
    Error::Protocol(format!("{kind} '{name}': {err}"))
}
