use std::path::PathBuf;

use serde_json::json;

use crate::error::{Error, Result};
use crate::portal;
use crate::store::RepoStore;
use crate::types::{
    Adapter, Collection, Deployment, Device, Edge, EventDefinition, Kind, Library, Plugin, Portal,
    Role, Service, Timer, Trigger, User,
};

/// Fans a legacy portal's embedded `config` out into `config/` and drops
/// it from the record. Returns false when there was nothing to decompress.
pub fn decompress_portal(store: &RepoStore, name: &str) -> Result<bool> {
    let mut record: Portal = store.read(name)?;
    let config = record
        .config_value()
        .map_err(|e| Error::Portal(format!("{name}: embedded config is not valid JSON: {e}")))?;
    let Some(config) = config else {
        return Ok(false);
    };
    portal::decompress(&config, &store.portal_dir(name).join("config"))?;
    record.config = None;
    store.write(&record)?;
    Ok(true)
}

/// Writes a new local asset with starter content. Nothing is sent to the
/// remote; the next push offers to create it there.
pub fn scaffold(store: &RepoStore, kind: Kind, name: &str) -> Result<PathBuf> {
    if store.exists(kind, name) {
        return Err(Error::Conflict(format!("{kind} '{name}' already exists locally")));
    }

    match kind {
        Kind::Service => {
            let code = format!("function {name}(req, resp) {{\n    resp.success(\"ok\");\n}}\n");
            let mut service = Service::new(name, code);
            service.params = Some(Vec::new());
            service.execution_timeout = Some(60);
            store.write(&service)?;
        }
        Kind::Library => store.write(&Library {
            name: name.to_string(),
            code: format!("function {name}() {{\n}}\n"),
            ..Library::default()
        })?,
        Kind::Collection => store.write_collection(&Collection::new(name))?,
        Kind::Role => store.write(&Role {
            name: name.to_string(),
            ..Role::default()
        })?,
        Kind::User => store.write(&User::new(name))?,
        Kind::Trigger => store.write(&Trigger {
            name: name.to_string(),
            service_name: Some(String::new()),
            event_definition: Some(EventDefinition {
                def_module: "Data".into(),
                def_name: "ItemCreated".into(),
                ..EventDefinition::default()
            }),
            ..Trigger::default()
        })?,
        Kind::Timer => store.write(&Timer {
            name: name.to_string(),
            service_name: Some(String::new()),
            start_time: Some(Timer::START_NOW.into()),
            repeats: Some(-1),
            frequency: Some(60),
            ..Timer::default()
        })?,
        Kind::Edge => store.write(&Edge {
            name: name.to_string(),
            ..Edge::default()
        })?,
        Kind::Device => store.write(&Device {
            name: name.to_string(),
            enabled: Some(true),
            allow_key_auth: Some(true),
            ..Device::default()
        })?,
        Kind::Portal => {
            store.write(&Portal {
                name: name.to_string(),
                ..Portal::default()
            })?;
            portal::decompress(&json!({}), &store.portal_dir(name).join("config"))?;
        }
        Kind::Plugin => store.write(&Plugin {
            name: name.to_string(),
            ..Plugin::default()
        })?,
        Kind::Adapter => store.write(&Adapter {
            name: name.to_string(),
            ..Adapter::default()
        })?,
        Kind::Deployment => store.write(&Deployment {
            name: name.to_string(),
            ..Deployment::default()
        })?,
    }

    Ok(store.record_path(kind, name))
}
