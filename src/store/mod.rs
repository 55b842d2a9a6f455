//! On-disk representation of a system: one directory per asset kind, JSON
//! files projected through each kind's whitelist, and the hidden `.cb-cli/`
//! directory with the cached token and name to ID maps.

mod idmap;
pub mod json;
pub mod path;

pub use idmap::{IdMap, MapKind};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{HIDDEN_DIR, Meta, Options, SYSTEM_FILE, SystemConfig};
use crate::error::{Error, Result};
use crate::types::{AdapterFile, Collection, Column, Kind, Record, whitelist};

use self::json::{read_bytes, read_json, read_text, write_bytes, write_json};
use self::path::{
    adapter_file_dir, code_path, kind_dir, record_path, schema_path, user_roles_path,
    validate_name,
};

const META_FILE: &str = "cbmeta";
const MAP_DIR: &str = "map";

/// `<dir>/schema.json` for users, devices and edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// File-backed asset store rooted at a system repo.
#[derive(Debug, Clone)]
pub struct RepoStore {
    root: PathBuf,
    options: Options,
}

impl RepoStore {
    pub fn new(root: impl Into<PathBuf>, options: Options) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    fn hidden_dir(&self) -> PathBuf {
        self.root.join(HIDDEN_DIR)
    }

    // System metadata

    pub fn load_system(&self) -> Result<SystemConfig> {
        read_json(&self.root.join(SYSTEM_FILE))
    }

    pub fn save_system(&self, system: &SystemConfig) -> Result<()> {
        write_json(&self.root.join(SYSTEM_FILE), system)
    }

    /// Loads `.cb-cli/cbmeta`, or an empty one if the repo has none yet.
    pub fn load_meta(&self) -> Result<Meta> {
        match read_json(&self.hidden_dir().join(META_FILE)) {
            Ok(meta) => Ok(meta),
            Err(e) if e.is_not_found() => Ok(Meta::default()),
            Err(e) => Err(e),
        }
    }

    pub fn save_meta(&self, meta: &Meta) -> Result<()> {
        let path = self.hidden_dir().join(META_FILE);
        write_json(&path, meta)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn save_token(&self, token: &str) -> Result<()> {
        let mut meta = self.load_meta()?;
        meta.token = token.to_string();
        self.save_meta(&meta)
    }

    // Records

    #[must_use]
    pub fn record_path(&self, kind: Kind, name: &str) -> PathBuf {
        record_path(&self.root, kind, name)
    }

    #[must_use]
    pub fn exists(&self, kind: Kind, name: &str) -> bool {
        self.record_path(kind, name).is_file()
    }

    /// The full on-disk record, unprojected, so hand-added fields survive a read.
    pub fn read_raw(&self, kind: Kind, name: &str) -> Result<Value> {
        validate_name(name)?;
        read_json(&self.record_path(kind, name))
    }

    /// Fields of the on-disk record that `R`'s whitelist does not cover,
    /// such as ones added by hand.
    pub fn unknown_fields<R: Record>(&self, name: &str) -> Result<Map<String, Value>> {
        let Value::Object(raw) = self.read_raw(R::KIND, name)? else {
            return Ok(Map::new());
        };
        let path = self.record_path(R::KIND, name);
        let projected: R =
            whitelist(Value::Object(raw.clone())).map_err(|e| Error::invalid_json(&path, &e))?;
        let known = serde_json::to_value(&projected).map_err(|e| Error::invalid_json(&path, &e))?;
        Ok(raw
            .into_iter()
            .filter(|(k, v)| !v.is_null() && known.get(k).is_none())
            .collect())
    }

    /// Reads a record through its typed view, including sibling code.
    pub fn read<R: Record>(&self, name: &str) -> Result<R> {
        validate_name(name)?;
        let path = self.record_path(R::KIND, name);
        let mut record: R = read_json(&path)?;
        if record.code().is_some() {
            let code = read_text(&code_path(&self.root, R::KIND, name))?;
            record.set_code(code);
        }
        Ok(record)
    }

    /// Writes a record projected through its whitelist.
    pub fn write<R: Record>(&self, record: &R) -> Result<()> {
        let name = record.name();
        validate_name(name)?;

        let mut record = record.clone();
        if R::KIND.has_schema_file() {
            let custom = self.custom_column_names(R::KIND)?;
            record.retain_columns(&custom);
        }

        write_json(&self.record_path(R::KIND, name), &record)?;
        if let Some(code) = record.code() {
            write_bytes(&code_path(&self.root, R::KIND, name), code.as_bytes())?;
        }
        Ok(())
    }

    /// Writes a collection, applying the row ordering and `item_id` options.
    pub fn write_collection(&self, collection: &Collection) -> Result<()> {
        let mut collection = collection.clone();
        collection.retain_schema_fields();
        if self.options.sort_collections {
            collection.sort_rows();
        }
        if !self.options.export_item_id {
            collection.strip_item_ids();
        }
        self.write(&collection)
    }

    /// Names of every stored asset of `kind`, sorted.
    pub fn list(&self, kind: Kind) -> Result<Vec<String>> {
        let dir = kind_dir(&self.root, kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if kind.is_nested() {
                if !path.is_dir() {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if path.join(format!("{name}.json")).is_file() {
                    names.push(name.to_string());
                }
            } else {
                if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|n| n.to_str()) else {
                    continue;
                };
                if kind.has_schema_file() && stem == "schema" {
                    continue;
                }
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Removes an asset's files. Missing files are not an error.
    pub fn delete(&self, kind: Kind, name: &str) -> Result<()> {
        validate_name(name)?;
        if kind.is_nested() {
            let dir = kind_dir(&self.root, kind).join(name);
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
        } else {
            remove_if_exists(&self.record_path(kind, name))?;
        }
        if kind == Kind::User {
            remove_if_exists(&user_roles_path(&self.root, name))?;
        }
        Ok(())
    }

    // Schemas

    /// Custom columns from `<dir>/schema.json`; empty when absent.
    pub fn read_schema(&self, kind: Kind) -> Result<Vec<Column>> {
        match read_json::<SchemaFile>(&schema_path(&self.root, kind)) {
            Ok(file) => Ok(file.columns),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Writes the schema file, dropping the kind's default columns.
    pub fn write_schema(&self, kind: Kind, columns: &[Column]) -> Result<()> {
        let defaults = kind.default_columns();
        let columns = columns
            .iter()
            .filter(|c| !defaults.contains(&c.name.as_str()))
            .cloned()
            .collect();
        write_json(&schema_path(&self.root, kind), &SchemaFile { columns })
    }

    fn custom_column_names(&self, kind: Kind) -> Result<BTreeSet<String>> {
        Ok(self
            .read_schema(kind)?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    // User roles

    pub fn read_user_roles(&self, email: &str) -> Result<Vec<String>> {
        validate_name(email)?;
        match read_json(&user_roles_path(&self.root, email)) {
            Ok(roles) => Ok(roles),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub fn write_user_roles(&self, email: &str, roles: &[String]) -> Result<()> {
        validate_name(email)?;
        let mut roles = roles.to_vec();
        roles.sort();
        roles.dedup();
        write_json(&user_roles_path(&self.root, email), &roles)
    }

    // Adapter files

    pub fn list_adapter_files(&self, adapter: &str) -> Result<Vec<String>> {
        validate_name(adapter)?;
        let dir = kind_dir(&self.root, Kind::Adapter).join(adapter).join("files");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if path.join(format!("{name}.json")).is_file() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn read_adapter_file(&self, adapter: &str, file: &str) -> Result<(AdapterFile, Vec<u8>)> {
        validate_name(adapter)?;
        validate_name(file)?;
        let dir = adapter_file_dir(&self.root, adapter, file);
        let meta: AdapterFile = read_json(&dir.join(format!("{file}.json")))?;
        let bytes = read_bytes(&dir.join(file))?;
        Ok((meta, bytes))
    }

    pub fn write_adapter_file(&self, adapter: &str, meta: &AdapterFile, bytes: &[u8]) -> Result<()> {
        validate_name(adapter)?;
        validate_name(&meta.name)?;
        let dir = adapter_file_dir(&self.root, adapter, &meta.name);
        write_json(&dir.join(format!("{}.json", meta.name)), meta)?;
        write_bytes(&dir.join(&meta.name), bytes)
    }

    // Portals

    #[must_use]
    pub fn portal_dir(&self, name: &str) -> PathBuf {
        path::portal_dir(&self.root, name)
    }

    // Name to ID maps

    fn map_path(&self, kind: MapKind) -> PathBuf {
        self.hidden_dir().join(MAP_DIR).join(kind.file_name())
    }

    pub fn id_map(&self, kind: MapKind) -> Result<IdMap> {
        IdMap::load(&self.map_path(kind))
    }

    pub fn id_for(&self, kind: MapKind, name: &str) -> Result<Option<String>> {
        Ok(self.id_map(kind)?.id_for(name).map(str::to_string))
    }

    pub fn name_for(&self, kind: MapKind, id: &str) -> Result<Option<String>> {
        Ok(self.id_map(kind)?.name_for(id).map(str::to_string))
    }

    pub fn put_id(&self, kind: MapKind, name: &str, id: &str) -> Result<()> {
        let mut map = self.id_map(kind)?;
        map.put(name, id);
        map.save()
    }

    pub fn remove_id(&self, kind: MapKind, name: &str) -> Result<()> {
        let mut map = self.id_map(kind)?;
        if map.remove(name).is_some() {
            map.save()?;
        }
        Ok(())
    }

    /// Creates the hidden directory and empty maps for a fresh repo.
    pub fn init_hidden(&self) -> Result<()> {
        fs::create_dir_all(self.hidden_dir().join(MAP_DIR))?;
        for kind in [MapKind::Collections, MapKind::Roles, MapKind::Users] {
            let path = self.map_path(kind);
            if !path.exists() {
                IdMap::load(&path)?.save()?;
            }
        }
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Device, Library, Role, Service, Timer, Trigger, User};
    use serde_json::json;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> RepoStore {
        RepoStore::new(temp.path(), Options::default())
    }

    #[test]
    fn test_service_roundtrip_with_code() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let mut svc = Service::new("A", "function x(){return 1}");
        svc.params = Some(vec!["a".into(), "b".into()]);
        store.write(&svc).unwrap();

        let read: Service = store.read("A").unwrap();
        assert_eq!(read, svc);
        let code = fs::read_to_string(temp.path().join("code/services/A/A.js")).unwrap();
        assert_eq!(code, "function x(){return 1}");
    }

    #[test]
    fn test_whitelisted_records_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let lib = Library {
            name: "L".into(),
            dependencies: Some("clearblade".into()),
            code: "var L = {};".into(),
            ..Library::default()
        };
        store.write(&lib).unwrap();
        assert_eq!(store.read::<Library>("L").unwrap(), lib);

        let role: Role = serde_json::from_value(json!({
            "Name": "Admin",
            "Description": "admins",
            "Permissions": {"CodeServices": [{"Name": "A", "Level": 1}], "Push": {"Level": 1}}
        }))
        .unwrap();
        store.write(&role).unwrap();
        assert_eq!(store.read::<Role>("Admin").unwrap(), role);

        let trigger: Trigger = serde_json::from_value(json!({
            "name": "t",
            "service_name": "A",
            "event_definition": {"def_module": "Data", "def_name": "ItemCreated"}
        }))
        .unwrap();
        store.write(&trigger).unwrap();
        assert_eq!(store.read::<Trigger>("t").unwrap(), trigger);

        let timer = Timer {
            name: "tick".into(),
            frequency: Some(60),
            repeats: Some(-1),
            ..Timer::default()
        };
        store.write(&timer).unwrap();
        assert_eq!(store.read::<Timer>("tick").unwrap(), timer);
    }

    #[test]
    fn test_read_raw_keeps_hand_edited_fields() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let path = store.record_path(Kind::Plugin, "p");
        write_json(&path, &json!({"name": "p", "hand_added": true})).unwrap();

        let raw = store.read_raw(Kind::Plugin, "p").unwrap();
        assert_eq!(raw["hand_added"], true);
    }

    #[test]
    fn test_unknown_fields_are_the_hand_added_ones() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let path = store.record_path(Kind::Timer, "tick");
        write_json(
            &path,
            &json!({"name": "tick", "frequency": 60, "description": null, "priority": "high"}),
        )
        .unwrap();

        let extra = store.unknown_fields::<Timer>("tick").unwrap();
        assert_eq!(Value::Object(extra), json!({"priority": "high"}));
        assert_eq!(store.read::<Timer>("tick").unwrap().frequency, Some(60));
    }

    #[test]
    fn test_schema_kinds_filter_custom_columns() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store
            .write_schema(
                Kind::Device,
                &[Column::new("device_key", "string"), Column::new("floor", "int")],
            )
            .unwrap();
        assert_eq!(store.read_schema(Kind::Device).unwrap(), vec![Column::new("floor", "int")]);

        let mut device = Device {
            name: "d".into(),
            ..Device::default()
        };
        device.columns.insert("floor".into(), json!(2));
        device.columns.insert("salt".into(), json!("x"));
        store.write(&device).unwrap();

        let raw = store.read_raw(Kind::Device, "d").unwrap();
        assert_eq!(raw, json!({"name": "d", "floor": 2}));
        assert_eq!(store.list(Kind::Device).unwrap(), vec!["d".to_string()]);
    }

    #[test]
    fn test_collection_sorting_and_item_id_elision() {
        let temp = TempDir::new().unwrap();
        let options = Options {
            sort_collections: true,
            export_item_id: false,
            ..Options::default()
        };
        let store = RepoStore::new(temp.path(), options);
        let mut coll = Collection::new("things");
        coll.schema.push(Column::new("v", "int"));
        for (id, v) in [("b", 2), ("a", 1)] {
            coll.items
                .push(json!({"item_id": id, "v": v}).as_object().unwrap().clone());
        }
        store.write_collection(&coll).unwrap();

        let raw = store.read_raw(Kind::Collection, "things").unwrap();
        assert_eq!(raw["items"], json!([{"v": 1}, {"v": 2}]));
    }

    #[test]
    fn test_list_and_delete() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.write(&Service::new("b", "")).unwrap();
        store.write(&Service::new("a", "")).unwrap();
        store.write(&User::new("x@y.z")).unwrap();
        store.write_user_roles("x@y.z", &["Authenticated".into()]).unwrap();
        store.write_schema(Kind::User, &[]).unwrap();

        assert_eq!(store.list(Kind::Service).unwrap(), vec!["a", "b"]);
        assert_eq!(store.list(Kind::User).unwrap(), vec!["x@y.z"]);

        store.delete(Kind::Service, "a").unwrap();
        store.delete(Kind::User, "x@y.z").unwrap();
        assert_eq!(store.list(Kind::Service).unwrap(), vec!["b"]);
        assert!(store.list(Kind::User).unwrap().is_empty());
        assert!(store.read_user_roles("x@y.z").unwrap().is_empty());
    }

    #[test]
    fn test_adapter_files() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let meta = AdapterFile {
            name: "run.sh".into(),
            ..AdapterFile::default()
        };
        store.write_adapter_file("ad", &meta, b"#!/bin/sh\n").unwrap();

        assert_eq!(store.list_adapter_files("ad").unwrap(), vec!["run.sh"]);
        let (read_meta, bytes) = store.read_adapter_file("ad", "run.sh").unwrap();
        assert_eq!(read_meta, meta);
        assert_eq!(bytes, b"#!/bin/sh\n");
    }

    #[test]
    fn test_id_maps() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.init_hidden().unwrap();
        store.put_id(MapKind::Roles, "Admin", "r1").unwrap();
        assert_eq!(store.id_for(MapKind::Roles, "Admin").unwrap().as_deref(), Some("r1"));
        assert_eq!(store.name_for(MapKind::Roles, "r1").unwrap().as_deref(), Some("Admin"));
        store.remove_id(MapKind::Roles, "Admin").unwrap();
        assert!(store.id_for(MapKind::Roles, "Admin").unwrap().is_none());
    }

    #[test]
    fn test_meta_token() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert_eq!(store.load_meta().unwrap(), Meta::default());
        store.save_token("tok").unwrap();
        assert_eq!(store.load_meta().unwrap().token, "tok");
    }
}
