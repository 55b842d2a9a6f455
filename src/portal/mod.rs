//! Lossless conversion between a portal's single config document and a tree
//! of files under `portals/<name>/config/`.
//!
//! ```text
//! config/
//!   .cb-portal                         format marker
//!   meta.json                          top-level keys other than the three below
//!   datasources/<name>.json            full datasource object
//!   widgets/<type>_<id>/meta.json      widget without `props`
//!   widgets/<type>_<id>/settings.json  widget `props`, parser payloads blanked
//!   widgets/<type>_<id>/parsers/<setting>/<side>/index.{js,html,css}
//!   internalResources/<name>/meta.json resource without its contents
//!   internalResources/<name>/<name>    resource contents
//! ```

mod parsers;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::json::{read_json, read_text, write_bytes, write_json};
use crate::store::path::validate_name;

use self::parsers::{Payload, SIDES, STRING_FILE, is_parser_setting, payload, side_value, side_value_mut};

pub const MARKER_FILE: &str = ".cb-portal";
pub const MARKER: &str = "compressed-v1";

const DATASOURCES: &str = "datasources";
const WIDGETS: &str = "widgets";
const RESOURCES: &str = "internalResources";
const RESOURCE_CONTENT: &str = "file";

/// True when `config_dir` holds a decompressed tree rather than nothing or a legacy layout.
pub fn is_decompressed(config_dir: &Path) -> bool {
    config_dir.join(MARKER_FILE).is_file()
}

/// Fans a portal config out into `config_dir`, replacing whatever was there.
pub fn decompress(config: &Value, config_dir: &Path) -> Result<()> {
    let config = config
        .as_object()
        .ok_or_else(|| Error::Portal("config is not a JSON object".into()))?;

    if config_dir.exists() {
        fs::remove_dir_all(config_dir)?;
    }
    fs::create_dir_all(config_dir)?;

    let mut rest = config.clone();
    rest.remove(DATASOURCES);
    rest.remove(WIDGETS);
    rest.remove(RESOURCES);
    write_json(&config_dir.join("meta.json"), &rest)?;

    if let Some(datasources) = config.get(DATASOURCES) {
        let dir = config_dir.join(DATASOURCES);
        fs::create_dir_all(&dir)?;
        let mut used = HashSet::new();
        for (id, ds) in keyed(datasources, DATASOURCES)? {
            check_id(id, ds, "datasource")?;
            let file = unique_name(&mut used, display_name(ds, id), id);
            write_json(&dir.join(format!("{file}.json")), ds)?;
        }
    }

    if let Some(widgets) = config.get(WIDGETS) {
        let dir = config_dir.join(WIDGETS);
        fs::create_dir_all(&dir)?;
        for (id, widget) in keyed(widgets, WIDGETS)? {
            decompress_widget(&dir, id, widget)?;
        }
    }

    if let Some(resources) = config.get(RESOURCES) {
        let dir = config_dir.join(RESOURCES);
        fs::create_dir_all(&dir)?;
        let mut used = HashSet::new();
        for (id, resource) in keyed(resources, RESOURCES)? {
            check_id(id, resource, "internal resource")?;
            let name = resource
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Portal(format!("internal resource {id} has no name")))?;
            validate_name(name)?;
            let folder = unique_name(&mut used, name.to_string(), id);
            let res_dir = dir.join(&folder);

            let mut meta = resource.as_object().cloned().unwrap_or_default();
            if let Some(content) = meta.remove(RESOURCE_CONTENT) {
                let Value::String(text) = content else {
                    return Err(Error::Portal(format!(
                        "internal resource {name} has non-string contents"
                    )));
                };
                write_bytes(&res_dir.join(name), text.as_bytes())?;
            }
            write_json(&res_dir.join("meta.json"), &meta)?;
        }
    }

    write_bytes(&config_dir.join(MARKER_FILE), MARKER.as_bytes())?;
    debug!(dir = %config_dir.display(), "decompressed portal config");
    Ok(())
}

fn decompress_widget(dir: &Path, id: &str, widget: &Value) -> Result<()> {
    let obj = widget
        .as_object()
        .ok_or_else(|| Error::Portal(format!("widget {id} is not an object")))?;
    let widget_type = obj.get("type").and_then(Value::as_str).unwrap_or_default();
    if id.contains('_') || id.is_empty() {
        return Err(Error::Portal(format!(
            "widget id '{id}' cannot be encoded in a directory name"
        )));
    }
    let folder = format!("{widget_type}_{id}");
    validate_name(&folder)?;
    let widget_dir = dir.join(&folder);

    let mut meta = obj.clone();
    let props = meta.remove("props");
    write_json(&widget_dir.join("meta.json"), &meta)?;

    let Some(mut props) = props else {
        return Ok(());
    };

    if let Some(settings) = props.as_object_mut() {
        for (setting_name, setting) in settings.iter_mut() {
            if !is_parser_setting(setting) {
                continue;
            }
            validate_name(setting_name)?;
            let Some(setting) = setting.as_object_mut() else {
                continue;
            };
            for side in SIDES {
                let Some(value) = side_value_mut(setting, side) else {
                    continue;
                };
                let side_dir = widget_dir.join("parsers").join(setting_name).join(side);
                match payload(value) {
                    Payload::Source(code) => {
                        write_bytes(&side_dir.join(STRING_FILE), code.as_bytes())?;
                        *value = Value::String(String::new());
                    }
                    Payload::Sources(found) => {
                        for (file, pointer) in found {
                            if let Some(slot) = value.pointer_mut(&pointer) {
                                let code = slot.as_str().unwrap_or_default().to_string();
                                write_bytes(&side_dir.join(file), code.as_bytes())?;
                                *slot = Value::String(String::new());
                            }
                        }
                    }
                    Payload::Other => {}
                }
            }
        }
    }

    write_json(&widget_dir.join("settings.json"), &props)
}

/// Rebuilds the portal config document from `config_dir`.
pub fn compress(config_dir: &Path) -> Result<Value> {
    if !is_decompressed(config_dir) {
        return Err(Error::Portal(format!(
            "{} is not a decompressed portal (missing {MARKER_FILE})",
            config_dir.display()
        )));
    }

    let meta_path = config_dir.join("meta.json");
    let mut config: Map<String, Value> = if meta_path.exists() {
        read_json(&meta_path)?
    } else {
        Map::new()
    };

    let ds_dir = config_dir.join(DATASOURCES);
    if ds_dir.is_dir() {
        let mut datasources = Map::new();
        for path in sorted_entries(&ds_dir)? {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let ds: Value = read_json(&path)?;
            let id = id_of(&ds).ok_or_else(|| {
                Error::Portal(format!("{}: datasource has no id", path.display()))
            })?;
            datasources.insert(id, ds);
        }
        config.insert(DATASOURCES.into(), Value::Object(datasources));
    }

    let widget_dir = config_dir.join(WIDGETS);
    if widget_dir.is_dir() {
        let mut widgets = Map::new();
        for path in sorted_entries(&widget_dir)? {
            if !path.is_dir() {
                continue;
            }
            let (id, widget) = compress_widget(&path)?;
            widgets.insert(id, widget);
        }
        config.insert(WIDGETS.into(), Value::Object(widgets));
    }

    let res_dir = config_dir.join(RESOURCES);
    if res_dir.is_dir() {
        let mut resources = Map::new();
        for path in sorted_entries(&res_dir)? {
            if !path.is_dir() {
                continue;
            }
            let meta_path = path.join("meta.json");
            let mut resource: Map<String, Value> = read_json(&meta_path).map_err(|e| missing(e, &meta_path))?;
            let id = id_of(&Value::Object(resource.clone())).ok_or_else(|| {
                Error::Portal(format!("{}: internal resource has no id", meta_path.display()))
            })?;
            let name = resource
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Portal(format!("{}: internal resource has no name", meta_path.display())))?
                .to_string();
            let content_path = path.join(&name);
            if content_path.is_file() {
                resource.insert(RESOURCE_CONTENT.into(), Value::String(read_text(&content_path)?));
            }
            resources.insert(id, Value::Object(resource));
        }
        config.insert(RESOURCES.into(), Value::Object(resources));
    }

    Ok(Value::Object(config))
}

fn compress_widget(dir: &Path) -> Result<(String, Value)> {
    let folder = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let (_widget_type, id) = folder
        .rsplit_once('_')
        .filter(|(_, id)| !id.is_empty())
        .ok_or_else(|| {
            Error::Portal(format!(
                "{}: widget directory must be named <type>_<id>",
                dir.display()
            ))
        })?;

    let meta_path = dir.join("meta.json");
    let mut widget: Map<String, Value> = read_json(&meta_path).map_err(|e| missing(e, &meta_path))?;

    let settings_path = dir.join("settings.json");
    if settings_path.exists() {
        let mut props: Value = read_json(&settings_path)?;
        if let Some(settings) = props.as_object_mut() {
            for (setting_name, setting) in settings.iter_mut() {
                if !is_parser_setting(setting) {
                    continue;
                }
                let Some(setting) = setting.as_object_mut() else {
                    continue;
                };
                for side in SIDES {
                    if side_value(setting, side).is_none() {
                        continue;
                    }
                    let side_dir = dir.join("parsers").join(setting_name).join(side);
                    let Some(value) = side_value_mut(setting, side) else {
                        continue;
                    };
                    reinject(value, &side_dir)?;
                }
            }
        }
        widget.insert("props".into(), props);
    }

    Ok((id.to_string(), Value::Object(widget)))
}

fn reinject(value: &mut Value, side_dir: &Path) -> Result<()> {
    let replacements: Vec<(String, String)> = match payload(value) {
        Payload::Source(_) => {
            let path = side_dir.join(STRING_FILE);
            *value = Value::String(read_text(&path).map_err(|e| missing(e, &path))?);
            return Ok(());
        }
        Payload::Sources(found) => found
            .into_iter()
            .map(|(file, pointer)| {
                let path = side_dir.join(file);
                read_text(&path)
                    .map_err(|e| missing(e, &path))
                    .map(|code| (pointer, code))
            })
            .collect::<Result<_>>()?,
        Payload::Other => return Ok(()),
    };
    for (pointer, code) in replacements {
        if let Some(slot) = value.pointer_mut(&pointer) {
            *slot = Value::String(code);
        }
    }
    Ok(())
}

fn missing(err: Error, path: &Path) -> Error {
    if err.is_not_found() {
        Error::Portal(format!("missing {}", path.display()))
    } else {
        err
    }
}

fn keyed<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::Portal(format!("{what} is not an object keyed by id")))
}

fn id_of(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn check_id(key: &str, value: &Value, what: &str) -> Result<()> {
    match id_of(value) {
        Some(id) if id == key => Ok(()),
        _ => Err(Error::Portal(format!(
            "{what} {key} must carry an `id` field equal to its key"
        ))),
    }
}

fn display_name(value: &Value, id: &str) -> String {
    value
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| validate_name(n).is_ok())
        .unwrap_or(id)
        .to_string()
}

/// `name`, or `name_<id>` when taken, then `name_<id>_2`, `name_<id>_3`...
/// until the candidate is free.
fn unique_name(used: &mut HashSet<String>, name: String, id: &str) -> String {
    let mut candidate = name.clone();
    let mut attempt = 1;
    while used.contains(&candidate) {
        candidate = match attempt {
            1 => format!("{name}_{id}"),
            n => format!("{name}_{id}_{n}"),
        };
        attempt += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn sorted_entries(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}
