use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Kind, Record};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    #[serde(default)]
    pub def_module: String,
    #[serde(default)]
    pub def_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `triggers/<name>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_definition: Option<EventDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_value_pairs: Option<Value>,
}

impl Record for Trigger {
    const KIND: Kind = Kind::Trigger;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Trigger {
    /// The push body: the stored record with `def_module` and `def_name`
    /// lifted out of `event_definition` to the top level.
    pub fn push_body(&self) -> serde_json::Result<Map<String, Value>> {
        let mut body = to_object(self)?;
        if let Some(def) = &self.event_definition {
            body.insert("def_module".into(), Value::String(def.def_module.clone()));
            body.insert("def_name".into(), Value::String(def.def_name.clone()));
        }
        Ok(body)
    }
}

/// `timers/<name>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeats: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
}

impl Record for Timer {
    const KIND: Kind = Kind::Timer;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Timer {
    /// Start time placeholder resolved to the current UTC time at push.
    pub const START_NOW: &'static str = "Now";

    pub fn push_body(&self) -> serde_json::Result<Map<String, Value>> {
        let mut body = to_object(self)?;
        if self.start_time.as_deref() == Some(Self::START_NOW) {
            body.insert(
                "start_time".into(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        Ok(body)
    }
}

fn to_object<T: Serialize>(value: &T) -> serde_json::Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
