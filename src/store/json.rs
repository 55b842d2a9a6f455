use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// Reads and parses a JSON file, mapping a missing file to `NotFound` and a
/// parse failure to `InvalidFormat` with line information.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_text(path)?;
    serde_json::from_str(&content).map_err(|e| Error::invalid_json(path, &e))
}

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| from_io(path, e))
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| from_io(path, e))
}

/// Canonical form: two-space indent, keys sorted at every level, trailing newline.
pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String> {
    // Going through `Value` sorts struct fields as well as map keys.
    let value = serde_json::to_value(value)
        .map_err(|e| Error::Protocol(format!("could not serialize record: {e}")))?;
    let mut out = serde_json::to_string_pretty(&value)
        .map_err(|e| Error::Protocol(format!("could not serialize record: {e}")))?;
    out.push('\n');
    Ok(out)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_bytes(path, to_canonical_string(value)?.as_bytes())
}

pub fn write_bytes(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Parses a string that should hold JSON, attributing errors to `path`.
pub fn parse_value(path: &Path, content: &str) -> Result<Value> {
    serde_json::from_str(content).map_err(|e| Error::invalid_json(path, &e))
}

fn from_io(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::NotFound(path.display().to_string())
    } else {
        Error::Io(e)
    }
}
