use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::Kind;

/// Checks that an asset name is usable as a single path segment.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName("name cannot be empty".to_string()));
    }

    if name.len() > 255 {
        return Err(Error::InvalidName(format!(
            "'{name}' exceeds 255 characters"
        )));
    }

    if name == "." || name == ".." {
        return Err(Error::InvalidName(format!("'{name}' is reserved")));
    }

    const INVALID_CHARS: &[char] = &['/', '\\', '\0', '\n', '\r'];
    if name.chars().any(|c| INVALID_CHARS.contains(&c)) {
        return Err(Error::InvalidName(format!(
            "'{name}' contains a path separator or control character"
        )));
    }

    Ok(())
}

/// Directory holding every asset of `kind`.
pub fn kind_dir(root: &Path, kind: Kind) -> PathBuf {
    root.join(kind.directory())
}

/// Path of an asset's JSON file.
pub fn record_path(root: &Path, kind: Kind, name: &str) -> PathBuf {
    let dir = kind_dir(root, kind);
    if kind.is_nested() {
        dir.join(name).join(format!("{name}.json"))
    } else {
        dir.join(format!("{name}.json"))
    }
}

/// Path of the sibling `.js` file for services and libraries.
pub fn code_path(root: &Path, kind: Kind, name: &str) -> PathBuf {
    kind_dir(root, kind).join(name).join(format!("{name}.js"))
}

pub fn schema_path(root: &Path, kind: Kind) -> PathBuf {
    kind_dir(root, kind).join("schema.json")
}

pub fn user_roles_path(root: &Path, email: &str) -> PathBuf {
    kind_dir(root, Kind::User)
        .join("roles")
        .join(format!("{email}.json"))
}

pub fn adapter_file_dir(root: &Path, adapter: &str, file: &str) -> PathBuf {
    kind_dir(root, Kind::Adapter)
        .join(adapter)
        .join("files")
        .join(file)
}

pub fn portal_dir(root: &Path, name: &str) -> PathBuf {
    kind_dir(root, Kind::Portal).join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_basic() {
        assert!(validate_name("MyService").is_ok());
        assert!(validate_name("user@example.com").is_ok());
        assert!(validate_name("with space").is_ok());
    }

    #[test]
    fn test_validate_name_rejects_separators() {
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn test_record_paths() {
        let root = Path::new("/repo");
        assert_eq!(
            record_path(root, Kind::Service, "A"),
            Path::new("/repo/code/services/A/A.json")
        );
        assert_eq!(code_path(root, Kind::Library, "L"), Path::new("/repo/code/libraries/L/L.js"));
        assert_eq!(record_path(root, Kind::Collection, "c"), Path::new("/repo/data/c.json"));
        assert_eq!(record_path(root, Kind::User, "a@b.c"), Path::new("/repo/users/a@b.c.json"));
        assert_eq!(schema_path(root, Kind::Device), Path::new("/repo/devices/schema.json"));
        assert_eq!(
            adapter_file_dir(root, "ad", "bin"),
            Path::new("/repo/adapters/ad/files/bin")
        );
    }
}
