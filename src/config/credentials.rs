use std::fs;
use std::path::PathBuf;

use directories::BaseDirs;

use crate::error::{Error, Result};

const AUTH_FILE: &str = ".cbauth";

/// Location of the plain-text developer token, `~/.cbauth`.
pub fn auth_file_path() -> Result<PathBuf> {
    let dirs = BaseDirs::new()
        .ok_or_else(|| Error::Config("could not determine home directory. Is $HOME set?".into()))?;
    Ok(dirs.home_dir().join(AUTH_FILE))
}

pub fn load_cached_token() -> Result<Option<String>> {
    let path = auth_file_path()?;
    match fs::read_to_string(&path) {
        Ok(content) => {
            let token = content.trim();
            Ok((!token.is_empty()).then(|| token.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_cached_token(token: &str) -> Result<()> {
    let path = auth_file_path()?;
    fs::write(&path, token)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

pub fn delete_cached_token() -> Result<bool> {
    let path = auth_file_path()?;
    if path.exists() {
        fs::remove_file(&path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}
