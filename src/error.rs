use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("invalid JSON in {}: line {line}, column {column}: {message}", path.display())]
    InvalidFormat {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("aborted by user")]
    UserAborted,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("portal: {0}")]
    Portal(String),

    #[error("invalid asset name: {0}")]
    InvalidName(String),
}

impl Error {
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailure(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Wraps a JSON parse failure with the file it came from and a hint
    /// pointing at the offending line.
    pub fn invalid_json(path: &Path, err: &serde_json::Error) -> Self {
        let hint = match err.classify() {
            serde_json::error::Category::Syntax => {
                " (hint: look for a missing comma, quote or brace on or just before this line)"
            }
            serde_json::error::Category::Eof => " (hint: the file ends early; check for an unclosed brace)",
            serde_json::error::Category::Data => " (hint: a field has the wrong type)",
            serde_json::error::Category::Io => "",
        };
        Self::InvalidFormat {
            path: path.to_path_buf(),
            line: err.line(),
            column: err.column(),
            message: format!("{err}{hint}"),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_json_carries_line_number() {
        let err = serde_json::from_str::<serde_json::Value>("{\n  \"a\": 1,\n  \"b\" 2\n}").unwrap_err();
        let wrapped = Error::invalid_json(Path::new("data/foo.json"), &err);
        match &wrapped {
            Error::InvalidFormat { line, .. } => assert_eq!(*line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
        let text = wrapped.to_string();
        assert!(text.contains("data/foo.json"));
        assert!(text.contains("line 3"));
        assert!(text.contains("hint"));
    }

    #[test]
    fn test_classification_helpers() {
        assert!(Error::AuthFailure("expired".into()).is_auth_failure());
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(Error::Transport("reset".into()).is_transport());
        assert!(!Error::Conflict("dup".into()).is_not_found());
    }
}
