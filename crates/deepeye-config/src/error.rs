//! Config errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Filesystem operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    /// Reading a config file.
    Read,
    /// Writing a config file.
    Write,
    /// Creating the config directory.
    CreateDir,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileOp::Read => "read",
            FileOp::Write => "write",
            FileOp::CreateDir => "create directory",
        })
    }
}

/// Errors from loading, saving or validating an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A filesystem operation on `path` failed.
    #[error("cannot {op} '{path}': {source}")]
    File {
        /// What was being attempted.
        op: FileOp,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML for this schema.
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Serialization failed.
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A value is out of range.
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Dotted field path, e.g. `audio.buffer_frames`.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Wrap an I/O failure of `op` on `path`.
    pub fn file(op: FileOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::File {
            op,
            path: path.into(),
            source,
        }
    }

    /// Reject `field`.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn file_errors_keep_path_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ConfigError::file(FileOp::CreateDir, "/some/dir", io);
        assert_eq!(err.to_string(), "cannot create directory '/some/dir': gone");
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_names_the_field() {
        let err = ConfigError::invalid("audio.channels", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid value for 'audio.channels': must be at least 1"
        );
        assert!(err.source().is_none());
    }
}
