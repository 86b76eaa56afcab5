use std::path::{Path, PathBuf};

use thiserror::Error;

/// Every way a translation run can fail. Nothing is retried or swallowed
/// once one of these is produced; the pipeline stops and hands it back.
#[derive(Debug, Error)]
pub enum Error {
    /// The file has an unsupported extension or its content is malformed.
    #[error("{}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The API answered with a non-success status or could not be reached.
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: String,
        message: String,
    },

    #[error("{provider} request timed out after {seconds}s")]
    Timeout {
        provider: &'static str,
        seconds: u64,
    },

    /// The API answered, but not with one translation per requested entry.
    #[error("unexpected API response: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to render prompt: {0}")]
    Prompt(#[from] tera::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn format(path: &Path, message: impl Into<String>) -> Self {
        Error::Format {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Error::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format { .. })
    }
}
