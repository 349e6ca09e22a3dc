use std::path::PathBuf;

use thiserror::Error;

use super::state::Operation;

/// Every way a background operation can fail
#[derive(Error, Debug)]
pub enum BackgroundError {
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Permission failure: {0}")]
    Permission(String),

    #[error("Failed to parse stylesheet: {0}")]
    Parse(String),

    #[error("No rule with a selector starting with '{0}' in the stylesheet")]
    RuleNotFound(String),

    #[error("Command `{command}` failed: {reason}")]
    ExternalCommand { command: String, reason: String },

    #[error("No image selected")]
    NoSelection,

    #[error("{0} is already in progress")]
    Busy(Operation),
}

impl BackgroundError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BackgroundError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn permission(reason: impl Into<String>) -> Self {
        BackgroundError::Permission(reason.into())
    }
}
