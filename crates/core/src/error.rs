use std::path::PathBuf;

use crate::backend::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("Failed to load SQL files from {path:?}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to backend: {0}")]
    Connectivity(#[source] BackendError),

    #[error("Failed to execute SQL file {name:?}: {source}")]
    Script {
        name: String,
        #[source]
        source: BackendError,
    },

    #[error("Execution cancelled before all SQL files completed")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EtlError {
    /// Name of the script a [`EtlError::Script`] failure is attributed to.
    pub fn script_name(&self) -> Option<&str> {
        match self {
            Self::Script { name, .. } => Some(name),
            _ => None,
        }
    }
}
