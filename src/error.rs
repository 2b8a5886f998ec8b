use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopoprobeError {
    #[error("Unsupported probe {0}")]
    UnsupportedProbe(String),

    #[error("Failed to instantiate probe {name}: {source}")]
    ProbeConstructionFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to load extension {name} from {}: {source}", path.display())]
    ExtensionLoadError {
        name: String,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Non compliant extension {name}: symbol {symbol} not exported ({reason})")]
    NonCompliantExtension {
        name: String,
        symbol: String,
        reason: String,
    },

    #[error("Invalid extension {name}: expected `{expected}`, found `{observed}`")]
    InvalidExtensionSignature {
        name: String,
        expected: String,
        observed: String,
    },

    #[error("Failed to instantiate extension {name}: {source}")]
    ExtensionConstructionFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to start probe {name}: {source}")]
    ProbeStartFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TopoprobeError {
    /// Name of the probe or extension the error is about, if any.
    pub fn probe_name(&self) -> Option<&str> {
        match self {
            TopoprobeError::UnsupportedProbe(name) => Some(name),
            TopoprobeError::ProbeConstructionFailed { name, .. }
            | TopoprobeError::ExtensionLoadError { name, .. }
            | TopoprobeError::NonCompliantExtension { name, .. }
            | TopoprobeError::InvalidExtensionSignature { name, .. }
            | TopoprobeError::ExtensionConstructionFailed { name, .. }
            | TopoprobeError::ProbeStartFailed { name, .. } => Some(name),
            TopoprobeError::ConfigError(_) | TopoprobeError::IoError(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TopoprobeError>;
