use std::path::PathBuf;

/// Errors raised while turning configuration into filesystem handles.
///
/// Every variant names the backend identifier or file involved, so a
/// misconfiguration can be reported as-is at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown backend '{identifier}' (known backends: {})", known.join(", "))]
    UnknownBackend {
        identifier: String,
        known: Vec<String>,
    },

    #[error("invalid options for backend '{identifier}': {source}")]
    InvalidOptions {
        identifier: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to construct backend '{identifier}': {source}")]
    Construction {
        identifier: String,
        #[source]
        source: layerfs_core::Error,
    },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn construction(identifier: &str, source: impl Into<layerfs_core::Error>) -> Self {
        ConfigError::Construction {
            identifier: identifier.to_string(),
            source: source.into(),
        }
    }
}
