use layerfs_core::Error as FsError;
use layerfs_registry::ConfigError;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// The named file does not exist.
    #[error("file does not exist: {name}")]
    NotFound { name: String },

    #[error("improperly configured: {message}")]
    ImproperlyConfigured { message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The name cannot be turned into a safe file name.
    #[error("could not derive a file name from '{name}'")]
    InvalidName { name: String },

    #[error("operation not supported by this storage: {operation}")]
    Unsupported { operation: &'static str },

    #[error(transparent)]
    Fs(#[from] FsError),
}

impl StorageError {
    /// Translate a filesystem error for the file `name`.
    pub(crate) fn from_fs(error: FsError, name: &str) -> Self {
        if error.is_not_found() {
            StorageError::NotFound {
                name: name.to_string(),
            }
        } else {
            StorageError::Fs(error)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
