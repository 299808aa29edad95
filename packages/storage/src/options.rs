use serde::{Deserialize, Serialize};
use serde_json::Value;

use layerfs_registry::FsConfig;

use crate::StorageError;

fn default_true() -> bool {
    true
}

/// Options of a [`Storage`](crate::Storage).
///
/// ```json
/// {
///     "storage_config": {"fs_class": "local", "kwargs": {"root": "/srv/media"}},
///     "location": "uploads",
///     "base_url": "https://media.example.com/uploads/",
///     "allow_overwrite": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageOptions {
    /// The filesystem every name is stored in.
    pub storage_config: FsConfig,
    /// Directory of the filesystem that names are relative to.
    #[serde(default)]
    pub location: String,
    /// Prefix that `url` prepends to names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Replace existing files on save instead of picking another name.
    #[serde(default = "default_true")]
    pub allow_overwrite: bool,
    /// Create parent directories on save.
    #[serde(default = "default_true")]
    pub auto_mkdir: bool,
}

impl StorageOptions {
    pub fn new(storage_config: FsConfig) -> Self {
        Self {
            storage_config,
            location: String::new(),
            base_url: None,
            allow_overwrite: true,
            auto_mkdir: true,
        }
    }

    /// Parse options from a JSON value, reporting missing or unknown
    /// settings as `ImproperlyConfigured`.
    pub fn from_value(value: Value) -> Result<Self, StorageError> {
        serde_json::from_value(value).map_err(|e| StorageError::ImproperlyConfigured {
            message: e.to_string(),
        })
    }
}
