//! Declarative filesystem configuration.
//!
//! A backend is described by a record like:
//! ```json
//! {"fs_class": "local", "kwargs": {"root": "/srv/media"}}
//! {"fs_class": "memory", "read_only": true}
//! {"fs_class": "nested", "kwargs": {"routes": [
//!     {"prefix": "images", "fs_class": "memory"},
//!     {"prefix": "", "fs_class": "local", "kwargs": {"root": "/srv"}}
//! ]}}
//! {"fs_class": "transparent", "kwargs": {
//!     "top": {"fs_class": "memory"},
//!     "bottom": {"fs_class": "local", "kwargs": {"root": "/srv/static"}}
//! }}
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ConfigError;

/// Configuration for one filesystem handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FsConfig {
    /// Registry identifier of the backend.
    pub fs_class: String,
    /// Backend options, validated by the backend's factory.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    /// Scope the handle to this directory of the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_to_path: Option<String>,
    /// Reject every mutation through the handle.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl FsConfig {
    pub fn new(fs_class: impl Into<String>) -> Self {
        Self {
            fs_class: fs_class.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }
}

/// One route of a `nested` backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Path prefix; `""` is the default route.
    pub prefix: String,
    pub fs_class: String,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_to_path: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl RouteConfig {
    /// The filesystem half of the route.
    pub fn fs_config(&self) -> FsConfig {
        FsConfig {
            fs_class: self.fs_class.clone(),
            kwargs: self.kwargs.clone(),
            relative_to_path: self.relative_to_path.clone(),
            read_only: self.read_only,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Options of the `memory` backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryOptions {
    /// Files to seed, path to UTF-8 content.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// Options of the `local` / `file` backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalOptions {
    pub root: PathBuf,
    #[serde(default = "default_true")]
    pub auto_mkdir: bool,
    #[serde(default)]
    pub create_root: bool,
}

/// Options of the `http` backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpOptions {
    pub base_url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Options of the `nested` backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NestedOptions {
    pub routes: Vec<RouteConfig>,
}

/// Options of the `transparent` backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransparentOptions {
    pub top: FsConfig,
    pub bottom: FsConfig,
}

/// Deserialize a backend's options, attributing failures to `identifier`.
pub fn parse_options<T: DeserializeOwned>(identifier: &str, kwargs: Value) -> Result<T, ConfigError> {
    // Absent kwargs behave like an empty mapping.
    let kwargs = match kwargs {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(kwargs).map_err(|source| ConfigError::InvalidOptions {
        identifier: identifier.to_string(),
        source,
    })
}

/// Load a JSON configuration file.
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    log::debug!("Loading configuration from {}", path.display());
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
