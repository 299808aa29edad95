//! # layerfs-cli
//!
//! Command-line access to a layerfs storage.
//!
//! The storage is described by a JSON options file (see
//! [`StorageOptions`]). Without `--config`, the file at
//! `<config dir>/layerfs/storage.json` is used when present, and the
//! current directory otherwise.
//!
//! ## Usage
//!
//! ```bash
//! layerfs --config storage.json ls static
//! layerfs save uploads/report.pdf ./report.pdf
//! layerfs cat static/site.css
//! layerfs backends
//! ```

pub mod commands;
mod error;

use std::path::{Path, PathBuf};

use serde_json::json;

use layerfs_registry::{load_config, FsConfig, Registry};
use layerfs_storage::{Storage, StorageOptions};

pub use commands::{execute, Command};
pub use error::CliError;

/// Default location of the options file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("layerfs").join("storage.json"))
}

/// Options loaded from `path`, or from the default options file, or a local
/// storage over the current directory when there is none.
pub fn load_options(path: Option<&Path>) -> Result<StorageOptions, CliError> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.is_file()),
    };

    match path {
        Some(path) => {
            tracing::debug!("Loading storage options from {}", path.display());
            Ok(load_config(&path)?)
        }
        None => {
            tracing::debug!("No options file, using the current directory");
            Ok(StorageOptions::new(
                FsConfig::new("local").with_kwarg("root", json!(".")),
            ))
        }
    }
}

/// Open the storage described by `options`.
pub fn open_storage(registry: &Registry, options: StorageOptions) -> Result<Storage, CliError> {
    Ok(Storage::from_options(registry, options)?)
}
