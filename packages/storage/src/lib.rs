//! A file storage adapter over layerfs filesystems.
//!
//! `Storage` exposes name-oriented file operations (save, open, delete,
//! listing, URLs, timestamps) on top of any `FileSystem`, typically one
//! resolved from configuration through the backend registry.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use layerfs_registry::Registry;
//! use layerfs_storage::Storage;
//!
//! let storage = Storage::from_value(&Registry::with_builtins(), json!({
//!     "storage_config": {
//!         "fs_class": "nested",
//!         "kwargs": {"routes": [{"prefix": "media", "fs_class": "memory"}]}
//!     },
//!     "base_url": "/files/"
//! })).unwrap();
//!
//! storage.save("media/a.txt", &mut &b"a"[..], None).unwrap();
//! assert_eq!(storage.url("media/a.txt").unwrap(), "/files/media/a.txt");
//! ```

mod error;
mod options;
mod storage;

pub use error::StorageError;
pub use options::StorageOptions;
pub use storage::Storage;
