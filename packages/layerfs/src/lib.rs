//! layerfs: layered, routed filesystems behind a single storage interface.
//!
//! - [`core`]: the `FileSystem` capability, paths, and the composing
//!   filesystems `NestedFs` (routing by path prefix) and `TransparentFs`
//!   (a writable top layer over a bottom layer)
//! - [`registry`]: builds filesystems from `{fs_class, kwargs}` configuration
//! - [`storage`]: name-oriented file storage over a filesystem
//! - [`http`]: read/write access to files behind an HTTP base URL
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use layerfs::registry::Registry;
//! use layerfs::storage::Storage;
//!
//! let storage = Storage::from_value(&Registry::with_builtins(), json!({
//!     "storage_config": {"fs_class": "transparent", "kwargs": {
//!         "top": {"fs_class": "memory"},
//!         "bottom": {"fs_class": "memory", "kwargs": {"files": {"a.txt": "base"}}}
//!     }}
//! })).unwrap();
//!
//! storage.delete("a.txt").unwrap();
//! assert!(!storage.exists("a.txt").unwrap());
//! ```

pub use layerfs_core as core;
#[cfg(feature = "http")]
pub use layerfs_http as http;
pub use layerfs_registry as registry;
pub use layerfs_storage as storage;
