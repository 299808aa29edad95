//! Core layerfs: the filesystem capability and its compositions
//!
//! This layer defines what every backend provides and how backends combine:
//! - `FsPath`: normalized, root-relative path
//! - `FileSystem`: path-addressed read/write/list/metadata operations
//! - `NestedFs`: routes operations to child filesystems by path prefix
//! - `TransparentFs`: a writable top layer over a read-mostly bottom layer
//!
//! Concrete leaves live here too: `MemoryFs`, `LocalFs`, and the `DirFs` and
//! `ReadOnlyFs` wrappers.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use layerfs_core::{fspath, FileSystem, MemoryFs, NestedFs, TransparentFs};
//!
//! let base = MemoryFs::with_files([("logo.png", "png")]).unwrap();
//! let media = TransparentFs::new(Arc::new(MemoryFs::new()), Arc::new(base));
//! let root = NestedFs::new().with_route("media", Arc::new(media)).unwrap();
//!
//! assert!(root.exists(&fspath!("media/logo.png")).unwrap());
//! ```

pub use bytes::Bytes;

mod error;
mod info;
mod local;
mod memory;
pub mod nested;
mod path;
pub mod path_trie;
mod traits;
pub mod transparent;
mod views;

pub use error::Error;
pub use info::{FileInfo, FileType};
pub use local::LocalFs;
pub use memory::MemoryFs;
pub use nested::NestedFs;
pub use path::{FsPath, PathError};
pub use path_trie::PathTrie;
pub use traits::{copy_tree, FileSystem, FileWriter, FsHandle, ReadStream, WriteMode, WriteStream};
pub use transparent::TransparentFs;
pub use views::{DirFs, ReadOnlyFs};
