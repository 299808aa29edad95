//! # layerfs-http
//!
//! A remote object-store backend for layerfs.
//!
//! [`HttpFs`] maps filesystem operations onto HTTP requests against a base
//! URL (`GET`, `HEAD`, `PUT`, `DELETE`), using a blocking `reqwest` client.
//! Status codes are translated into the core error vocabulary: `404` and
//! `410` become not-found, `401` and `403` become permission errors, and
//! anything else is a transport error carrying the status.
//!
//! ```ignore
//! use layerfs_http::HttpFs;
//! use layerfs_core::{fspath, FileSystem};
//!
//! let fs = HttpFs::new("https://objects.example.com/bucket/")?;
//! let bytes = fs.cat(&fspath!("reports/2024.csv"))?;
//! ```

pub mod blocking;
pub mod error;

pub use blocking::HttpFs;
pub use error::Error;
