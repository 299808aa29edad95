//! Backend registry and resolver for layerfs.
//!
//! Configuration names a backend by identifier and passes it options:
//!
//! ```json
//! {"fs_class": "transparent", "kwargs": {
//!     "top": {"fs_class": "memory"},
//!     "bottom": {"fs_class": "local", "kwargs": {"root": "/srv/static"}, "read_only": true}
//! }}
//! ```
//!
//! [`Registry::resolve`] looks the identifier up in an explicit table of
//! factories and hands each factory its options, which it deserializes into a
//! typed struct. Unknown identifiers and unknown option keys are rejected
//! when the configuration is loaded, not on first use.

pub mod config;
mod error;
mod registry;

pub use config::{load_config, FsConfig, RouteConfig};
pub use error::ConfigError;
pub use registry::{FsFactory, Registry};
