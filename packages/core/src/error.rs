//! Error types shared by every filesystem.

use std::path::PathBuf;

use crate::path::{FsPath, PathError};

/// Errors returned by [`FileSystem`](crate::FileSystem) operations.
///
/// Not-found conditions are distinguishable from every other failure through
/// [`Error::is_not_found`]; composed filesystems rely on that to decide
/// whether to fall back to another layer.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The path does not exist.
    #[error("not found: {path}")]
    NotFound { path: FsPath },

    /// No configured route covers the path (nested filesystems).
    #[error("no route for path: {path}")]
    NoRoute { path: FsPath },

    #[error("already exists: {path}")]
    AlreadyExists { path: FsPath },

    #[error("not a directory: {path}")]
    NotADirectory { path: FsPath },

    #[error("is a directory: {path}")]
    IsADirectory { path: FsPath },

    #[error("directory not empty: {path}")]
    DirectoryNotEmpty { path: FsPath },

    #[error("permission denied: {path}: {reason}")]
    PermissionDenied { path: FsPath, reason: String },

    #[error("path error: {0}")]
    InvalidPath(#[from] PathError),

    /// A backend root could not be opened.
    #[error("invalid root {}: {message}", root.display())]
    InvalidRoot { root: PathBuf, message: String },

    /// The backend does not implement the operation.
    #[error("operation not supported: {operation}")]
    Unsupported { operation: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure inside a remote backend's transport.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// True for every flavour of "this path does not exist".
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } | Error::NoRoute { .. } => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn not_found(path: &FsPath) -> Self {
        Error::NotFound { path: path.clone() }
    }

    pub fn read_only(path: &FsPath) -> Self {
        Error::PermissionDenied {
            path: path.clone(),
            reason: "filesystem is read-only".to_string(),
        }
    }

    /// Classify an I/O error raised while operating on `path`.
    pub fn from_io(error: std::io::Error, path: &FsPath) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::NotFound => Error::NotFound { path: path.clone() },
            ErrorKind::AlreadyExists => Error::AlreadyExists { path: path.clone() },
            ErrorKind::PermissionDenied => Error::PermissionDenied {
                path: path.clone(),
                reason: error.to_string(),
            },
            _ => Error::Io(error),
        }
    }
}
