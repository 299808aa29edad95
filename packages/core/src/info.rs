//! Metadata records returned by `info` and `ls`.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Kind of filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
}

/// Metadata about a file or directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Base name of the entry (not the full path). Empty for a root.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileType,
    /// Size in bytes (0 for directories).
    pub size: u64,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

impl FileInfo {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: FileType::File,
            size,
            created: None,
            modified: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileType::Directory,
            size: 0,
            created: None,
            modified: None,
        }
    }

    #[must_use]
    pub fn with_times(mut self, created: Option<SystemTime>, modified: Option<SystemTime>) -> Self {
        self.created = created;
        self.modified = modified;
        self
    }

    /// Same metadata under another name.
    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileType::File
    }
}
