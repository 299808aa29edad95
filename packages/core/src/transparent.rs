//! TransparentFs: a writable top layer over a read-mostly bottom layer.
//!
//! Reads consult `top` first and fall through to `bottom` on not-found.
//! Every mutation lands on `top`; `bottom` is never written.
//!
//! Deletions of bottom content are recorded in `top` as markers:
//!
//! - `<name>.deleted`, an empty file, hides `<name>` in `bottom`.
//! - `<name>.replaced`, a directory, hides everything `bottom` has under
//!   `<name>`. It is created when a directory is recreated over a deleted one.
//!
//! Marker names are reserved in `top` and never appear in listings.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::{
    copy_tree, Error, FileInfo, FileSystem, FileWriter, FsHandle, FsPath, ReadStream, WriteMode,
    WriteStream,
};

const DELETED_SUFFIX: &str = ".deleted";
const REPLACED_SUFFIX: &str = ".replaced";

fn is_marker(entry: &FileInfo) -> bool {
    (entry.is_file() && entry.name.ends_with(DELETED_SUFFIX))
        || (entry.is_dir() && entry.name.ends_with(REPLACED_SUFFIX))
}

/// Bottom listing failures that leave the top listing complete.
fn adds_nothing(error: &Error) -> bool {
    error.is_not_found()
        || matches!(
            error,
            Error::NotADirectory { .. } | Error::Unsupported { .. }
        )
}

/// Two filesystems viewed as one.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use layerfs_core::{fspath, FileSystem, MemoryFs, TransparentFs};
///
/// let bottom = MemoryFs::with_files([("a.txt", "hi")]).unwrap();
/// let fs = TransparentFs::new(Arc::new(MemoryFs::new()), Arc::new(bottom.clone()));
///
/// fs.pipe(&fspath!("a.txt"), b"new").unwrap();
/// assert_eq!(fs.cat(&fspath!("a.txt")).unwrap(), &b"new"[..]);
/// assert_eq!(bottom.cat(&fspath!("a.txt")).unwrap(), &b"hi"[..]);
/// ```
pub struct TransparentFs {
    top: FsHandle,
    bottom: FsHandle,
}

impl TransparentFs {
    pub fn new(top: FsHandle, bottom: FsHandle) -> Self {
        Self { top, bottom }
    }

    pub fn top(&self) -> &FsHandle {
        &self.top
    }

    pub fn bottom(&self) -> &FsHandle {
        &self.bottom
    }

    /// Whether a marker in `top` hides `path` in `bottom`.
    fn hidden(&self, path: &FsPath) -> Result<bool, Error> {
        for ancestor in path.ancestors_inclusive() {
            for suffix in [DELETED_SUFFIX, REPLACED_SUFFIX] {
                if let Some(marker) = ancestor.with_suffix(suffix) {
                    if self.top.exists(&marker)? {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Run a read against `top`, falling back to `bottom` when `top` reports
    /// not-found and nothing hides the path.
    fn layered<T>(
        &self,
        path: &FsPath,
        op: impl Fn(&dyn FileSystem) -> Result<T, Error>,
    ) -> Result<T, Error> {
        match op(&*self.top) {
            Err(top_err) if top_err.is_not_found() => {
                if self.hidden(path)? {
                    return Err(top_err);
                }
                op(&*self.bottom).map_err(|bottom_err| {
                    log::debug!("Both layers failed for {}: {}", path, bottom_err);
                    top_err
                })
            }
            other => other,
        }
    }

    fn visible_in_bottom(&self, path: &FsPath) -> Result<bool, Error> {
        Ok(!self.hidden(path)? && self.bottom.exists(path)?)
    }

    fn whiteout(path: &FsPath) -> Result<FsPath, Error> {
        path.with_suffix(DELETED_SUFFIX)
            .ok_or_else(|| Error::PermissionDenied {
                path: path.clone(),
                reason: "the root cannot be marked deleted".to_string(),
            })
    }

    fn replaced(path: &FsPath) -> Result<FsPath, Error> {
        path.with_suffix(REPLACED_SUFFIX)
            .ok_or_else(|| Error::PermissionDenied {
                path: path.clone(),
                reason: "the root cannot be replaced".to_string(),
            })
    }

    /// Make `dir` and its ancestors real directories in `top`.
    ///
    /// A directory recreated over a whiteout gets a `.replaced` marker so the
    /// bottom's old content stays hidden.
    fn ensure_dir_in_top(&self, dir: &FsPath) -> Result<(), Error> {
        for ancestor in dir.ancestors_inclusive() {
            match self.info(&ancestor) {
                Ok(info) if info.is_file() => {
                    return Err(Error::NotADirectory { path: ancestor })
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
            if self.top.is_dir(&ancestor)? {
                continue;
            }

            let whiteout = Self::whiteout(&ancestor)?;
            if self.top.exists(&whiteout)? {
                self.top.rm(&whiteout, false)?;
                self.top.mkdir(&ancestor, false)?;
                self.top.mkdir(&Self::replaced(&ancestor)?, false)?;
            } else {
                self.top.mkdir(&ancestor, false)?;
            }
        }
        Ok(())
    }
}

impl FileSystem for TransparentFs {
    fn open_read(&self, path: &FsPath) -> Result<ReadStream, Error> {
        self.layered(path, |fs| fs.open_read(path))
    }

    fn open_write(&self, path: &FsPath, mode: WriteMode) -> Result<WriteStream, Error> {
        let existing = match self.info(path) {
            Ok(info) if info.is_dir() => return Err(Error::IsADirectory { path: path.clone() }),
            Ok(_) if mode == WriteMode::CreateNew => {
                return Err(Error::AlreadyExists { path: path.clone() })
            }
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };

        self.ensure_dir_in_top(&path.parent())?;
        if existing && mode == WriteMode::Append && !self.top.exists(path)? {
            log::debug!("Copying {} up before append", path);
            copy_tree(&*self.bottom, path, &*self.top, path)?;
        }

        let whiteout = Self::whiteout(path)?;
        let whiteout = self.top.exists(&whiteout)?.then_some(whiteout);
        Ok(Box::new(TransparentWriter {
            inner: self.top.open_write(path, mode)?,
            top: self.top.clone(),
            whiteout,
        }))
    }

    fn info(&self, path: &FsPath) -> Result<FileInfo, Error> {
        self.layered(path, |fs| fs.info(path))
    }

    fn ls(&self, path: &FsPath) -> Result<Vec<FileInfo>, Error> {
        let (top_entries, top_err) = match self.top.ls(path) {
            Ok(entries) => (Some(entries), None),
            Err(e) if e.is_not_found() => (None, Some(e)),
            Err(e) => return Err(e),
        };

        let bottom_entries = if self.hidden(path)? {
            None
        } else {
            match self.bottom.ls(path) {
                Ok(entries) => Some(entries),
                // Nothing to add below `path`.
                Err(e) if adds_nothing(&e) => None,
                Err(e) if top_entries.is_some() => return Err(e),
                Err(e) => {
                    log::debug!("Both layers failed to list {}: {}", path, e);
                    None
                }
            }
        };

        if top_entries.is_none() && bottom_entries.is_none() {
            return Err(top_err.unwrap_or_else(|| Error::not_found(path)));
        }

        let top_entries = top_entries.unwrap_or_default();
        let whiteouts: HashSet<&str> = top_entries
            .iter()
            .filter(|e| e.is_file())
            .filter_map(|e| e.name.strip_suffix(DELETED_SUFFIX))
            .collect();

        let mut merged = BTreeMap::new();
        for entry in bottom_entries.unwrap_or_default() {
            if !whiteouts.contains(entry.name.as_str()) {
                merged.insert(entry.name.clone(), entry);
            }
        }
        for entry in top_entries.iter().filter(|e| !is_marker(e)) {
            merged.insert(entry.name.clone(), entry.clone());
        }
        Ok(merged.into_values().collect())
    }

    fn mkdir(&self, path: &FsPath, parents: bool) -> Result<(), Error> {
        if self.exists(path)? {
            return Err(Error::AlreadyExists { path: path.clone() });
        }

        let parent = path.parent();
        match self.info(&parent) {
            Ok(info) if info.is_file() => return Err(Error::NotADirectory { path: parent }),
            Ok(_) => {}
            Err(e) if e.is_not_found() && parents => {}
            Err(e) => return Err(e),
        }
        self.ensure_dir_in_top(path)
    }

    fn rm(&self, path: &FsPath, recursive: bool) -> Result<(), Error> {
        if path.is_root() {
            return Err(Error::PermissionDenied {
                path: path.clone(),
                reason: "cannot remove the root directory".to_string(),
            });
        }

        let info = self.info(path)?;
        if info.is_dir() && !recursive && !self.ls(path)?.is_empty() {
            return Err(Error::DirectoryNotEmpty { path: path.clone() });
        }

        if self.top.exists(path)? {
            self.top.rm(path, true)?;
        }
        let replaced = Self::replaced(path)?;
        if self.top.exists(&replaced)? {
            self.top.rm(&replaced, true)?;
        }

        if self.visible_in_bottom(path)? {
            log::debug!("Recording whiteout for {}", path);
            self.ensure_dir_in_top(&path.parent())?;
            self.top.pipe(&Self::whiteout(path)?, b"")?;
        }
        Ok(())
    }

    fn mv(&self, from: &FsPath, to: &FsPath) -> Result<(), Error> {
        if from.is_root() || to.has_prefix(from) {
            return Err(Error::PermissionDenied {
                path: from.clone(),
                reason: format!("cannot move into itself: {}", to),
            });
        }

        if self.top.exists(from)? && !self.visible_in_bottom(from)? && !self.exists(to)? {
            self.ensure_dir_in_top(&to.parent())?;
            return self.top.mv(from, to);
        }

        copy_tree(self, from, self, to)?;
        self.rm(from, true)
    }

    fn url(&self, path: &FsPath) -> Option<String> {
        if self.top.exists(path).unwrap_or(false) || self.hidden(path).unwrap_or(true) {
            self.top.url(path)
        } else {
            self.bottom.url(path)
        }
    }

    fn local_path(&self, path: &FsPath) -> Option<PathBuf> {
        if self.top.exists(path).unwrap_or(false) || self.hidden(path).unwrap_or(true) {
            self.top.local_path(path)
        } else {
            self.bottom.local_path(path)
        }
    }
}

/// Writer into `top` that lifts the path's whiteout once content is committed.
struct TransparentWriter {
    inner: WriteStream,
    top: FsHandle,
    whiteout: Option<FsPath>,
}

impl Write for TransparentWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl FileWriter for TransparentWriter {
    fn commit(self: Box<Self>) -> Result<(), Error> {
        let TransparentWriter {
            inner,
            top,
            whiteout,
        } = *self;
        inner.commit()?;
        if let Some(marker) = whiteout {
            top.rm(&marker, false)?;
        }
        Ok(())
    }
}
