//! Wrappers that restrict or re-root another filesystem.

use std::path::PathBuf;

use crate::{
    Error, FileInfo, FileSystem, FsHandle, FsPath, ReadStream, WriteMode, WriteStream,
};

/// A view of a sub-directory of another filesystem.
///
/// Every path is joined onto `prefix` before being handed to the inner
/// filesystem, so the view's root is the inner filesystem's `prefix`.
pub struct DirFs {
    inner: FsHandle,
    prefix: FsPath,
}

impl DirFs {
    pub fn new(inner: FsHandle, prefix: FsPath) -> Self {
        Self { inner, prefix }
    }

    pub fn prefix(&self) -> &FsPath {
        &self.prefix
    }

    fn full(&self, path: &FsPath) -> FsPath {
        self.prefix.join(path)
    }

    /// Map errors about inner paths back to view-relative paths.
    fn relative(&self, error: Error) -> Error {
        let strip = |p: FsPath| p.strip_prefix(&self.prefix).unwrap_or(p);
        match error {
            Error::NotFound { path } => Error::NotFound { path: strip(path) },
            Error::AlreadyExists { path } => Error::AlreadyExists { path: strip(path) },
            Error::NotADirectory { path } => Error::NotADirectory { path: strip(path) },
            Error::IsADirectory { path } => Error::IsADirectory { path: strip(path) },
            Error::DirectoryNotEmpty { path } => Error::DirectoryNotEmpty { path: strip(path) },
            other => other,
        }
    }
}

impl FileSystem for DirFs {
    fn open_read(&self, path: &FsPath) -> Result<ReadStream, Error> {
        self.inner
            .open_read(&self.full(path))
            .map_err(|e| self.relative(e))
    }

    fn open_write(&self, path: &FsPath, mode: WriteMode) -> Result<WriteStream, Error> {
        self.inner
            .open_write(&self.full(path), mode)
            .map_err(|e| self.relative(e))
    }

    fn info(&self, path: &FsPath) -> Result<FileInfo, Error> {
        let info = self.inner.info(&self.full(path)).map_err(|e| self.relative(e))?;
        Ok(info.renamed(path.name()))
    }

    fn ls(&self, path: &FsPath) -> Result<Vec<FileInfo>, Error> {
        self.inner.ls(&self.full(path)).map_err(|e| self.relative(e))
    }

    fn mkdir(&self, path: &FsPath, parents: bool) -> Result<(), Error> {
        self.inner
            .mkdir(&self.full(path), parents)
            .map_err(|e| self.relative(e))
    }

    fn rm(&self, path: &FsPath, recursive: bool) -> Result<(), Error> {
        if path.is_root() {
            return Err(Error::PermissionDenied {
                path: path.clone(),
                reason: "cannot remove the root directory".to_string(),
            });
        }
        self.inner
            .rm(&self.full(path), recursive)
            .map_err(|e| self.relative(e))
    }

    fn mv(&self, from: &FsPath, to: &FsPath) -> Result<(), Error> {
        self.inner
            .mv(&self.full(from), &self.full(to))
            .map_err(|e| self.relative(e))
    }

    fn find(&self, path: &FsPath) -> Result<Vec<FsPath>, Error> {
        let found = self.inner.find(&self.full(path)).map_err(|e| self.relative(e))?;
        Ok(found
            .into_iter()
            .filter_map(|p| p.strip_prefix(&self.prefix))
            .collect())
    }

    fn url(&self, path: &FsPath) -> Option<String> {
        self.inner.url(&self.full(path))
    }

    fn local_path(&self, path: &FsPath) -> Option<PathBuf> {
        self.inner.local_path(&self.full(path))
    }
}

/// Wraps a filesystem to reject every mutation with `PermissionDenied`.
pub struct ReadOnlyFs {
    inner: FsHandle,
}

impl ReadOnlyFs {
    pub fn new(inner: FsHandle) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &FsHandle {
        &self.inner
    }
}

impl FileSystem for ReadOnlyFs {
    fn open_read(&self, path: &FsPath) -> Result<ReadStream, Error> {
        self.inner.open_read(path)
    }

    fn open_write(&self, path: &FsPath, _mode: WriteMode) -> Result<WriteStream, Error> {
        Err(Error::read_only(path))
    }

    fn info(&self, path: &FsPath) -> Result<FileInfo, Error> {
        self.inner.info(path)
    }

    fn ls(&self, path: &FsPath) -> Result<Vec<FileInfo>, Error> {
        self.inner.ls(path)
    }

    fn mkdir(&self, path: &FsPath, _parents: bool) -> Result<(), Error> {
        Err(Error::read_only(path))
    }

    fn rm(&self, path: &FsPath, _recursive: bool) -> Result<(), Error> {
        Err(Error::read_only(path))
    }

    fn mv(&self, from: &FsPath, _to: &FsPath) -> Result<(), Error> {
        Err(Error::read_only(from))
    }

    fn find(&self, path: &FsPath) -> Result<Vec<FsPath>, Error> {
        self.inner.find(path)
    }

    fn url(&self, path: &FsPath) -> Option<String> {
        self.inner.url(path)
    }

    fn local_path(&self, path: &FsPath) -> Option<PathBuf> {
        self.inner.local_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fspath, MemoryFs};
    use std::sync::Arc;

    #[test]
    fn dir_fs_reroots_paths() {
        let mem = MemoryFs::new();
        mem.pipe(&fspath!("media/uploads/a.txt"), b"a").unwrap();
        let view = DirFs::new(Arc::new(mem.clone()), fspath!("media"));

        assert_eq!(view.cat(&fspath!("uploads/a.txt")).unwrap(), "a");

        view.pipe(&fspath!("b.txt"), b"b").unwrap();
        assert_eq!(mem.cat(&fspath!("media/b.txt")).unwrap(), "b");

        let names: Vec<String> = view
            .ls(&FsPath::root())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["b.txt", "uploads"]);
    }

    #[test]
    fn dir_fs_reports_relative_paths() {
        let view = DirFs::new(Arc::new(MemoryFs::new()), fspath!("base"));
        match view.info(&fspath!("x")) {
            Err(Error::NotFound { path }) => assert_eq!(path, fspath!("x")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn dir_fs_find_strips_prefix() {
        let mem = MemoryFs::new();
        mem.pipe(&fspath!("base/x/1"), b"").unwrap();
        mem.pipe(&fspath!("other"), b"").unwrap();
        let view = DirFs::new(Arc::new(mem), fspath!("base"));

        assert_eq!(view.find(&FsPath::root()).unwrap(), vec![fspath!("x/1")]);
    }

    #[test]
    fn read_only_rejects_mutations() {
        let mem = MemoryFs::with_files([("f", "data")]).unwrap();
        let ro = ReadOnlyFs::new(Arc::new(mem));

        assert_eq!(ro.cat(&fspath!("f")).unwrap(), "data");
        assert!(ro.exists(&fspath!("f")).unwrap());

        assert!(matches!(
            ro.pipe(&fspath!("f"), b"x"),
            Err(Error::PermissionDenied { .. })
        ));
        assert!(matches!(
            ro.rm(&fspath!("f"), false),
            Err(Error::PermissionDenied { .. })
        ));
        assert!(matches!(
            ro.mkdir(&fspath!("d"), true),
            Err(Error::PermissionDenied { .. })
        ));
        assert!(matches!(
            ro.mv(&fspath!("f"), &fspath!("g")),
            Err(Error::PermissionDenied { .. })
        ));
        assert_eq!(ro.cat(&fspath!("f")).unwrap(), "data");
    }
}
