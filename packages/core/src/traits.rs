//! The `FileSystem` capability and its provided helpers.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

use crate::{Error, FileInfo, FsPath};

/// A readable byte stream.
pub type ReadStream = Box<dyn Read + Send>;

/// A writable byte stream.
///
/// Bytes written are only published by [`FileWriter::commit`]. Dropping a
/// writer without committing discards what was written.
pub trait FileWriter: Write + Send {
    /// Finalize the write and make the content visible at its path.
    fn commit(self: Box<Self>) -> Result<(), Error>;
}

pub type WriteStream = Box<dyn FileWriter>;

/// How [`FileSystem::open_write`] treats existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace any existing file.
    #[default]
    Truncate,
    /// Keep existing content and write after it.
    Append,
    /// Fail with `AlreadyExists` if the path exists.
    CreateNew,
}

/// A shared filesystem handle.
pub type FsHandle = Arc<dyn FileSystem>;

/// Path-addressed file operations.
///
/// All paths are relative to the filesystem's own root. Implementations must
/// report missing paths with an error for which [`Error::is_not_found`]
/// holds, so that composed filesystems can tell "absent" apart from any
/// other failure.
///
/// # Object Safety
///
/// This trait is object-safe: handles are passed around as [`FsHandle`].
pub trait FileSystem: Send + Sync {
    /// Open a file for reading.
    fn open_read(&self, path: &FsPath) -> Result<ReadStream, Error>;

    /// Open a file for writing. Content is published on commit.
    fn open_write(&self, path: &FsPath, mode: WriteMode) -> Result<WriteStream, Error>;

    /// Metadata for a file or directory.
    fn info(&self, path: &FsPath) -> Result<FileInfo, Error>;

    /// Entries of a directory, sorted by name.
    fn ls(&self, path: &FsPath) -> Result<Vec<FileInfo>, Error>;

    /// Create a directory. With `parents`, missing ancestors are created too.
    ///
    /// Fails with `AlreadyExists` if anything is already at `path`.
    fn mkdir(&self, path: &FsPath, parents: bool) -> Result<(), Error>;

    /// Remove a file, or a directory (which must be empty unless `recursive`).
    fn rm(&self, path: &FsPath, recursive: bool) -> Result<(), Error>;

    /// Move a file or directory.
    fn mv(&self, from: &FsPath, to: &FsPath) -> Result<(), Error>;

    fn exists(&self, path: &FsPath) -> Result<bool, Error> {
        match self.info(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn size(&self, path: &FsPath) -> Result<u64, Error> {
        Ok(self.info(path)?.size)
    }

    fn is_dir(&self, path: &FsPath) -> Result<bool, Error> {
        match self.info(path) {
            Ok(info) => Ok(info.is_dir()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn is_file(&self, path: &FsPath) -> Result<bool, Error> {
        match self.info(path) {
            Ok(info) => Ok(info.is_file()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read a whole file.
    fn cat(&self, path: &FsPath) -> Result<Bytes, Error> {
        let mut reader = self.open_read(path)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Replace a whole file.
    fn pipe(&self, path: &FsPath, data: &[u8]) -> Result<(), Error> {
        let mut writer = self.open_write(path, WriteMode::Truncate)?;
        writer.write_all(data)?;
        writer.commit()
    }

    /// Create a directory and its ancestors. With `exist_ok`, an existing
    /// directory is not an error.
    fn makedirs(&self, path: &FsPath, exist_ok: bool) -> Result<(), Error> {
        if path.is_root() {
            return Ok(());
        }
        match self.mkdir(path, true) {
            Err(Error::AlreadyExists { .. }) if exist_ok && self.is_dir(path)? => Ok(()),
            other => other,
        }
    }

    /// Copy a file within this filesystem.
    fn copy(&self, from: &FsPath, to: &FsPath) -> Result<(), Error> {
        let mut reader = self.open_read(from)?;
        let mut writer = self.open_write(to, WriteMode::Truncate)?;
        io::copy(&mut reader, &mut writer)?;
        writer.commit()
    }

    /// Every file at or below `path`, as full paths, sorted.
    fn find(&self, path: &FsPath) -> Result<Vec<FsPath>, Error> {
        let mut found = Vec::new();
        if self.info(path)?.is_file() {
            found.push(path.clone());
            return Ok(found);
        }
        let mut pending = vec![path.clone()];
        while let Some(dir) = pending.pop() {
            for entry in self.ls(&dir)? {
                let child = dir.child(&entry.name);
                if entry.is_dir() {
                    pending.push(child);
                } else {
                    found.push(child);
                }
            }
        }
        found.sort();
        Ok(found)
    }

    /// Public URL of a path, when the backend can produce one.
    fn url(&self, path: &FsPath) -> Option<String> {
        let _ = path;
        None
    }

    /// Location of a path on the local disk, for backends backed by it.
    fn local_path(&self, path: &FsPath) -> Option<PathBuf> {
        let _ = path;
        None
    }
}

/// Copy a file or a whole directory tree from one filesystem to another.
///
/// Directories are created on the destination as they are reached; the
/// source is left untouched.
pub fn copy_tree(
    src: &dyn FileSystem,
    from: &FsPath,
    dst: &dyn FileSystem,
    to: &FsPath,
) -> Result<(), Error> {
    let info = src.info(from)?;
    if info.is_file() {
        let mut reader = src.open_read(from)?;
        let mut writer = dst.open_write(to, WriteMode::Truncate)?;
        io::copy(&mut reader, &mut writer)?;
        return writer.commit();
    }

    dst.makedirs(to, true)?;
    for entry in src.ls(from)? {
        copy_tree(src, &from.child(&entry.name), dst, &to.child(&entry.name))?;
    }
    Ok(())
}

// Blanket implementations for smart pointers

macro_rules! forward_filesystem {
    ($ty:ty) => {
        impl<T: FileSystem + ?Sized> FileSystem for $ty {
            fn open_read(&self, path: &FsPath) -> Result<ReadStream, Error> {
                (**self).open_read(path)
            }

            fn open_write(&self, path: &FsPath, mode: WriteMode) -> Result<WriteStream, Error> {
                (**self).open_write(path, mode)
            }

            fn info(&self, path: &FsPath) -> Result<FileInfo, Error> {
                (**self).info(path)
            }

            fn ls(&self, path: &FsPath) -> Result<Vec<FileInfo>, Error> {
                (**self).ls(path)
            }

            fn mkdir(&self, path: &FsPath, parents: bool) -> Result<(), Error> {
                (**self).mkdir(path, parents)
            }

            fn rm(&self, path: &FsPath, recursive: bool) -> Result<(), Error> {
                (**self).rm(path, recursive)
            }

            fn mv(&self, from: &FsPath, to: &FsPath) -> Result<(), Error> {
                (**self).mv(from, to)
            }

            fn exists(&self, path: &FsPath) -> Result<bool, Error> {
                (**self).exists(path)
            }

            fn find(&self, path: &FsPath) -> Result<Vec<FsPath>, Error> {
                (**self).find(path)
            }

            fn url(&self, path: &FsPath) -> Option<String> {
                (**self).url(path)
            }

            fn local_path(&self, path: &FsPath) -> Option<PathBuf> {
                (**self).local_path(path)
            }
        }
    };
}

forward_filesystem!(Box<T>);
forward_filesystem!(Arc<T>);
