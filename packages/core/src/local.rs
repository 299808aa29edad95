//! Local-disk filesystem rooted at a directory.

use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use walkdir::WalkDir;

use crate::{
    Error, FileInfo, FileSystem, FileWriter, FsPath, ReadStream, WriteMode, WriteStream,
};

/// Name prefix of in-flight writes. Such files never appear in listings.
const PARTIAL_PREFIX: &str = ".layerfs-partial-";

fn is_partial(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with(PARTIAL_PREFIX)
}

/// A filesystem over a directory on the local disk.
///
/// Every [`FsPath`] is resolved under the root; since paths cannot contain
/// `..`, nothing outside the root is reachable. Writes go to a temporary file
/// next to the target and are renamed into place on commit.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
    auto_mkdir: bool,
}

impl LocalFs {
    /// Open an existing directory as a filesystem root.
    pub fn new(root: impl Into<PathBuf>) -> Result<LocalFs, Error> {
        Self::open(root, false)
    }

    /// Like [`LocalFs::new`], creating the root first when `create_root` is set.
    pub fn open(root: impl Into<PathBuf>, create_root: bool) -> Result<LocalFs, Error> {
        let root = root.into();
        let invalid = |message: String| Error::InvalidRoot {
            root: root.clone(),
            message,
        };

        if create_root {
            fs::create_dir_all(&root).map_err(|e| invalid(e.to_string()))?;
        }

        let attr = fs::metadata(&root).map_err(|e| invalid(e.to_string()))?;
        if !attr.is_dir() {
            return Err(invalid("root path must be a directory".to_string()));
        }

        let canonical = root.canonicalize().map_err(|e| invalid(e.to_string()))?;
        log::debug!("Opened local filesystem at {}", canonical.display());
        Ok(LocalFs {
            root: canonical,
            auto_mkdir: true,
        })
    }

    /// Whether writes create missing parent directories (on by default).
    #[must_use]
    pub fn auto_mkdir(mut self, auto_mkdir: bool) -> Self {
        self.auto_mkdir = auto_mkdir;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn native_path(&self, path: &FsPath) -> PathBuf {
        self.root
            .components()
            .chain(path.iter().map(|s| Component::Normal(OsStr::new(s))))
            .collect()
    }

    fn metadata(&self, path: &FsPath) -> Result<fs::Metadata, Error> {
        fs::metadata(self.native_path(path)).map_err(|e| Error::from_io(e, path))
    }

    fn ensure_parent(&self, path: &FsPath) -> Result<PathBuf, Error> {
        let parent = path.parent();
        let native = self.native_path(&parent);
        match fs::metadata(&native) {
            Ok(attr) if attr.is_dir() => Ok(native),
            Ok(_) => Err(Error::NotADirectory { path: parent }),
            Err(e) if e.kind() == io::ErrorKind::NotFound && self.auto_mkdir => {
                log::debug!("Creating parent directory {}", native.display());
                fs::create_dir_all(&native).map_err(|e| Error::from_io(e, &parent))?;
                Ok(native)
            }
            Err(e) => Err(Error::from_io(e, &parent)),
        }
    }
}

fn to_info(name: &str, attr: &fs::Metadata) -> FileInfo {
    let info = if attr.is_dir() {
        FileInfo::directory(name)
    } else {
        FileInfo::file(name, attr.len())
    };
    info.with_times(attr.created().ok(), attr.modified().ok())
}

impl FileSystem for LocalFs {
    fn open_read(&self, path: &FsPath) -> Result<ReadStream, Error> {
        if self.metadata(path)?.is_dir() {
            return Err(Error::IsADirectory { path: path.clone() });
        }
        let file = fs::File::open(self.native_path(path)).map_err(|e| Error::from_io(e, path))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, path: &FsPath, mode: WriteMode) -> Result<WriteStream, Error> {
        if path.is_root() {
            return Err(Error::IsADirectory { path: path.clone() });
        }

        let target = self.native_path(path);
        let existing = match fs::metadata(&target) {
            Ok(attr) if attr.is_dir() => return Err(Error::IsADirectory { path: path.clone() }),
            Ok(_) if mode == WriteMode::CreateNew => {
                return Err(Error::AlreadyExists { path: path.clone() })
            }
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::from_io(e, path)),
        };

        let parent = self.ensure_parent(path)?;
        let mut tmp = Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(&parent)
            .map_err(|e| Error::from_io(e, path))?;
        if existing && mode == WriteMode::Append {
            let mut current = fs::File::open(&target).map_err(|e| Error::from_io(e, path))?;
            io::copy(&mut current, tmp.as_file_mut())?;
        }

        log::debug!("Writing {}...", target.display());
        Ok(Box::new(LocalWriter {
            tmp,
            target,
            path: path.clone(),
            no_clobber: mode == WriteMode::CreateNew,
        }))
    }

    fn info(&self, path: &FsPath) -> Result<FileInfo, Error> {
        Ok(to_info(path.name(), &self.metadata(path)?))
    }

    fn ls(&self, path: &FsPath) -> Result<Vec<FileInfo>, Error> {
        if !self.metadata(path)?.is_dir() {
            return Err(Error::NotADirectory { path: path.clone() });
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(self.native_path(path)).map_err(|e| Error::from_io(e, path))? {
            let entry = entry?;
            if is_partial(&entry.file_name()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let attr = match entry.metadata() {
                Ok(attr) => attr,
                // Removed between read_dir and metadata.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            entries.push(to_info(&name, &attr));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn mkdir(&self, path: &FsPath, parents: bool) -> Result<(), Error> {
        let native = self.native_path(path);
        if native.exists() {
            return Err(Error::AlreadyExists { path: path.clone() });
        }
        let result = if parents {
            fs::create_dir_all(&native)
        } else {
            fs::create_dir(&native)
        };
        result.map_err(|e| Error::from_io(e, path))
    }

    fn rm(&self, path: &FsPath, recursive: bool) -> Result<(), Error> {
        if path.is_root() {
            return Err(Error::PermissionDenied {
                path: path.clone(),
                reason: "cannot remove the root directory".to_string(),
            });
        }

        let native = self.native_path(path);
        let attr = self.metadata(path)?;
        let result = if !attr.is_dir() {
            fs::remove_file(&native)
        } else if recursive {
            fs::remove_dir_all(&native)
        } else {
            let mut children = fs::read_dir(&native).map_err(|e| Error::from_io(e, path))?;
            if children.next().is_some() {
                return Err(Error::DirectoryNotEmpty { path: path.clone() });
            }
            fs::remove_dir(&native)
        };
        log::debug!("Removed {}", native.display());
        result.map_err(|e| Error::from_io(e, path))
    }

    fn mv(&self, from: &FsPath, to: &FsPath) -> Result<(), Error> {
        if from.is_root() || to.has_prefix(from) {
            return Err(Error::PermissionDenied {
                path: from.clone(),
                reason: format!("cannot move into itself: {}", to),
            });
        }
        self.metadata(from)?;
        if self.native_path(to).is_dir() {
            return Err(Error::AlreadyExists { path: to.clone() });
        }
        self.ensure_parent(to)?;
        fs::rename(self.native_path(from), self.native_path(to)).map_err(|e| Error::from_io(e, from))
    }

    fn find(&self, path: &FsPath) -> Result<Vec<FsPath>, Error> {
        self.metadata(path)?;

        let mut found = Vec::new();
        for entry in WalkDir::new(self.native_path(path)) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() || is_partial(entry.file_name()) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| Error::Io(io::Error::other(e)))?;
            let components = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            found.push(FsPath::try_from_components(components)?);
        }
        found.sort();
        Ok(found)
    }

    fn local_path(&self, path: &FsPath) -> Option<PathBuf> {
        Some(self.native_path(path))
    }
}

struct LocalWriter {
    tmp: NamedTempFile,
    target: PathBuf,
    path: FsPath,
    no_clobber: bool,
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tmp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tmp.flush()
    }
}

impl FileWriter for LocalWriter {
    fn commit(self: Box<Self>) -> Result<(), Error> {
        let LocalWriter {
            mut tmp,
            target,
            path,
            no_clobber,
        } = *self;
        tmp.flush()?;

        let persisted = if no_clobber {
            tmp.persist_noclobber(&target)
        } else {
            tmp.persist(&target)
        };
        persisted.map_err(|e| Error::from_io(e.error, &path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fspath;

    fn fresh() -> (tempfile::TempDir, LocalFs) {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path()).unwrap();
        (dir, fs)
    }

    #[test]
    fn root_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            LocalFs::new(&missing),
            Err(Error::InvalidRoot { .. })
        ));

        LocalFs::open(&missing, true).unwrap();
        assert!(missing.is_dir());
    }

    #[test]
    fn root_must_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(LocalFs::new(&file), Err(Error::InvalidRoot { .. })));
    }

    #[test]
    fn write_read_roundtrip_on_disk() {
        let (dir, fs) = fresh();
        fs.pipe(&fspath!("a/b.txt"), b"hello").unwrap();

        assert_eq!(fs::read(dir.path().join("a/b.txt")).unwrap(), b"hello");
        assert_eq!(fs.cat(&fspath!("a/b.txt")).unwrap(), "hello");
        assert_eq!(fs.size(&fspath!("a/b.txt")).unwrap(), 5);
    }

    #[test]
    fn auto_mkdir_disabled_requires_parent() {
        let (_dir, fs) = fresh();
        let fs = fs.auto_mkdir(false);
        let err = fs.open_write(&fspath!("x/y.txt"), WriteMode::Truncate).err().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn dropped_writer_leaves_nothing() {
        let (dir, fs) = fresh();
        {
            let mut w = fs.open_write(&fspath!("draft"), WriteMode::Truncate).unwrap();
            w.write_all(b"never").unwrap();
        }
        assert!(!dir.path().join("draft").exists());
        assert!(fs.ls(&FsPath::root()).unwrap().is_empty());
    }

    #[test]
    fn append_and_create_new() {
        let (_dir, fs) = fresh();
        fs.pipe(&fspath!("log"), b"a").unwrap();

        let mut w = fs.open_write(&fspath!("log"), WriteMode::Append).unwrap();
        w.write_all(b"b").unwrap();
        w.commit().unwrap();
        assert_eq!(fs.cat(&fspath!("log")).unwrap(), "ab");

        assert!(matches!(
            fs.open_write(&fspath!("log"), WriteMode::CreateNew),
            Err(Error::AlreadyExists { .. })
        ));
    }

    #[test]
    fn ls_sorted_with_kinds() {
        let (_dir, fs) = fresh();
        fs.pipe(&fspath!("b.txt"), b"bb").unwrap();
        fs.pipe(&fspath!("a/inner"), b"").unwrap();

        let entries = fs.ls(&FsPath::root()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert!(entries[0].is_dir());
        assert_eq!(entries[1].name, "b.txt");
        assert_eq!(entries[1].size, 2);
        assert!(entries[1].modified.is_some());
    }

    #[test]
    fn missing_paths_are_not_found() {
        let (_dir, fs) = fresh();
        assert!(fs.info(&fspath!("nope")).unwrap_err().is_not_found());
        assert!(fs.open_read(&fspath!("nope")).err().unwrap().is_not_found());
        assert!(fs.rm(&fspath!("nope"), false).unwrap_err().is_not_found());
    }

    #[test]
    fn rm_non_empty_requires_recursive() {
        let (_dir, fs) = fresh();
        fs.pipe(&fspath!("d/f"), b"x").unwrap();

        assert!(matches!(
            fs.rm(&fspath!("d"), false),
            Err(Error::DirectoryNotEmpty { .. })
        ));
        fs.rm(&fspath!("d"), true).unwrap();
        assert!(!fs.exists(&fspath!("d")).unwrap());
    }

    #[test]
    fn mkdir_and_mv() {
        let (_dir, fs) = fresh();
        fs.mkdir(&fspath!("p/q"), true).unwrap();
        assert!(matches!(
            fs.mkdir(&fspath!("p/q"), false),
            Err(Error::AlreadyExists { .. })
        ));

        fs.pipe(&fspath!("p/q/f"), b"1").unwrap();
        fs.mv(&fspath!("p/q/f"), &fspath!("r/f")).unwrap();
        assert!(!fs.exists(&fspath!("p/q/f")).unwrap());
        assert_eq!(fs.cat(&fspath!("r/f")).unwrap(), "1");
    }

    #[test]
    fn find_walks_tree() {
        let (_dir, fs) = fresh();
        fs.pipe(&fspath!("x/1"), b"").unwrap();
        fs.pipe(&fspath!("x/y/2"), b"").unwrap();
        fs.pipe(&fspath!("z"), b"").unwrap();

        assert_eq!(
            fs.find(&fspath!("x")).unwrap(),
            vec![fspath!("x/1"), fspath!("x/y/2")]
        );
    }

    #[test]
    fn pending_writes_are_not_listed() {
        let (_dir, fs) = fresh();
        fs.pipe(&fspath!("d/done.txt"), b"done").unwrap();

        let mut w = fs.open_write(&fspath!("d/pending.txt"), WriteMode::Truncate).unwrap();
        w.write_all(b"partial").unwrap();

        let names: Vec<String> = fs.ls(&fspath!("d")).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["done.txt"]);
        assert_eq!(fs.find(&fspath!("d")).unwrap(), vec![fspath!("d/done.txt")]);

        w.commit().unwrap();
        assert_eq!(fs.ls(&fspath!("d")).unwrap().len(), 2);
    }

    #[test]
    fn local_path_is_under_root() {
        let (_dir, fs) = fresh();
        let p = fs.local_path(&fspath!("a/b")).unwrap();
        assert!(p.starts_with(fs.root()));
        assert!(p.ends_with("a/b"));
    }
}
