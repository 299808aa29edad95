//! In-memory filesystem.
//!
//! All data is ephemeral. Clones share the same tree, which makes it easy to
//! hand one copy to a composed filesystem and inspect the other directly.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Write};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use bytes::Bytes;

use crate::{
    Error, FileInfo, FileSystem, FileWriter, FsPath, ReadStream, WriteMode, WriteStream,
};

#[derive(Debug, Clone)]
enum Node {
    File {
        data: Bytes,
        created: SystemTime,
        modified: SystemTime,
    },
    Directory {
        created: SystemTime,
    },
}

impl Node {
    fn info(&self, name: &str) -> FileInfo {
        match self {
            Node::File {
                data,
                created,
                modified,
            } => FileInfo::file(name, data.len() as u64)
                .with_times(Some(*created), Some(*modified)),
            Node::Directory { created } => {
                FileInfo::directory(name).with_times(Some(*created), Some(*created))
            }
        }
    }
}

type Tree = BTreeMap<FsPath, Node>;

/// An in-memory filesystem.
///
/// Thread-safe via an internal `RwLock`. The root directory always exists
/// and is not stored in the tree.
///
/// # Example
///
/// ```rust
/// use layerfs_core::{fspath, FileSystem, MemoryFs};
///
/// let fs = MemoryFs::new();
/// fs.pipe(&fspath!("images/x.png"), b"png").unwrap();
/// assert!(fs.is_dir(&fspath!("images")).unwrap());
/// assert_eq!(fs.cat(&fspath!("images/x.png")).unwrap(), &b"png"[..]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    tree: Arc<RwLock<Tree>>,
}

impl MemoryFs {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filesystem seeded with files (parents are created).
    pub fn with_files<I, P, D>(files: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (P, D)>,
        P: AsRef<str>,
        D: Into<Bytes>,
    {
        let fs = Self::new();
        for (path, data) in files {
            let path = FsPath::parse(path.as_ref())?;
            fs.store_file(&path, data.into())?;
        }
        Ok(fs)
    }

    fn read_tree(&self) -> RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tree(&self) -> RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(tree: &Tree, path: &FsPath) -> Result<Option<Node>, Error> {
        if path.is_root() {
            return Ok(Some(Node::Directory {
                created: SystemTime::UNIX_EPOCH,
            }));
        }
        Ok(tree.get(path).cloned())
    }

    /// Create every missing ancestor of `path` as a directory.
    fn ensure_parents(tree: &mut Tree, path: &FsPath) -> Result<(), Error> {
        let parent = path.parent();
        for ancestor in parent.ancestors_inclusive() {
            match tree.get(&ancestor) {
                Some(Node::Directory { .. }) => {}
                Some(Node::File { .. }) => return Err(Error::NotADirectory { path: ancestor }),
                None => {
                    tree.insert(
                        ancestor,
                        Node::Directory {
                            created: SystemTime::now(),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn store_file(&self, path: &FsPath, data: Bytes) -> Result<(), Error> {
        if path.is_root() {
            return Err(Error::IsADirectory { path: path.clone() });
        }
        let mut tree = self.write_tree();
        Self::ensure_parents(&mut tree, path)?;

        let now = SystemTime::now();
        let created = match tree.get(path) {
            Some(Node::Directory { .. }) => {
                return Err(Error::IsADirectory { path: path.clone() })
            }
            Some(Node::File { created, .. }) => *created,
            None => now,
        };
        tree.insert(
            path.clone(),
            Node::File {
                data,
                created,
                modified: now,
            },
        );
        Ok(())
    }

    /// Paths strictly below `path`.
    fn descendants(tree: &Tree, path: &FsPath) -> Vec<FsPath> {
        tree.keys()
            .filter(|p| p.len() > path.len() && p.has_prefix(path))
            .cloned()
            .collect()
    }
}

impl FileSystem for MemoryFs {
    fn open_read(&self, path: &FsPath) -> Result<ReadStream, Error> {
        match Self::lookup(&self.read_tree(), path)? {
            Some(Node::File { data, .. }) => Ok(Box::new(Cursor::new(data))),
            Some(Node::Directory { .. }) => Err(Error::IsADirectory { path: path.clone() }),
            None => Err(Error::not_found(path)),
        }
    }

    fn open_write(&self, path: &FsPath, mode: WriteMode) -> Result<WriteStream, Error> {
        let buffer = match (Self::lookup(&self.read_tree(), path)?, mode) {
            (Some(Node::Directory { .. }), _) => {
                return Err(Error::IsADirectory { path: path.clone() })
            }
            (Some(Node::File { .. }), WriteMode::CreateNew) => {
                return Err(Error::AlreadyExists { path: path.clone() })
            }
            (Some(Node::File { data, .. }), WriteMode::Append) => data.to_vec(),
            _ => Vec::new(),
        };

        Ok(Box::new(MemoryWriter {
            fs: self.clone(),
            path: path.clone(),
            buffer,
        }))
    }

    fn info(&self, path: &FsPath) -> Result<FileInfo, Error> {
        match Self::lookup(&self.read_tree(), path)? {
            Some(node) => Ok(node.info(path.name())),
            None => Err(Error::not_found(path)),
        }
    }

    fn ls(&self, path: &FsPath) -> Result<Vec<FileInfo>, Error> {
        let tree = self.read_tree();
        match Self::lookup(&tree, path)? {
            Some(Node::Directory { .. }) => {}
            Some(Node::File { .. }) => return Err(Error::NotADirectory { path: path.clone() }),
            None => return Err(Error::not_found(path)),
        }

        // BTreeMap order keeps children sorted by name.
        Ok(tree
            .iter()
            .filter(|(p, _)| p.len() == path.len() + 1 && p.has_prefix(path))
            .map(|(p, node)| node.info(p.name()))
            .collect())
    }

    fn mkdir(&self, path: &FsPath, parents: bool) -> Result<(), Error> {
        let mut tree = self.write_tree();
        if Self::lookup(&tree, path)?.is_some() {
            return Err(Error::AlreadyExists { path: path.clone() });
        }

        if parents {
            Self::ensure_parents(&mut tree, path)?;
        } else {
            match Self::lookup(&tree, &path.parent())? {
                Some(Node::Directory { .. }) => {}
                Some(Node::File { .. }) => {
                    return Err(Error::NotADirectory {
                        path: path.parent(),
                    })
                }
                None => return Err(Error::not_found(&path.parent())),
            }
        }

        tree.insert(
            path.clone(),
            Node::Directory {
                created: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn rm(&self, path: &FsPath, recursive: bool) -> Result<(), Error> {
        if path.is_root() {
            return Err(Error::PermissionDenied {
                path: path.clone(),
                reason: "cannot remove the root directory".to_string(),
            });
        }

        let mut tree = self.write_tree();
        match tree.get(path) {
            None => return Err(Error::not_found(path)),
            Some(Node::File { .. }) => {}
            Some(Node::Directory { .. }) => {
                let children = Self::descendants(&tree, path);
                if !children.is_empty() && !recursive {
                    return Err(Error::DirectoryNotEmpty { path: path.clone() });
                }
                for child in children {
                    tree.remove(&child);
                }
            }
        }
        tree.remove(path);
        Ok(())
    }

    fn mv(&self, from: &FsPath, to: &FsPath) -> Result<(), Error> {
        if from.is_root() || to.has_prefix(from) {
            return Err(Error::PermissionDenied {
                path: from.clone(),
                reason: format!("cannot move into itself: {}", to),
            });
        }

        let mut tree = self.write_tree();
        let node = tree.get(from).cloned().ok_or_else(|| Error::not_found(from))?;
        match (&node, Self::lookup(&tree, to)?) {
            (_, Some(Node::Directory { .. })) => {
                return Err(Error::AlreadyExists { path: to.clone() })
            }
            (Node::Directory { .. }, Some(Node::File { .. })) => {
                return Err(Error::NotADirectory { path: to.clone() })
            }
            _ => {}
        }
        Self::ensure_parents(&mut tree, to)?;

        for child in Self::descendants(&tree, from) {
            if let (Some(node), Some(suffix)) = (tree.remove(&child), child.strip_prefix(from)) {
                tree.insert(to.join(&suffix), node);
            }
        }
        tree.remove(from);
        tree.insert(to.clone(), node);
        Ok(())
    }
}

struct MemoryWriter {
    fs: MemoryFs,
    path: FsPath,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileWriter for MemoryWriter {
    fn commit(self: Box<Self>) -> Result<(), Error> {
        let MemoryWriter { fs, path, buffer } = *self;
        fs.store_file(&path, Bytes::from(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fspath, FileType};
    use collection_literals::btree;

    #[test]
    fn write_and_read() {
        let fs = MemoryFs::new();
        fs.pipe(&fspath!("test.txt"), b"hello world").unwrap();

        let data = fs.cat(&fspath!("test.txt")).unwrap();
        assert_eq!(data, "hello world");
    }

    #[test]
    fn uncommitted_writes_are_discarded() {
        let fs = MemoryFs::new();
        {
            let mut w = fs.open_write(&fspath!("draft"), WriteMode::Truncate).unwrap();
            w.write_all(b"lost").unwrap();
        }
        assert!(!fs.exists(&fspath!("draft")).unwrap());
    }

    #[test]
    fn append_keeps_content() {
        let fs = MemoryFs::new();
        fs.pipe(&fspath!("log"), b"one\n").unwrap();
        let mut w = fs.open_write(&fspath!("log"), WriteMode::Append).unwrap();
        w.write_all(b"two\n").unwrap();
        w.commit().unwrap();
        assert_eq!(fs.cat(&fspath!("log")).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn create_new_refuses_existing() {
        let fs = MemoryFs::new();
        fs.pipe(&fspath!("a"), b"1").unwrap();
        let err = fs.open_write(&fspath!("a"), WriteMode::CreateNew).err().unwrap();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn nested_write_creates_parents() {
        let fs = MemoryFs::new();
        fs.pipe(&fspath!("a/b/c/file.txt"), b"nested").unwrap();

        assert!(fs.is_dir(&fspath!("a")).unwrap());
        assert!(fs.is_dir(&fspath!("a/b/c")).unwrap());
        assert_eq!(fs.cat(&fspath!("a/b/c/file.txt")).unwrap(), "nested");
    }

    #[test]
    fn read_missing_is_not_found() {
        let fs = MemoryFs::new();
        let err = fs.open_read(&fspath!("nonexistent.txt")).err().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn ls_lists_direct_children_sorted() {
        let fs = MemoryFs::with_files(btree! {
            "b.txt" => "b",
            "a.txt" => "a",
            "dir/inner.txt" => "i",
        })
        .unwrap();

        let entries = fs.ls(&FsPath::root()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "dir"]);
        assert_eq!(entries[2].kind, FileType::Directory);
        assert_eq!(entries[0].size, 1);
    }

    #[test]
    fn ls_on_file_fails() {
        let fs = MemoryFs::with_files([("f", "x")]).unwrap();
        assert!(matches!(
            fs.ls(&fspath!("f")),
            Err(Error::NotADirectory { .. })
        ));
    }

    #[test]
    fn info_reports_size_and_times() {
        let fs = MemoryFs::new();
        fs.pipe(&fspath!("file.txt"), b"12345").unwrap();

        let info = fs.info(&fspath!("file.txt")).unwrap();
        assert!(info.is_file());
        assert_eq!(info.name, "file.txt");
        assert_eq!(info.size, 5);
        assert!(info.modified.is_some());

        assert!(fs.info(&FsPath::root()).unwrap().is_dir());
    }

    #[test]
    fn mkdir_requires_parent_without_parents_flag() {
        let fs = MemoryFs::new();
        assert!(fs.mkdir(&fspath!("x/y"), false).unwrap_err().is_not_found());
        fs.mkdir(&fspath!("x/y"), true).unwrap();
        assert!(matches!(
            fs.mkdir(&fspath!("x/y"), true),
            Err(Error::AlreadyExists { .. })
        ));
    }

    #[test]
    fn rm_file_and_directories() {
        let fs = MemoryFs::new();
        fs.pipe(&fspath!("dir/file.txt"), b"data").unwrap();

        assert!(matches!(
            fs.rm(&fspath!("dir"), false),
            Err(Error::DirectoryNotEmpty { .. })
        ));

        fs.rm(&fspath!("dir/file.txt"), false).unwrap();
        fs.rm(&fspath!("dir"), false).unwrap();
        assert!(!fs.exists(&fspath!("dir")).unwrap());
    }

    #[test]
    fn rm_recursive() {
        let fs = MemoryFs::new();
        fs.pipe(&fspath!("dir/a/b.txt"), b"data").unwrap();
        fs.rm(&fspath!("dir"), true).unwrap();
        assert!(fs.ls(&FsPath::root()).unwrap().is_empty());
    }

    #[test]
    fn rm_root_refused() {
        let fs = MemoryFs::new();
        assert!(matches!(
            fs.rm(&FsPath::root(), true),
            Err(Error::PermissionDenied { .. })
        ));
    }

    #[test]
    fn mv_directory_moves_children() {
        let fs = MemoryFs::new();
        fs.pipe(&fspath!("old/a.txt"), b"a").unwrap();
        fs.pipe(&fspath!("old/sub/b.txt"), b"b").unwrap();

        fs.mv(&fspath!("old"), &fspath!("new/place")).unwrap();

        assert!(!fs.exists(&fspath!("old")).unwrap());
        assert_eq!(fs.cat(&fspath!("new/place/a.txt")).unwrap(), "a");
        assert_eq!(fs.cat(&fspath!("new/place/sub/b.txt")).unwrap(), "b");
    }

    #[test]
    fn mv_into_itself_refused() {
        let fs = MemoryFs::new();
        fs.mkdir(&fspath!("a"), false).unwrap();
        assert!(fs.mv(&fspath!("a"), &fspath!("a/b")).is_err());
    }

    #[test]
    fn clones_share_state() {
        let fs = MemoryFs::new();
        let view = fs.clone();
        fs.pipe(&fspath!("shared"), b"1").unwrap();
        assert!(view.exists(&fspath!("shared")).unwrap());
    }
}
