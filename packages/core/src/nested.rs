//! NestedFs: route operations to child filesystems by path prefix.
//!
//! Routes live in a prefix trie; the deepest matching prefix handles the
//! request and sees the path with that prefix stripped.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::path_trie::PathTrie;
use crate::{
    copy_tree, Error, FileInfo, FileSystem, FsHandle, FsPath, ReadStream, WriteMode, WriteStream,
};

struct Route {
    prefix: FsPath,
    fs: FsHandle,
}

/// Route file operations to different filesystems based on path prefixes.
///
/// Prefixes match whole components: a route at `img` does not cover
/// `images/x.png`. The empty prefix is a default route covering every path
/// no other route claims. Directories above the declared prefixes are
/// synthesized, so `ls("")` on a filesystem with routes `images` and `docs`
/// lists both.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use layerfs_core::{fspath, FileSystem, MemoryFs, NestedFs};
///
/// let images = MemoryFs::new();
/// let nested = NestedFs::new()
///     .with_route("images/", Arc::new(images.clone())).unwrap()
///     .with_route("docs/", Arc::new(MemoryFs::new())).unwrap();
///
/// nested.pipe(&fspath!("images/x.png"), b"png").unwrap();
/// assert_eq!(images.cat(&fspath!("x.png")).unwrap(), &b"png"[..]);
/// assert!(nested.open_read(&fspath!("other/x.png")).err().unwrap().is_not_found());
/// ```
#[derive(Default)]
pub struct NestedFs {
    routes: PathTrie<Route>,
}

impl NestedFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`NestedFs::add_route`] taking a prefix string.
    pub fn with_route(mut self, prefix: &str, fs: FsHandle) -> Result<Self, Error> {
        self.add_route(FsPath::parse(prefix)?, fs);
        Ok(self)
    }

    /// Add a route. The first route declared for a prefix wins; a later
    /// route with the same normalized prefix is ignored and `false` returned.
    pub fn add_route(&mut self, prefix: FsPath, fs: FsHandle) -> bool {
        if self.routes.contains_value(&prefix) {
            log::warn!(
                "Ignoring duplicate route for prefix '{}': first declaration wins",
                prefix
            );
            return false;
        }
        log::debug!("Adding route '{}'", prefix);
        self.routes.insert(&prefix.clone(), Route { prefix, fs });
        true
    }

    /// All routes, ordered by prefix.
    pub fn routes(&self) -> impl Iterator<Item = (&FsPath, &FsHandle)> {
        self.routes.iter().map(|(_, route)| (&route.prefix, &route.fs))
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// The routing decision for a path: the owning filesystem, the matched
    /// prefix, and the path relative to that filesystem.
    pub fn resolve(&self, path: &FsPath) -> Result<(&FsHandle, FsPath, FsPath), Error> {
        match self.routes.find_ancestor(path) {
            Some((route, prefix, suffix)) => Ok((&route.fs, prefix, suffix)),
            None => Err(Error::NoRoute { path: path.clone() }),
        }
    }

    /// Names of route segments directly below `path`.
    fn synthesized(&self, path: &FsPath) -> Vec<String> {
        self.routes
            .get_subtrie(path)
            .map(|sub| sub.child_names().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn is_mount_point(&self, path: &FsPath) -> bool {
        self.routes.contains_value(path) || !self.synthesized(path).is_empty()
    }

    fn mount_point_error(path: &FsPath) -> Error {
        Error::PermissionDenied {
            path: path.clone(),
            reason: "path is a mount point".to_string(),
        }
    }
}

impl FileSystem for NestedFs {
    fn open_read(&self, path: &FsPath) -> Result<ReadStream, Error> {
        let (fs, _, suffix) = self.resolve(path)?;
        fs.open_read(&suffix)
    }

    fn open_write(&self, path: &FsPath, mode: WriteMode) -> Result<WriteStream, Error> {
        if !self.synthesized(path).is_empty() {
            return Err(Error::IsADirectory { path: path.clone() });
        }
        let (fs, _, suffix) = self.resolve(path)?;
        fs.open_write(&suffix, mode)
    }

    fn info(&self, path: &FsPath) -> Result<FileInfo, Error> {
        let synthetic = !self.synthesized(path).is_empty();
        let owned = match self.resolve(path) {
            Ok((fs, _, suffix)) => fs.info(&suffix),
            Err(e) => Err(e),
        };

        match owned {
            Ok(info) if info.is_dir() || !synthetic => Ok(info.renamed(path.name())),
            Err(e) if !synthetic || !e.is_not_found() => Err(e),
            _ => Ok(FileInfo::directory(path.name())),
        }
    }

    fn ls(&self, path: &FsPath) -> Result<Vec<FileInfo>, Error> {
        let synthetic = self.synthesized(path);
        let owned = match self.resolve(path) {
            Ok((fs, _, suffix)) => fs.ls(&suffix),
            Err(e) => Err(e),
        };

        let owned = match owned {
            Ok(entries) => entries,
            Err(e) if !synthetic.is_empty() && e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut merged: BTreeMap<String, FileInfo> = owned
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();
        for name in synthetic {
            merged.insert(name.clone(), FileInfo::directory(name));
        }
        Ok(merged.into_values().collect())
    }

    fn mkdir(&self, path: &FsPath, parents: bool) -> Result<(), Error> {
        if self.is_mount_point(path) {
            return Err(Error::AlreadyExists { path: path.clone() });
        }
        let (fs, _, suffix) = self.resolve(path)?;
        fs.mkdir(&suffix, parents)
    }

    fn rm(&self, path: &FsPath, recursive: bool) -> Result<(), Error> {
        if self.is_mount_point(path) {
            return Err(Self::mount_point_error(path));
        }
        let (fs, _, suffix) = self.resolve(path)?;
        fs.rm(&suffix, recursive)
    }

    fn mv(&self, from: &FsPath, to: &FsPath) -> Result<(), Error> {
        if self.is_mount_point(from) {
            return Err(Self::mount_point_error(from));
        }
        if self.is_mount_point(to) {
            return Err(Error::AlreadyExists { path: to.clone() });
        }

        let (src, src_prefix, src_path) = self.resolve(from)?;
        let (dst, dst_prefix, dst_path) = self.resolve(to)?;
        if src_prefix == dst_prefix {
            return src.mv(&src_path, &dst_path);
        }

        log::debug!("Moving {} to {} across routes", from, to);
        copy_tree(&**src, &src_path, &**dst, &dst_path)?;
        src.rm(&src_path, true)
    }

    fn url(&self, path: &FsPath) -> Option<String> {
        let (fs, _, suffix) = self.resolve(path).ok()?;
        fs.url(&suffix)
    }

    fn local_path(&self, path: &FsPath) -> Option<PathBuf> {
        let (fs, _, suffix) = self.resolve(path).ok()?;
        fs.local_path(&suffix)
    }
}
