use std::io::{self, Read};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde_json::Value;

use layerfs_core::{Error as FsError, FileInfo, FsHandle, FsPath, ReadStream, WriteMode, WriteStream};
use layerfs_registry::Registry;

use crate::{StorageError, StorageOptions};

/// Length of the random part of alternative names.
const ALTERNATIVE_SUFFIX_LEN: usize = 6;

/// A file storage over a filesystem handle.
///
/// Names are `/`-separated strings relative to the storage's location.
/// Missing files are reported as [`StorageError::NotFound`]; every other
/// filesystem failure is passed through as [`StorageError::Fs`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use layerfs_core::MemoryFs;
/// use layerfs_storage::Storage;
///
/// let storage = Storage::new(Arc::new(MemoryFs::new()));
/// let name = storage.save("docs/a.txt", &mut &b"hello"[..], None).unwrap();
/// assert_eq!(name, "docs/a.txt");
/// assert_eq!(storage.size(&name).unwrap(), 5);
/// ```
pub struct Storage {
    fs: FsHandle,
    location: FsPath,
    base_url: Option<String>,
    allow_overwrite: bool,
    auto_mkdir: bool,
}

impl Storage {
    /// A storage over `fs` with default options.
    pub fn new(fs: FsHandle) -> Self {
        Self {
            fs,
            location: FsPath::root(),
            base_url: None,
            allow_overwrite: true,
            auto_mkdir: true,
        }
    }

    /// Build a storage from options, resolving its filesystem through `registry`.
    pub fn from_options(registry: &Registry, options: StorageOptions) -> Result<Self, StorageError> {
        let location =
            FsPath::parse(&options.location).map_err(|e| StorageError::ImproperlyConfigured {
                message: format!("invalid location '{}': {}", options.location, e),
            })?;
        let fs = registry.resolve(&options.storage_config)?;
        log::debug!(
            "Storage on '{}' at '{}'",
            options.storage_config.fs_class,
            location
        );

        Ok(Self {
            fs,
            location,
            base_url: options.base_url,
            allow_overwrite: options.allow_overwrite,
            auto_mkdir: options.auto_mkdir,
        })
    }

    /// Build a storage from a JSON options record.
    pub fn from_value(registry: &Registry, value: Value) -> Result<Self, StorageError> {
        Self::from_options(registry, StorageOptions::from_value(value)?)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn allow_overwrite(mut self, allow_overwrite: bool) -> Self {
        self.allow_overwrite = allow_overwrite;
        self
    }

    #[must_use]
    pub fn auto_mkdir(mut self, auto_mkdir: bool) -> Self {
        self.auto_mkdir = auto_mkdir;
        self
    }

    pub fn with_location(mut self, location: &str) -> Result<Self, StorageError> {
        self.location = FsPath::parse(location).map_err(FsError::from)?;
        Ok(self)
    }

    pub fn filesystem(&self) -> &FsHandle {
        &self.fs
    }

    /// Filesystem path of `name`, below the storage's location.
    pub fn fs_path(&self, name: &str) -> Result<FsPath, StorageError> {
        let relative = FsPath::parse(name).map_err(FsError::from)?;
        Ok(self.location.join(&relative))
    }

    /// Open a file for reading.
    pub fn open(&self, name: &str) -> Result<ReadStream, StorageError> {
        self.fs
            .open_read(&self.fs_path(name)?)
            .map_err(|e| StorageError::from_fs(e, name))
    }

    /// Open a file for writing. The content is published on commit.
    pub fn open_write(&self, name: &str) -> Result<WriteStream, StorageError> {
        let path = self.fs_path(name)?;
        self.prepare_parent(&path, name)?;
        self.fs
            .open_write(&path, WriteMode::Truncate)
            .map_err(|e| StorageError::from_fs(e, name))
    }

    fn prepare_parent(&self, path: &FsPath, name: &str) -> Result<(), StorageError> {
        if self.auto_mkdir {
            self.fs
                .makedirs(&path.parent(), true)
                .map_err(|e| StorageError::from_fs(e, name))?;
        }
        Ok(())
    }

    /// Save `content` under `name`, or under an available alternative when
    /// overwriting is disallowed and `name` is taken. Returns the name used.
    pub fn save(
        &self,
        name: &str,
        content: &mut dyn Read,
        max_length: Option<usize>,
    ) -> Result<String, StorageError> {
        let name = self.get_available_name(name, max_length)?;
        let path = self.fs_path(&name)?;

        if self.allow_overwrite && self.exists(&name)? {
            log::debug!("Replacing existing file {}", name);
            self.delete(&name)?;
        }
        self.prepare_parent(&path, &name)?;

        let mut writer = self
            .fs
            .open_write(&path, WriteMode::Truncate)
            .map_err(|e| StorageError::from_fs(e, &name))?;
        io::copy(content, &mut writer).map_err(FsError::from)?;
        writer.commit()?;
        log::debug!("Saved {}", name);
        Ok(name)
    }

    pub fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.fs.exists(&self.fs_path(name)?)?)
    }

    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.fs
            .rm(&self.fs_path(name)?, false)
            .map_err(|e| StorageError::from_fs(e, name))
    }

    pub fn size(&self, name: &str) -> Result<u64, StorageError> {
        self.fs
            .size(&self.fs_path(name)?)
            .map_err(|e| StorageError::from_fs(e, name))
    }

    /// Directory entries below `name`, split into `(directories, files)`.
    pub fn listdir(&self, name: &str) -> Result<(Vec<String>, Vec<String>), StorageError> {
        let (dirs, files): (Vec<FileInfo>, Vec<FileInfo>) =
            self.ls(name)?.into_iter().partition(FileInfo::is_dir);
        Ok((
            dirs.into_iter().map(|e| e.name).collect(),
            files.into_iter().map(|e| e.name).collect(),
        ))
    }

    /// Detailed directory listing.
    pub fn ls(&self, name: &str) -> Result<Vec<FileInfo>, StorageError> {
        self.fs
            .ls(&self.fs_path(name)?)
            .map_err(|e| StorageError::from_fs(e, name))
    }

    /// Public URL of a file: `base_url + name` when a base URL is configured,
    /// otherwise whatever the filesystem reports.
    pub fn url(&self, name: &str) -> Result<String, StorageError> {
        if let Some(base_url) = &self.base_url {
            return Ok(format!("{}{}", base_url, name.trim_start_matches('/')));
        }
        self.fs
            .url(&self.fs_path(name)?)
            .ok_or(StorageError::Unsupported { operation: "url" })
    }

    /// Location of a file on the local disk, for disk-backed filesystems.
    pub fn local_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        self.fs
            .local_path(&self.fs_path(name)?)
            .ok_or(StorageError::Unsupported {
                operation: "local_path",
            })
    }

    pub fn created_time(&self, name: &str) -> Result<DateTime<Utc>, StorageError> {
        self.info(name)?
            .created
            .map(DateTime::<Utc>::from)
            .ok_or(StorageError::Unsupported {
                operation: "created_time",
            })
    }

    pub fn modified_time(&self, name: &str) -> Result<DateTime<Utc>, StorageError> {
        self.info(name)?
            .modified
            .map(DateTime::<Utc>::from)
            .ok_or(StorageError::Unsupported {
                operation: "modified_time",
            })
    }

    pub fn accessed_time(&self, _name: &str) -> Result<DateTime<Utc>, StorageError> {
        Err(StorageError::Unsupported {
            operation: "accessed_time",
        })
    }

    fn info(&self, name: &str) -> Result<FileInfo, StorageError> {
        self.fs
            .info(&self.fs_path(name)?)
            .map_err(|e| StorageError::from_fs(e, name))
    }

    /// A file name stripped of everything but letters, digits, `-`, `_` and
    /// `.`; spaces become underscores.
    pub fn get_valid_name(&self, name: &str) -> Result<String, StorageError> {
        lazy_static! {
            static ref INVALID_CHARS: Regex = Regex::new(r"[^-\w.]").unwrap();
        }

        let cleaned = name.trim().replace(' ', "_");
        let cleaned = INVALID_CHARS.replace_all(&cleaned, "").into_owned();
        if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
            return Err(StorageError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(cleaned)
    }

    /// `file_root` with `_` and six random alphanumerics, then `file_ext`.
    pub fn get_alternative_name(&self, file_root: &str, file_ext: &str) -> String {
        let random: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ALTERNATIVE_SUFFIX_LEN)
            .map(char::from)
            .collect();
        format!("{}_{}{}", file_root, random, file_ext)
    }

    /// A name under which new content can be saved.
    ///
    /// Unless overwriting is allowed, taken names are replaced by alternative
    /// names until a free one is found. With `max_length`, the file root is
    /// truncated so the result fits.
    pub fn get_available_name(
        &self,
        name: &str,
        max_length: Option<usize>,
    ) -> Result<String, StorageError> {
        let (dir, file_name) = split_dir(name);
        let (file_root, file_ext) = split_ext(file_name);
        let mut file_root = file_root.to_string();
        let too_long = |candidate: &str| max_length.is_some_and(|max| candidate.chars().count() > max);

        let mut candidate = name.to_string();
        while (!self.allow_overwrite && self.exists(&candidate)?) || too_long(&candidate) {
            candidate = join_dir(dir, &self.get_alternative_name(&file_root, file_ext));
            if let Some(max) = max_length {
                let overflow = candidate.chars().count().saturating_sub(max);
                if overflow > 0 {
                    let keep = file_root.chars().count().saturating_sub(overflow);
                    if keep == 0 {
                        return Err(StorageError::InvalidName {
                            name: name.to_string(),
                        });
                    }
                    file_root = file_root.chars().take(keep).collect();
                    candidate = join_dir(dir, &self.get_alternative_name(&file_root, file_ext));
                }
            }
        }
        Ok(candidate)
    }

    /// Normalize a user-supplied file name: the directory part is kept and
    /// the file part is passed through [`Storage::get_valid_name`].
    pub fn generate_filename(&self, filename: &str) -> Result<String, StorageError> {
        let (dir, file_name) = split_dir(filename);
        let dir = FsPath::parse(dir).map_err(FsError::from)?;
        let valid = self.get_valid_name(file_name)?;
        Ok(join_dir(&dir.to_string(), &valid))
    }
}

/// Split `a/b/c.txt` into `("a/b", "c.txt")`.
fn split_dir(name: &str) -> (&str, &str) {
    name.rsplit_once('/').unwrap_or(("", name))
}

fn join_dir(dir: &str, file_name: &str) -> String {
    if dir.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", dir, file_name)
    }
}

/// Split a file name into root and extension, keeping compound extensions
/// (`archive.tar.gz` gives `.tar.gz`). Leading dots belong to the root.
fn split_ext(file_name: &str) -> (&str, &str) {
    if file_name.ends_with('.') {
        return (file_name, "");
    }
    let leading = file_name.len() - file_name.trim_start_matches('.').len();
    match file_name[leading..].find('.') {
        Some(i) => file_name.split_at(leading + i),
        None => (file_name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerfs_core::{fspath, FileSystem, MemoryFs};
    use std::sync::Arc;

    fn memory_storage() -> (Storage, MemoryFs) {
        let fs = MemoryFs::new();
        (Storage::new(Arc::new(fs.clone())), fs)
    }

    #[test]
    fn split_ext_cases() {
        assert_eq!(split_ext("photo.png"), ("photo", ".png"));
        assert_eq!(split_ext("archive.tar.gz"), ("archive", ".tar.gz"));
        assert_eq!(split_ext(".bashrc"), (".bashrc", ""));
        assert_eq!(split_ext(".config.json"), (".config", ".json"));
        assert_eq!(split_ext("README"), ("README", ""));
        assert_eq!(split_ext("weird."), ("weird.", ""));
    }

    #[test]
    fn valid_names() {
        let (storage, _) = memory_storage();
        assert_eq!(
            storage.get_valid_name("  my photo (1).png ").unwrap(),
            "my_photo_1.png"
        );
        assert_eq!(storage.get_valid_name("résumé.pdf").unwrap(), "résumé.pdf");
        assert!(storage.get_valid_name("..").is_err());
        assert!(storage.get_valid_name("$%^").is_err());
    }

    #[test]
    fn alternative_name_shape() {
        let (storage, _) = memory_storage();
        let name = storage.get_alternative_name("photo", ".png");
        assert_eq!(name.len(), "photo_".len() + 6 + ".png".len());
        assert!(name.starts_with("photo_"));
        assert!(name.ends_with(".png"));
        assert!(name[6..12].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn available_name_with_overwrite_is_unchanged() {
        let (storage, fs) = memory_storage();
        fs.pipe(&fspath!("a.txt"), b"x").unwrap();
        assert_eq!(storage.get_available_name("a.txt", None).unwrap(), "a.txt");
    }

    #[test]
    fn available_name_without_overwrite_avoids_collisions() {
        let (storage, fs) = memory_storage();
        let storage = storage.allow_overwrite(false);
        fs.pipe(&fspath!("dir/a.tar.gz"), b"x").unwrap();

        let name = storage.get_available_name("dir/a.tar.gz", None).unwrap();
        assert_ne!(name, "dir/a.tar.gz");
        assert!(name.starts_with("dir/a_"));
        assert!(name.ends_with(".tar.gz"));
    }

    #[test]
    fn available_name_respects_max_length() {
        let (storage, _) = memory_storage();
        let name = storage
            .get_available_name("averyveryverylongname.txt", Some(16))
            .unwrap();
        assert!(name.chars().count() <= 16);
        assert!(name.ends_with(".txt"));

        assert!(storage.get_available_name("abc.txt", Some(5)).is_err());
    }

    #[test]
    fn generate_filename_keeps_directory() {
        let (storage, _) = memory_storage();
        assert_eq!(
            storage.generate_filename("uploads/2024/my file!.txt").unwrap(),
            "uploads/2024/my_file.txt"
        );
        assert!(storage.generate_filename("../etc/passwd").is_err());
    }

    #[test]
    fn not_found_maps_to_storage_not_found() {
        let (storage, _) = memory_storage();
        match storage.size("missing.txt") {
            Err(StorageError::NotFound { name }) => assert_eq!(name, "missing.txt"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(storage.open("missing.txt").err().unwrap().is_not_found());
        assert!(storage.delete("missing.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn other_errors_pass_through() {
        let (storage, fs) = memory_storage();
        fs.pipe(&fspath!("file"), b"x").unwrap();
        let err = storage.listdir("file").unwrap_err();
        assert!(matches!(
            err,
            StorageError::Fs(FsError::NotADirectory { .. })
        ));
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn url_sources() {
        let (storage, _) = memory_storage();
        assert!(matches!(
            storage.url("a.png"),
            Err(StorageError::Unsupported { operation: "url" })
        ));

        let storage = storage.with_base_url("https://media.example.com/");
        assert_eq!(
            storage.url("a.png").unwrap(),
            "https://media.example.com/a.png"
        );
    }

    #[test]
    fn times() {
        let (storage, _) = memory_storage();
        storage.save("t.txt", &mut &b"x"[..], None).unwrap();
        let created = storage.created_time("t.txt").unwrap();
        let modified = storage.modified_time("t.txt").unwrap();
        assert!(created <= modified);
        assert!(modified <= Utc::now());
        assert!(matches!(
            storage.accessed_time("t.txt"),
            Err(StorageError::Unsupported { .. })
        ));
    }

    #[test]
    fn location_scopes_names() {
        let (storage, fs) = memory_storage();
        let storage = storage.with_location("media/uploads").unwrap();
        storage.save("a.txt", &mut &b"a"[..], None).unwrap();

        assert!(fs.exists(&fspath!("media/uploads/a.txt")).unwrap());
        assert_eq!(storage.listdir("").unwrap(), (vec![], vec!["a.txt".to_string()]));
    }
}
