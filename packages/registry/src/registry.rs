//! Identifier to factory mapping.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use layerfs_core::{DirFs, FsHandle, FsPath, LocalFs, MemoryFs, NestedFs, ReadOnlyFs, TransparentFs};

use crate::config::{
    parse_options, FsConfig, LocalOptions, MemoryOptions, NestedOptions, TransparentOptions,
};
use crate::ConfigError;

/// A factory for creating filesystems from backend options.
///
/// The registry is passed along so composite backends can resolve the
/// configurations they contain.
pub trait FsFactory: Send + Sync {
    fn create(&self, registry: &Registry, kwargs: Value) -> Result<FsHandle, ConfigError>;
}

impl<F> FsFactory for F
where
    F: Fn(&Registry, Value) -> Result<FsHandle, ConfigError> + Send + Sync,
{
    fn create(&self, registry: &Registry, kwargs: Value) -> Result<FsHandle, ConfigError> {
        self(registry, kwargs)
    }
}

/// Resolves `{fs_class, kwargs}` records into live filesystem handles.
///
/// # Example
///
/// ```rust
/// use layerfs_registry::{FsConfig, Registry};
/// use layerfs_core::{fspath, FileSystem};
///
/// let registry = Registry::with_builtins();
/// let fs = registry.resolve(&FsConfig::new("memory")).unwrap();
/// fs.pipe(&fspath!("hello.txt"), b"hi").unwrap();
///
/// assert!(registry.resolve(&FsConfig::new("s3")).is_err());
/// ```
#[derive(Default)]
pub struct Registry {
    factories: BTreeMap<String, Box<dyn FsFactory>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in backend registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("memory", memory);
        registry.register("local", local);
        registry.register("file", local);
        registry.register("nested", nested);
        registry.register("transparent", transparent);
        #[cfg(feature = "http")]
        registry.register("http", http);
        registry
    }

    /// Register a factory. Returns `true` if it replaced an existing one.
    pub fn register(&mut self, identifier: &str, factory: impl FsFactory + 'static) -> bool {
        self.factories
            .insert(identifier.to_string(), Box::new(factory))
            .is_some()
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// Build the filesystem a configuration describes.
    ///
    /// `relative_to_path` and `read_only` wrap the backend's handle in a
    /// [`DirFs`] and a [`ReadOnlyFs`] respectively.
    pub fn resolve(&self, config: &FsConfig) -> Result<FsHandle, ConfigError> {
        let factory =
            self.factories
                .get(&config.fs_class)
                .ok_or_else(|| ConfigError::UnknownBackend {
                    identifier: config.fs_class.clone(),
                    known: self.identifiers().map(str::to_string).collect(),
                })?;

        log::debug!("Resolving backend '{}'", config.fs_class);
        let mut fs = factory.create(self, Value::Object(config.kwargs.clone()))?;

        if let Some(relative) = &config.relative_to_path {
            let prefix = FsPath::parse(relative)
                .map_err(|e| ConfigError::construction(&config.fs_class, e))?;
            if !prefix.is_root() {
                fs = Arc::new(DirFs::new(fs, prefix));
            }
        }
        if config.read_only {
            fs = Arc::new(ReadOnlyFs::new(fs));
        }
        Ok(fs)
    }
}

fn memory(_: &Registry, kwargs: Value) -> Result<FsHandle, ConfigError> {
    let opts: MemoryOptions = parse_options("memory", kwargs)?;
    let fs = MemoryFs::with_files(opts.files).map_err(|e| ConfigError::construction("memory", e))?;
    Ok(Arc::new(fs))
}

fn local(_: &Registry, kwargs: Value) -> Result<FsHandle, ConfigError> {
    let opts: LocalOptions = parse_options("local", kwargs)?;
    let fs = LocalFs::open(&opts.root, opts.create_root)
        .map_err(|e| ConfigError::construction("local", e))?
        .auto_mkdir(opts.auto_mkdir);
    Ok(Arc::new(fs))
}

#[cfg(feature = "http")]
fn http(_: &Registry, kwargs: Value) -> Result<FsHandle, ConfigError> {
    use crate::config::HttpOptions;
    use layerfs_http::HttpFs;

    let opts: HttpOptions = parse_options("http", kwargs)?;
    let mut fs = HttpFs::new(&opts.base_url).map_err(|e| ConfigError::construction("http", e))?;
    for (name, value) in &opts.headers {
        fs = fs
            .with_header(name, value)
            .map_err(|e| ConfigError::construction("http", e))?;
    }
    Ok(Arc::new(fs))
}

fn nested(registry: &Registry, kwargs: Value) -> Result<FsHandle, ConfigError> {
    let opts: NestedOptions = parse_options("nested", kwargs)?;
    let mut fs = NestedFs::new();
    for route in &opts.routes {
        let prefix =
            FsPath::parse(&route.prefix).map_err(|e| ConfigError::construction("nested", e))?;
        let handle = registry.resolve(&route.fs_config())?;
        fs.add_route(prefix, handle);
    }
    Ok(Arc::new(fs))
}

fn transparent(registry: &Registry, kwargs: Value) -> Result<FsHandle, ConfigError> {
    let opts: TransparentOptions = parse_options("transparent", kwargs)?;
    let top = registry.resolve(&opts.top)?;
    let bottom = registry.resolve(&opts.bottom)?;
    Ok(Arc::new(TransparentFs::new(top, bottom)))
}
