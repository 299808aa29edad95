//! Normalized, root-relative filesystem paths.

use std::fmt;

/// Errors related to path parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A path component is not allowed.
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },
    /// The path string is invalid.
    InvalidPath { message: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::InvalidComponent {
                component,
                position,
                message,
            } => {
                write!(
                    f,
                    "invalid path component '{}' at position {}: {}",
                    component, position, message
                )
            }
            PathError::InvalidPath { message } => {
                write!(f, "invalid path: {}", message)
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A path inside a filesystem, relative to that filesystem's root.
///
/// Paths never escape their root: `..` is rejected rather than resolved, so a
/// path handed to a wrapped filesystem can be joined onto a prefix without
/// further checks.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FsPath {
    pub components: Vec<String>,
}

impl FsPath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path string.
    ///
    /// # Path Syntax
    ///
    /// - Components are separated by `/`
    /// - Empty components and `.` are ignored (normalizes `//`, `./` and
    ///   leading or trailing `/`)
    /// - `..` and components containing NUL are rejected
    ///
    /// # Examples
    ///
    /// ```rust
    /// use layerfs_core::FsPath;
    ///
    /// let path = FsPath::parse("images/2024/cat.png").unwrap();
    /// assert_eq!(path.len(), 3);
    ///
    /// assert_eq!(FsPath::parse("/docs/").unwrap(), FsPath::parse("docs").unwrap());
    /// assert!(FsPath::parse("docs/../etc").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let components: Vec<String> = s
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(|c| c.to_string())
            .collect();

        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }

        Ok(FsPath { components })
    }

    /// Try to create a path from components, validating each.
    pub fn try_from_components(components: Vec<String>) -> Result<Self, PathError> {
        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }
        Ok(FsPath { components })
    }

    fn validate_component(component: &str, position: usize) -> Result<(), PathError> {
        let message = if component.is_empty() {
            "empty component"
        } else if component == "." || component == ".." {
            "relative components are not allowed"
        } else if component.contains('/') {
            "component contains a separator"
        } else if component.contains('\0') {
            "component contains a NUL byte"
        } else {
            return Ok(());
        };

        Err(PathError::InvalidComponent {
            component: component.to_string(),
            position,
            message: message.to_string(),
        })
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Alias for [`FsPath::is_root`].
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    /// Iterate over components.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.components.iter()
    }

    /// Last component, or `""` for the root.
    pub fn name(&self) -> &str {
        self.components.last().map(String::as_str).unwrap_or("")
    }

    /// The containing directory. The root is its own parent.
    #[must_use]
    pub fn parent(&self) -> FsPath {
        let end = self.components.len().saturating_sub(1);
        FsPath {
            components: self.components[..end].to_vec(),
        }
    }

    /// Join this path with another.
    #[must_use]
    pub fn join(&self, other: &FsPath) -> FsPath {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        FsPath { components }
    }

    /// Append a single, already validated, name.
    #[must_use]
    pub fn child(&self, name: &str) -> FsPath {
        let mut components = self.components.clone();
        components.push(name.to_string());
        FsPath { components }
    }

    /// Same path with `suffix` appended to the last component.
    ///
    /// Returns `None` for the root, which has no name to extend.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> Option<FsPath> {
        let (last, init) = self.components.split_last()?;
        let mut components = init.to_vec();
        components.push(format!("{}{}", last, suffix));
        Some(FsPath { components })
    }

    /// Check if this path has the given prefix.
    pub fn has_prefix(&self, prefix: &FsPath) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix.components == self.components[..prefix.components.len()]
    }

    /// Strip a prefix from this path.
    ///
    /// Returns `None` if the prefix doesn't match.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &FsPath) -> Option<FsPath> {
        if self.has_prefix(prefix) {
            Some(FsPath {
                components: self.components[prefix.components.len()..].to_vec(),
            })
        } else {
            None
        }
    }

    /// Every proper ancestor followed by the path itself, shortest first.
    /// The root is not included.
    pub fn ancestors_inclusive(&self) -> impl Iterator<Item = FsPath> + '_ {
        (1..=self.components.len()).map(move |end| FsPath {
            components: self.components[..end].to_vec(),
        })
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

impl std::ops::Index<usize> for FsPath {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.components[i]
    }
}

impl std::str::FromStr for FsPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FsPath::parse(s)
    }
}

/// Macro for creating paths from literals.
///
/// # Example
///
/// ```rust
/// use layerfs_core::fspath;
///
/// let p = fspath!("docs/readme.md");
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! fspath {
    ($s:expr) => {
        $crate::FsPath::parse($s).expect("invalid path literal")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_paths() {
        assert_eq!(FsPath::parse("").unwrap().len(), 0);
        assert_eq!(FsPath::parse("foo").unwrap().len(), 1);
        assert_eq!(FsPath::parse("foo/bar.txt").unwrap().len(), 2);
        assert_eq!(FsPath::parse("a b/c-d/e.f").unwrap().len(), 3);
    }

    #[test]
    fn normalize_slashes_and_dots() {
        assert_eq!(
            FsPath::parse("foo/bar/").unwrap(),
            FsPath::parse("foo/bar").unwrap()
        );
        assert_eq!(
            FsPath::parse("foo//./bar").unwrap(),
            FsPath::parse("foo/bar").unwrap()
        );
        assert_eq!(
            FsPath::parse("/foo/bar").unwrap(),
            FsPath::parse("foo/bar").unwrap()
        );
        assert!(FsPath::parse("/").unwrap().is_root());
    }

    #[test]
    fn parent_dir_rejected() {
        let err = FsPath::parse("foo/../bar").unwrap_err();
        assert!(err.to_string().contains("'..'"));
        assert!(err.to_string().contains("position 1"));
        assert!(FsPath::parse("..").is_err());
        assert!(FsPath::parse("nul\0byte").is_err());
    }

    #[test]
    fn hidden_files_allowed() {
        let p = fspath!("config/.env");
        assert_eq!(p.name(), ".env");
    }

    #[test]
    fn parent_and_name() {
        let p = fspath!("a/b/c.txt");
        assert_eq!(p.name(), "c.txt");
        assert_eq!(p.parent(), fspath!("a/b"));
        assert_eq!(FsPath::root().parent(), FsPath::root());
        assert_eq!(FsPath::root().name(), "");
    }

    #[test]
    fn with_suffix_extends_last_component() {
        assert_eq!(
            fspath!("a/b").with_suffix(".deleted"),
            Some(fspath!("a/b.deleted"))
        );
        assert_eq!(FsPath::root().with_suffix(".deleted"), None);
    }

    #[test]
    fn has_prefix_works() {
        let p = fspath!("foo/bar/baz");
        assert!(p.has_prefix(&fspath!("")));
        assert!(p.has_prefix(&fspath!("foo")));
        assert!(p.has_prefix(&fspath!("foo/bar/baz")));
        assert!(!p.has_prefix(&fspath!("fo")));
        assert!(!p.has_prefix(&fspath!("foo/bar/baz/qux")));
    }

    #[test]
    fn strip_prefix_works() {
        let p = fspath!("foo/bar/baz");
        assert_eq!(p.strip_prefix(&fspath!("foo")), Some(fspath!("bar/baz")));
        assert_eq!(p.strip_prefix(&fspath!("foo/bar/baz")), Some(FsPath::root()));
        assert_eq!(p.strip_prefix(&fspath!("other")), None);
    }

    #[test]
    fn ancestors_inclusive_order() {
        let all: Vec<String> = fspath!("a/b/c")
            .ancestors_inclusive()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(all, vec!["a", "a/b", "a/b/c"]);
        assert_eq!(FsPath::root().ancestors_inclusive().count(), 0);
    }

    #[test]
    fn try_from_components_validates() {
        assert!(FsPath::try_from_components(vec!["a".into(), "b".into()]).is_ok());
        assert!(FsPath::try_from_components(vec!["a".into(), "".into()]).is_err());
        assert!(FsPath::try_from_components(vec!["a/b".into()]).is_err());
    }

    #[test]
    fn display_joins_components() {
        assert_eq!(fspath!("/x//y/").to_string(), "x/y");
        assert_eq!(FsPath::root().to_string(), "");
    }
}
