//! A prefix trie keyed by path components.
//!
//! Used by [`NestedFs`](crate::NestedFs) to find the deepest route covering a
//! path in O(k), where k is the path depth.

use std::collections::BTreeMap;

use crate::FsPath;

/// A prefix trie keyed by path components.
///
/// Each node can optionally hold a value, and has children indexed by path
/// component strings.
///
/// # Example
///
/// ```rust
/// use layerfs_core::{fspath, PathTrie};
///
/// let mut trie: PathTrie<i32> = PathTrie::new();
/// trie.insert(&fspath!("a/b"), 1);
/// trie.insert(&fspath!("a/b/c"), 2);
///
/// assert_eq!(trie.get(&fspath!("a/b")), Some(&1));
///
/// // find_ancestor returns the deepest value along the path
/// let (value, prefix, suffix) = trie.find_ancestor(&fspath!("a/b/c/d")).unwrap();
/// assert_eq!(*value, 2);
/// assert_eq!(prefix, fspath!("a/b/c"));
/// assert_eq!(suffix, fspath!("d"));
/// ```
#[derive(Debug, Clone)]
pub struct PathTrie<T> {
    value: Option<T>,
    children: BTreeMap<String, PathTrie<T>>,
}

impl<T> Default for PathTrie<T> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<T> PathTrie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create_node(&mut self, path: &FsPath) -> &mut PathTrie<T> {
        let mut current = self;
        for component in path.iter() {
            current = current.children.entry(component.clone()).or_default();
        }
        current
    }

    fn get_node(&self, path: &FsPath) -> Option<&PathTrie<T>> {
        let mut current = self;
        for component in path.iter() {
            current = current.children.get(component)?;
        }
        Some(current)
    }

    /// Insert a value at path. Returns previous value if any.
    pub fn insert(&mut self, path: &FsPath, value: T) -> Option<T> {
        self.get_or_create_node(path).value.replace(value)
    }

    /// Get reference to value at exact path.
    pub fn get(&self, path: &FsPath) -> Option<&T> {
        self.get_node(path)?.value.as_ref()
    }

    /// Check if exact path has a value.
    pub fn contains_value(&self, path: &FsPath) -> bool {
        self.get(path).is_some()
    }

    /// Get reference to subtrie at path.
    pub fn get_subtrie(&self, path: &FsPath) -> Option<&PathTrie<T>> {
        self.get_node(path)
    }

    /// Names of the direct children of this node, sorted.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Count of values in trie (not nodes).
    pub fn len(&self) -> usize {
        let self_count = usize::from(self.value.is_some());
        let children_count: usize = self.children.values().map(PathTrie::len).sum();
        self_count + children_count
    }

    /// True if no values anywhere in trie.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.values().all(PathTrie::is_empty)
    }

    /// Find the deepest node along `path` holding a value.
    ///
    /// Returns the value, the prefix it is stored at, and the remaining suffix.
    pub fn find_ancestor(&self, path: &FsPath) -> Option<(&T, FsPath, FsPath)> {
        let mut current = self;
        let mut last_value: Option<&T> = self.value.as_ref();
        let mut last_depth: usize = 0;

        for (depth, component) in path.iter().enumerate() {
            match current.children.get(component) {
                Some(child) => {
                    current = child;
                    if child.value.is_some() {
                        last_value = child.value.as_ref();
                        last_depth = depth + 1;
                    }
                }
                None => break,
            }
        }

        last_value.map(|v| {
            let prefix = FsPath {
                components: path.components[..last_depth].to_vec(),
            };
            let suffix = FsPath {
                components: path.components[last_depth..].to_vec(),
            };
            (v, prefix, suffix)
        })
    }

    /// Iterate over all (path, value) pairs, parents before children.
    pub fn iter(&self) -> PathTrieIter<'_, T> {
        PathTrieIter {
            stack: vec![(FsPath::root(), self)],
        }
    }
}

/// Iterator over (FsPath, &T) pairs in a PathTrie.
pub struct PathTrieIter<'a, T> {
    stack: Vec<(FsPath, &'a PathTrie<T>)>,
}

impl<'a, T> Iterator for PathTrieIter<'a, T> {
    type Item = (FsPath, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            // Reverse so children come out in name order.
            for (name, child) in node.children.iter().rev() {
                self.stack.push((path.child(name), child));
            }

            if let Some(ref value) = node.value {
                return Some((path, value));
            }
        }
        None
    }
}
