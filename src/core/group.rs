//! Hierarchical groups
//!
//! Groups live in a flat map keyed by absolute path. A group refers to its
//! parent and children by path, so the tree has a single owner and no
//! reference cycles.

use crate::attr::AttrValue;
use crate::error::{ContainerError, Result};
use crate::handle::ArrayHandle;
use crate::validation::{child_path, split_group_path, validate_group_name};
use std::collections::HashMap;
use tracing::debug;

/// Path of the root group
pub const ROOT_PATH: &str = "/";

/// Map that remembers insertion order. Replacing a value keeps its position.
#[derive(Debug, Clone)]
struct Entries<V> {
    keys: Vec<String>,
    values: HashMap<String, V>,
}

impl<V> Entries<V> {
    fn new() -> Self {
        Entries {
            keys: Vec::new(),
            values: HashMap::new(),
        }
    }

    fn insert(&mut self, key: String, value: V) {
        if !self.values.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.values.insert(key, value);
    }

    fn get(&self, key: &str) -> Option<&V> {
        self.values.get(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.keys
            .iter()
            .filter_map(move |k| self.values.get(k).map(|v| (k.as_str(), v)))
    }
}

/// One node of the group tree
#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    path: String,
    parent: Option<String>,
    attrs: Entries<AttrValue>,
    arrays: Entries<ArrayHandle>,
    children: Vec<String>,
}

impl Group {
    fn new(name: &str, path: String, parent: Option<String>) -> Self {
        Group {
            name: name.to_string(),
            path,
            parent,
            attrs: Entries::new(),
            arrays: Entries::new(),
            children: Vec::new(),
        }
    }

    /// Last path segment; `/` for the root
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path, e.g. `/A/B`
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of the parent group, `None` for the root
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn get_array(&self, name: &str) -> Result<&ArrayHandle> {
        self.arrays
            .get(name)
            .ok_or_else(|| ContainerError::ArrayNotFound {
                group: self.path.clone(),
                name: name.to_string(),
            })
    }

    pub fn get_attr(&self, name: &str) -> Result<&AttrValue> {
        self.attrs
            .get(name)
            .ok_or_else(|| ContainerError::AttributeNotFound {
                group: self.path.clone(),
                name: name.to_string(),
            })
    }

    pub fn has_array(&self, name: &str) -> bool {
        self.arrays.contains(name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains(name)
    }

    /// Attribute names in the order they were first set
    pub fn list_attrs(&self) -> Vec<&str> {
        self.attrs.keys.iter().map(String::as_str).collect()
    }

    /// Array names in the order they were first written
    pub fn list_arrays(&self) -> Vec<&str> {
        self.arrays.keys.iter().map(String::as_str).collect()
    }

    /// Names of the direct child groups in creation order
    pub fn list_groups(&self) -> Vec<&str> {
        self.children
            .iter()
            .map(|path| path.rsplit('/').next().unwrap_or(path.as_str()))
            .collect()
    }

    /// Attributes with their values, in insertion order
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter()
    }

    /// Array handles in insertion order
    pub fn arrays(&self) -> impl Iterator<Item = &ArrayHandle> {
        self.arrays.iter().map(|(_, handle)| handle)
    }

    /// Absolute paths of the direct child groups
    pub fn child_paths(&self) -> &[String] {
        &self.children
    }

    pub fn attr_count(&self) -> usize {
        self.attrs.len()
    }

    pub fn array_count(&self) -> usize {
        self.arrays.len()
    }

    pub(crate) fn insert_attr(&mut self, name: &str, value: AttrValue) {
        self.attrs.insert(name.to_string(), value);
    }

    pub(crate) fn insert_array(&mut self, handle: ArrayHandle) {
        self.arrays.insert(handle.name.clone(), handle);
    }
}

/// Normalise an absolute group path: `/A/B/` becomes `/A/B`.
pub(crate) fn canonical_path(path: &str) -> Result<String> {
    let segments = split_group_path(path)?;
    if segments.is_empty() {
        return Ok(ROOT_PATH.to_string());
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Owner of every group in a session
#[derive(Debug)]
pub(crate) struct GroupTree {
    root: Group,
    groups: HashMap<String, Group>,
    created: Vec<String>,
}

impl GroupTree {
    pub fn new() -> Self {
        GroupTree {
            root: Group::new(ROOT_PATH, ROOT_PATH.to_string(), None),
            groups: HashMap::new(),
            created: Vec::new(),
        }
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Look up a group by an already canonical path.
    pub fn get(&self, path: &str) -> Option<&Group> {
        if path == ROOT_PATH {
            Some(&self.root)
        } else {
            self.groups.get(path)
        }
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Group> {
        if path == ROOT_PATH {
            Some(&mut self.root)
        } else {
            self.groups.get_mut(path)
        }
    }

    /// Group at a canonical path already in the tree.
    ///
    /// Panics if the path is unknown; groups are never removed.
    pub fn existing(&self, path: &str) -> &Group {
        if path == ROOT_PATH {
            &self.root
        } else {
            &self.groups[path]
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        path == ROOT_PATH || self.groups.contains_key(path)
    }

    /// Create every missing group along a canonical path.
    pub fn ensure(&mut self, path: &str) -> Result<()> {
        let mut parent = ROOT_PATH.to_string();
        for segment in split_group_path(path)? {
            parent = self.ensure_child(&parent, segment)?;
        }
        Ok(())
    }

    /// Create (or find) the child `name` of the group at `parent`.
    ///
    /// Returns the child's path.
    pub fn ensure_child(&mut self, parent: &str, name: &str) -> Result<String> {
        validate_group_name(name)?;
        let path = child_path(parent, name);
        if self.groups.contains_key(&path) {
            return Ok(path);
        }

        let parent_group = self
            .get_mut(parent)
            .ok_or_else(|| ContainerError::GroupNotFound(parent.to_string()))?;
        parent_group.children.push(path.clone());

        debug!("Created group {}", path);
        self.groups.insert(
            path.clone(),
            Group::new(name, path.clone(), Some(parent.to_string())),
        );
        self.created.push(path.clone());
        Ok(path)
    }

    /// Number of groups, root excluded
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Every non-root group in creation order
    pub fn all(&self) -> impl Iterator<Item = &Group> {
        self.created.iter().filter_map(move |path| self.groups.get(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_path() {
        assert_eq!(canonical_path("/").unwrap(), "/");
        assert_eq!(canonical_path("/A/B/").unwrap(), "/A/B");
        assert!(canonical_path("A").is_err());
        assert!(canonical_path("/A//B").is_err());
    }

    #[test]
    fn test_ensure_creates_intermediates() {
        let mut tree = GroupTree::new();
        tree.ensure("/A/B/C").unwrap();

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.root().list_groups(), vec!["A"]);

        let b = tree.get("/A/B").unwrap();
        assert_eq!(b.name(), "B");
        assert_eq!(b.parent(), Some("/A"));
        assert_eq!(b.list_groups(), vec!["C"]);

        let a = tree.get("/A").unwrap();
        assert_eq!(a.parent(), Some("/"));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut tree = GroupTree::new();
        tree.ensure("/A/B").unwrap();
        tree.ensure("/A/B").unwrap();
        tree.ensure("/A").unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get("/A").unwrap().child_paths(), &["/A/B".to_string()]);

        let order: Vec<&str> = tree.all().map(Group::path).collect();
        assert_eq!(order, vec!["/A", "/A/B"]);
    }

    #[test]
    fn test_ensure_child_rejects_slash() {
        let mut tree = GroupTree::new();
        assert!(matches!(
            tree.ensure_child("/", "a/b"),
            Err(ContainerError::InvalidGroupName(_))
        ));
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn test_lookups() {
        let mut tree = GroupTree::new();
        tree.ensure("/g").unwrap();
        let group = tree.get_mut("/g").unwrap();
        group.insert_attr("b", AttrValue::Long(1));
        group.insert_attr("a", AttrValue::Long(2));
        group.insert_attr("b", AttrValue::Long(3));

        let group = tree.get("/g").unwrap();
        assert_eq!(group.list_attrs(), vec!["b", "a"]);
        assert_eq!(group.get_attr("b").unwrap(), &AttrValue::Long(3));
        assert!(matches!(
            group.get_attr("zzz"),
            Err(ContainerError::AttributeNotFound { .. })
        ));
        assert!(matches!(
            group.get_array("zzz"),
            Err(ContainerError::ArrayNotFound { .. })
        ));
    }
}
