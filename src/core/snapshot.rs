//! Metadata snapshot
//!
//! The whole group tree is written as one pretty-printed JSON document. The
//! file is always replaced atomically so a reader never sees half a snapshot.

use crate::array::Order;
use crate::attr::AttrValue;
use crate::error::{ContainerError, Result};
use crate::group::{Group, GroupTree, ROOT_PATH};
use crate::handle::ArrayHandle;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Serialized form of one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    pub name: String,
    #[serde(default)]
    pub attrs: Map<String, Value>,
    #[serde(default)]
    pub arrays: Vec<ArrayEntry>,
    #[serde(default)]
    pub children: Vec<GroupNode>,
}

/// Serialized form of an [`ArrayHandle`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayEntry {
    pub name: String,
    pub record_offset: u64,
    pub data_offset: u64,
    pub bytes_len: u64,
    pub dtype: String,
    pub order: Order,
    pub shape: Vec<u64>,
}

impl From<&ArrayHandle> for ArrayEntry {
    fn from(handle: &ArrayHandle) -> Self {
        ArrayEntry {
            name: handle.name.clone(),
            record_offset: handle.record_offset,
            data_offset: handle.data_offset,
            bytes_len: handle.bytes_len,
            dtype: handle.dtype.to_string(),
            order: handle.order,
            shape: handle.shape.clone(),
        }
    }
}

impl ArrayEntry {
    fn into_handle(self, group: &str) -> Result<ArrayHandle> {
        Ok(ArrayHandle {
            group: group.to_string(),
            dtype: self.dtype.parse()?,
            name: self.name,
            record_offset: self.record_offset,
            data_offset: self.data_offset,
            bytes_len: self.bytes_len,
            order: self.order,
            shape: self.shape,
        })
    }
}

impl GroupNode {
    pub(crate) fn from_tree(tree: &GroupTree) -> Self {
        Self::from_group(tree, tree.root())
    }

    fn from_group(tree: &GroupTree, group: &Group) -> Self {
        GroupNode {
            name: group.name().to_string(),
            attrs: group
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_json()))
                .collect(),
            arrays: group.arrays().map(ArrayEntry::from).collect(),
            children: group
                .child_paths()
                .iter()
                .filter_map(|path| tree.get(path))
                .map(|child| Self::from_group(tree, child))
                .collect(),
        }
    }

    /// Rebuild this node's subtree under the group at `path`.
    pub(crate) fn apply(self, tree: &mut GroupTree, path: &str) -> Result<()> {
        let group = tree
            .get_mut(path)
            .ok_or_else(|| ContainerError::GroupNotFound(path.to_string()))?;

        for (name, value) in &self.attrs {
            group.insert_attr(name, AttrValue::from_json(name, value)?);
        }
        for entry in self.arrays {
            group.insert_array(entry.into_handle(path)?);
        }

        for child in self.children {
            let child_path = tree.ensure_child(path, &child.name)?;
            child.apply(tree, &child_path)?;
        }
        Ok(())
    }
}

/// Serialize the tree and atomically replace the file at `path`.
pub(crate) fn write(tree: &GroupTree, path: &Path) -> Result<()> {
    let node = GroupNode::from_tree(tree);
    let json = serde_json::to_vec_pretty(&node)?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_data()?;
    tmp.persist(path).map_err(|e| ContainerError::Io(e.error))?;

    debug!("Wrote metadata snapshot ({} bytes) to {:?}", json.len(), path);
    Ok(())
}

/// Read the snapshot at `path`; `None` when the file does not exist.
pub fn read(path: &Path) -> Result<Option<GroupNode>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Load the snapshot at `path` into `tree`. Returns whether a file was found.
pub(crate) fn load(tree: &mut GroupTree, path: &Path) -> Result<bool> {
    match read(path)? {
        Some(node) => {
            node.apply(tree, ROOT_PATH)?;
            debug!("Loaded metadata snapshot from {:?}", path);
            Ok(true)
        }
        None => Ok(false),
    }
}
