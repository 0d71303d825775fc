//! Directory Tree
//!
//! The naming server's view of the filesystem. Nodes live in an arena indexed by
//! `NodeId`; directories map child names to indices. Slots freed by deletions are reused.
//!
//! The tree knows nothing about the network: it records which storage servers hold each
//! file, and the service decides when to contact them.

use crate::common::{FsError, Path};
use crate::rpc::Stub;
use crate::storage::protocol::StorageApi;

use std::collections::{BTreeMap, HashSet};

pub type NodeId = usize;

const ROOT: NodeId = 0;

/// Bookkeeping for one file.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// The storage server clients are sent to.
    pub primary: Stub<StorageApi>,
    /// Every storage server holding a copy, the primary included.
    pub replicas: HashSet<Stub<StorageApi>>,
    /// Number of times clients asked for the file's storage server.
    pub access_count: u64,
}

impl FileEntry {
    pub fn new(holder: Stub<StorageApi>) -> Self {
        Self {
            primary: holder,
            replicas: HashSet::from([holder]),
            access_count: 0,
        }
    }
}

#[derive(Debug)]
enum NodeKind {
    Directory(BTreeMap<String, NodeId>),
    File(FileEntry),
}

#[derive(Debug)]
struct TreeNode {
    path: Path,
    parent: Option<NodeId>,
    kind: NodeKind,
}

#[derive(Debug)]
pub struct DirectoryTree {
    nodes: Vec<Option<TreeNode>>,
    free: Vec<NodeId>,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryTree {
    /// A tree holding only the root directory.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(TreeNode {
                path: Path::root(),
                parent: None,
                kind: NodeKind::Directory(BTreeMap::new()),
            })],
            free: Vec::new(),
        }
    }

    fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)?.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(id)?.as_mut()
    }

    fn children(&self, id: NodeId) -> Option<&BTreeMap<String, NodeId>> {
        match &self.node(id)?.kind {
            NodeKind::Directory(children) => Some(children),
            NodeKind::File(_) => None,
        }
    }

    /// Walks from the root, one directory per component.
    ///
    /// A missing component, or a component below a file, is `NotFound`.
    pub fn resolve(&self, path: &Path) -> Result<NodeId, FsError> {
        let mut current = ROOT;
        for component in path {
            current = self
                .children(current)
                .and_then(|children| children.get(component).copied())
                .ok_or_else(|| FsError::not_found(path))?;
        }

        Ok(current)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.resolve(path).is_ok()
    }

    pub fn is_directory(&self, path: &Path) -> Result<bool, FsError> {
        let id = self.resolve(path)?;
        Ok(self.children(id).is_some())
    }

    /// Names of the children of `directory`, in sorted order.
    pub fn list(&self, directory: &Path) -> Result<Vec<String>, FsError> {
        let id = self.resolve(directory)?;
        self.children(id)
            .map(|children| children.keys().cloned().collect())
            .ok_or_else(|| FsError::not_found(format!("{} is not a directory", directory)))
    }

    pub fn file(&self, path: &Path) -> Result<&FileEntry, FsError> {
        let id = self.resolve(path)?;
        match self.node(id).map(|node| &node.kind) {
            Some(NodeKind::File(entry)) => Ok(entry),
            _ => Err(FsError::not_found(format!("{} is not a file", path))),
        }
    }

    pub fn file_mut(&mut self, path: &Path) -> Result<&mut FileEntry, FsError> {
        let id = self.resolve(path)?;
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::File(entry)) => Ok(entry),
            _ => Err(FsError::not_found(format!("{} is not a file", path))),
        }
    }

    /// Whether a new node could be linked at `path`.
    ///
    /// `false` for the root or a name already taken; `NotFound` if the parent is not a
    /// directory.
    pub fn can_create(&self, path: &Path) -> Result<bool, FsError> {
        Ok(self.vacancy(path)?.is_some())
    }

    /// The parent directory of `path` if the name is free.
    fn vacancy(&self, path: &Path) -> Result<Option<NodeId>, FsError> {
        let (Ok(parent), Ok(name)) = (path.parent(), path.last()) else {
            return Ok(None);
        };

        let parent_id = self.resolve(&parent)?;
        let children = self
            .children(parent_id)
            .ok_or_else(|| FsError::not_found(format!("{} is not a directory", parent)))?;

        Ok((!children.contains_key(name)).then_some(parent_id))
    }

    pub fn insert_file(&mut self, path: &Path, entry: FileEntry) -> Result<bool, FsError> {
        self.insert(path, NodeKind::File(entry))
    }

    pub fn insert_directory(&mut self, path: &Path) -> Result<bool, FsError> {
        self.insert(path, NodeKind::Directory(BTreeMap::new()))
    }

    fn insert(&mut self, path: &Path, kind: NodeKind) -> Result<bool, FsError> {
        match self.vacancy(path)? {
            Some(parent) => Ok(self.link(parent, path.clone(), kind).is_some()),
            None => Ok(false),
        }
    }

    /// Adds a node below `parent`, which must be a directory.
    fn link(&mut self, parent: NodeId, path: Path, kind: NodeKind) -> Option<NodeId> {
        let name = path.last().ok()?.to_string();
        self.children(parent)?;

        let node = TreeNode {
            path,
            parent: Some(parent),
            kind,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };

        if let Some(NodeKind::Directory(children)) = self.node_mut(parent).map(|n| &mut n.kind) {
            children.insert(name, id);
        }

        Some(id)
    }

    /// Adds a file offered by a storage server, creating missing ancestor directories.
    ///
    /// Returns `false` if the path already exists, or if an ancestor is a file. In that
    /// case `holder` is not recorded anywhere.
    pub fn graft(&mut self, path: &Path, holder: Stub<StorageApi>) -> bool {
        let components: Vec<&str> = path.components().collect();
        let Some((leaf, ancestors)) = components.split_last() else {
            return false;
        };

        let mut current = ROOT;
        let mut current_path = Path::root();
        for component in ancestors {
            let Ok(next_path) = current_path.join(*component) else {
                return false;
            };

            let existing = match self.children(current) {
                Some(children) => children.get(*component).copied(),
                None => return false,
            };

            current = match existing {
                Some(id) => id,
                None => match self.link(
                    current,
                    next_path.clone(),
                    NodeKind::Directory(BTreeMap::new()),
                ) {
                    Some(id) => id,
                    None => return false,
                },
            };
            current_path = next_path;
        }

        let vacant = self
            .children(current)
            .is_some_and(|children| !children.contains_key(*leaf));

        vacant
            && self
                .link(current, path.clone(), NodeKind::File(FileEntry::new(holder)))
                .is_some()
    }

    /// Every storage server holding a file at or below `path`.
    pub fn holders_under(&self, path: &Path) -> Result<HashSet<Stub<StorageApi>>, FsError> {
        let mut holders = HashSet::new();
        let mut pending = vec![self.resolve(path)?];

        while let Some(id) = pending.pop() {
            match self.node(id).map(|node| &node.kind) {
                Some(NodeKind::File(entry)) => holders.extend(entry.replicas.iter().copied()),
                Some(NodeKind::Directory(children)) => pending.extend(children.values().copied()),
                None => {}
            }
        }

        Ok(holders)
    }

    /// Unlinks `path` and everything beneath it.
    ///
    /// Returns the paths of the removed files. The root cannot be removed.
    pub fn remove(&mut self, path: &Path) -> Result<Vec<Path>, FsError> {
        let id = self.resolve(path)?;
        let name = path
            .last()
            .map_err(|_| FsError::invalid_argument("the root directory cannot be removed"))?
            .to_string();

        let parent = self.node(id).and_then(|node| node.parent);
        if let Some(NodeKind::Directory(children)) =
            parent.and_then(|p| self.node_mut(p)).map(|n| &mut n.kind)
        {
            children.remove(&name);
        }

        let mut removed_files = Vec::new();
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(node) = self.nodes.get_mut(id).and_then(Option::take) else {
                continue;
            };
            self.free.push(id);

            match node.kind {
                NodeKind::File(_) => removed_files.push(node.path),
                NodeKind::Directory(children) => pending.extend(children.into_values()),
            }
        }

        removed_files.sort();
        Ok(removed_files)
    }

    /// Number of files and directories, the root excluded.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
