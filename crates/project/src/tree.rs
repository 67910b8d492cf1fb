use thiserror::Error;
use tracing::{debug, info, warn};

use treepad_access::{AccessError, DirEntry, DirectoryAccess, EntryKind, Handle, MAX_TRAVERSAL_DEPTH};

use crate::ignore::IgnoreRules;

/// Name of the exclusion file read from the root directory.
pub const IGNORE_FILE_NAME: &str = ".gitignore";

/// Cached mirror of one filesystem node.  
/// 檔案系統節點的快取鏡像。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub kind: EntryKind,
    pub handle: Handle,
    pub parent_handle: Handle,
    /// `/`-joined names from the root; `""` for the root itself.
    pub path: String,
    /// `Some` once the immediate children were fetched, sorted directories
    /// first then by name.
    pub children: Option<Vec<TreeEntry>>,
    /// Presentation state only; collapsing never drops `children`.
    pub expanded: bool,
}

impl TreeEntry {
    fn stub(entry: DirEntry) -> Self {
        Self {
            name: entry.name,
            kind: entry.kind,
            handle: entry.handle,
            parent_handle: entry.parent,
            path: entry.path,
            children: None,
            expanded: false,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    pub fn children_loaded(&self) -> bool {
        self.children.is_some()
    }
}

/// Flattened, depth-annotated row for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub path: String,
    pub name: String,
    pub kind: EntryKind,
    pub depth: usize,
    pub expanded: bool,
}

/// One file surfaced by full enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub name: String,
    pub handle: Handle,
}

/// Errors raised by [`TreeCache`].  
/// [`TreeCache`] 可能回傳的錯誤。
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("no folder is open")]
    NoRoot,
    #[error("'{0}' is not in the tree")]
    UnknownPath(String),
    #[error("'{0}' is not a directory")]
    NotADirectory(String),
    #[error(transparent)]
    Access(#[from] AccessError),
}

impl TreeError {
    pub fn is_not_found(&self) -> bool {
        match self {
            TreeError::UnknownPath(_) => true,
            TreeError::Access(err) => err.is_not_found(),
            _ => false,
        }
    }
}

/// Lazily expanded mirror of the granted directory.
///
/// Only the top level is fetched on load; deeper levels are fetched on first
/// expansion and then reused until invalidated. The cache never holds the
/// access provider; every fetching operation borrows it.
#[derive(Debug, Default)]
pub struct TreeCache {
    root: Option<TreeEntry>,
    rules: IgnoreRules,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&TreeEntry> {
        self.root.as_ref()
    }

    pub fn rules(&self) -> &IgnoreRules {
        &self.rules
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.rules = IgnoreRules::empty();
    }

    /// Enumerates the top level of the current root, discarding any previous
    /// cache.
    pub fn load_root(&mut self, access: &DirectoryAccess) -> Result<&[TreeEntry], TreeError> {
        let handle = access.root().cloned().ok_or(TreeError::NoRoot)?;
        let children = fetch_level(access, &handle, "")?;
        self.rules = load_ignore_rules(access, &handle);
        info!(root = handle.name(), entries = children.len(), "loaded folder tree");
        let root = self.root.insert(TreeEntry {
            name: handle.name().to_string(),
            kind: EntryKind::Directory,
            parent_handle: handle.clone(),
            handle,
            path: String::new(),
            children: Some(children),
            expanded: true,
        });
        Ok(root.children.as_deref().unwrap_or_default())
    }

    /// Re-fetches the top level. Nested caches of surviving directories are
    /// carried over unverified.
    pub fn refresh(&mut self, access: &DirectoryAccess) -> Result<(), TreeError> {
        let handle = access.root().cloned().ok_or(TreeError::NoRoot)?;
        let same_root = self
            .root
            .as_ref()
            .is_some_and(|root| access.same_entry(&root.handle, &handle));
        if !same_root {
            self.load_root(access)?;
            return Ok(());
        }
        self.rules = load_ignore_rules(access, &handle);
        self.refresh_directory(access, "")
    }

    /// Re-fetches one directory level, keeping nested caches and expansion
    /// state for children that still exist with the same kind.
    pub fn refresh_directory(
        &mut self,
        access: &DirectoryAccess,
        path: &str,
    ) -> Result<(), TreeError> {
        let entry = self.directory_mut(path)?;
        let mut fresh = fetch_level(access, &entry.handle, &entry.path)?;
        if let Some(previous) = entry.children.take() {
            for child in &mut fresh {
                if let Some(old) = previous
                    .iter()
                    .find(|old| old.name == child.name && old.kind == child.kind)
                {
                    child.children = old.children.clone();
                    child.expanded = old.expanded;
                }
            }
        }
        debug!(path, entries = fresh.len(), "refreshed directory level");
        entry.children = Some(fresh);
        Ok(())
    }

    /// Looks up a cached entry by path.
    pub fn entry(&self, path: &str) -> Option<&TreeEntry> {
        let mut current = self.root.as_ref()?;
        for segment in segments(path) {
            current = current
                .children
                .as_ref()?
                .iter()
                .find(|child| child.name == segment)?;
        }
        Some(current)
    }

    fn entry_mut(&mut self, path: &str) -> Result<&mut TreeEntry, TreeError> {
        let mut current = self.root.as_mut().ok_or(TreeError::NoRoot)?;
        for segment in segments(path) {
            current = current
                .children
                .as_mut()
                .and_then(|children| children.iter_mut().find(|child| child.name == segment))
                .ok_or_else(|| TreeError::UnknownPath(path.to_string()))?;
        }
        Ok(current)
    }

    fn directory_mut(&mut self, path: &str) -> Result<&mut TreeEntry, TreeError> {
        let entry = self.entry_mut(path)?;
        if entry.is_directory() {
            Ok(entry)
        } else {
            Err(TreeError::NotADirectory(path.to_string()))
        }
    }

    /// Expands a directory, fetching its children only on first expansion.
    pub fn expand(
        &mut self,
        access: &DirectoryAccess,
        path: &str,
    ) -> Result<&[TreeEntry], TreeError> {
        let entry = self.directory_mut(path)?;
        if entry.children.is_none() {
            let fetched = fetch_level(access, &entry.handle, &entry.path)?;
            entry.children = Some(fetched);
        } else {
            debug!(path, "expanded from cache");
        }
        entry.expanded = true;
        Ok(entry.children.as_deref().unwrap_or_default())
    }

    pub fn collapse(&mut self, path: &str) -> Result<(), TreeError> {
        let entry = self.directory_mut(path)?;
        if !entry.path.is_empty() {
            entry.expanded = false;
        }
        Ok(())
    }

    /// Flips expansion and returns the new state.
    pub fn toggle(&mut self, access: &DirectoryAccess, path: &str) -> Result<bool, TreeError> {
        let expanded = self.directory_mut(path)?.expanded;
        if expanded && !path.is_empty() {
            self.collapse(path)?;
            Ok(false)
        } else {
            self.expand(access, path)?;
            Ok(true)
        }
    }

    /// Drops the cached children of `path` so the next expansion re-reads
    /// them. Unknown paths are ignored.
    pub fn invalidate(&mut self, path: &str) {
        if let Ok(entry) = self.entry_mut(path) {
            entry.children = None;
        }
    }

    /// Brings the directory at `path` back in line with disk after a
    /// mutation below it: the root is refreshed; other directories are
    /// invalidated and, when expanded, fetched again.
    pub fn resync(&mut self, access: &DirectoryAccess, path: &str) -> Result<(), TreeError> {
        if path.is_empty() {
            return self.refresh(access);
        }
        let expanded = match self.entry(path) {
            Some(entry) => entry.expanded,
            None => return self.refresh(access),
        };
        self.invalidate(path);
        if expanded {
            self.expand(access, path)?;
        }
        Ok(())
    }

    /// Rows of the root's children and of every expanded, loaded directory.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        if let Some(children) = self.root.as_ref().and_then(|root| root.children.as_ref()) {
            push_rows(children, 0, &mut rows);
        }
        rows
    }

    /// Recursive walk of the live directory, pruning excluded directories
    /// before descending. Independent of the browse cache.
    pub fn all_files(&self, access: &DirectoryAccess) -> Result<Vec<FileRecord>, TreeError> {
        let root = access.root().cloned().ok_or(TreeError::NoRoot)?;
        let mut files = Vec::new();
        let mut pending = vec![(root, String::new(), 0usize)];
        while let Some((dir, dir_path, depth)) = pending.pop() {
            for entry in access.read_directory_level(&dir, &dir_path)? {
                if self.rules.is_ignored(&entry.path, entry.kind.is_directory()) {
                    continue;
                }
                match entry.kind {
                    EntryKind::File => files.push(FileRecord {
                        path: entry.path,
                        name: entry.name,
                        handle: entry.handle,
                    }),
                    EntryKind::Directory if depth + 1 < MAX_TRAVERSAL_DEPTH => {
                        pending.push((entry.handle, entry.path, depth + 1));
                    }
                    EntryKind::Directory => {
                        warn!(path = %entry.path, "skipping directory beyond traversal depth");
                    }
                }
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(count = files.len(), "enumerated all files");
        Ok(files)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn fetch_level(
    access: &DirectoryAccess,
    dir: &Handle,
    path: &str,
) -> Result<Vec<TreeEntry>, TreeError> {
    Ok(access
        .read_directory_level(dir, path)?
        .into_iter()
        .map(TreeEntry::stub)
        .collect())
}

fn push_rows(entries: &[TreeEntry], depth: usize, rows: &mut Vec<TreeRow>) {
    for entry in entries {
        rows.push(TreeRow {
            path: entry.path.clone(),
            name: entry.name.clone(),
            kind: entry.kind,
            depth,
            expanded: entry.expanded,
        });
        if entry.expanded {
            if let Some(children) = &entry.children {
                push_rows(children, depth + 1, rows);
            }
        }
    }
}

fn load_ignore_rules(access: &DirectoryAccess, root: &Handle) -> IgnoreRules {
    let file = match access.lookup(root, IGNORE_FILE_NAME, EntryKind::File) {
        Ok(file) => file,
        Err(AccessError::NotFound(_) | AccessError::KindConflict { .. }) => {
            return IgnoreRules::empty();
        }
        Err(err) => {
            warn!(%err, "could not open ignore file; enumerating without exclusions");
            return IgnoreRules::empty();
        }
    };
    match access.read_file(&file) {
        Ok(bytes) => {
            let rules = IgnoreRules::parse(&String::from_utf8_lossy(&bytes));
            debug!(rules = rules.len(), "loaded ignore rules");
            rules
        }
        Err(err) => {
            warn!(%err, "could not read ignore file; enumerating without exclusions");
            IgnoreRules::empty()
        }
    }
}
