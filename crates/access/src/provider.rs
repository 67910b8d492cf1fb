use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::DirectoryBackend;
use crate::error::{AccessError, RenameStage};
use crate::handle::{EntryKind, Handle, PermissionMode, PermissionState};
use crate::lock::{RootGuard, RootLock};
use crate::store::RootHandleStore;

/// Bound on recursive walks (parent search, recursive copy). Guards against
/// link cycles exposed by the backend.  
/// 遞迴走訪的深度上限。
pub const MAX_TRAVERSAL_DEPTH: usize = 64;

/// One immediate child of a directory, annotated with its composed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub handle: Handle,
    pub parent: Handle,
    /// `/`-joined names from the root to this entry.
    pub path: String,
}

/// Directory access provider: the single owner of the granted root and the
/// only component that mutates the filesystem.  
/// 目錄存取提供者：唯一持有授權根目錄並修改檔案系統的元件。
pub struct DirectoryAccess {
    backend: Arc<dyn DirectoryBackend>,
    store: Box<dyn RootHandleStore>,
    lock: RootLock,
    root: Option<Handle>,
}

impl fmt::Debug for DirectoryAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryAccess")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl DirectoryAccess {
    pub fn new(backend: Arc<dyn DirectoryBackend>, store: Box<dyn RootHandleStore>) -> Self {
        Self {
            backend,
            store,
            lock: RootLock::new(),
            root: None,
        }
    }

    pub fn backend(&self) -> &Arc<dyn DirectoryBackend> {
        &self.backend
    }

    /// Currently granted root directory, if any.
    pub fn root(&self) -> Option<&Handle> {
        self.root.as_ref()
    }

    /// Prompts for a new grant. Returns `Ok(None)` when the prompt is
    /// dismissed; cancellation is not an error.
    pub fn open_directory(&mut self) -> Result<Option<Handle>, AccessError> {
        let Some(handle) = self.backend.pick_directory()? else {
            debug!("directory picker dismissed");
            return Ok(None);
        };
        self.grant_root(handle.clone())?;
        Ok(Some(handle))
    }

    /// Adopts `handle` as the root, checking permission and persisting it for
    /// the next session.
    pub fn grant_root(&mut self, handle: Handle) -> Result<(), AccessError> {
        if !handle.is_directory() {
            return Err(AccessError::NotADirectory(handle.name().to_string()));
        }
        self.ensure_permission(&handle)?;
        let persisted = self
            .backend
            .export(&handle)
            .and_then(|persisted| self.store.save(&persisted));
        if let Err(err) = persisted {
            warn!(%err, "could not persist root handle; the folder will not be restored");
        }
        info!(root = handle.name(), "directory access granted");
        self.root = Some(handle);
        Ok(())
    }

    /// Re-acquires the persisted root. Any failure (entry gone, permission
    /// denied, unreadable store) yields `None` and leaves no folder open.
    pub fn load_last_opened_folder(&mut self) -> Option<Handle> {
        let persisted = match self.store.load() {
            Ok(Some(persisted)) => persisted,
            Ok(None) => return None,
            Err(err) => {
                warn!(%err, "could not read persisted root handle");
                return None;
            }
        };
        let handle = match self.backend.revive(&persisted) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(folder = %persisted.name, %err, "persisted folder is no longer available");
                if err.is_not_found() {
                    if let Err(clear_err) = self.store.clear() {
                        debug!(%clear_err, "could not clear stale root handle");
                    }
                }
                return None;
            }
        };
        if let Err(err) = self.ensure_permission(&handle) {
            warn!(folder = handle.name(), %err, "permission for persisted folder not granted");
            return None;
        }
        info!(root = handle.name(), "restored directory access");
        self.root = Some(handle.clone());
        Some(handle)
    }

    /// Drops the current root and forgets the persisted handle.
    pub fn close_directory(&mut self) {
        if let Some(root) = self.root.take() {
            info!(root = root.name(), "directory closed");
        }
        if let Err(err) = self.store.clear() {
            warn!(%err, "could not clear persisted root handle");
        }
    }

    fn ensure_permission(&self, handle: &Handle) -> Result<(), AccessError> {
        let state = match self
            .backend
            .query_permission(handle, PermissionMode::ReadWrite)?
        {
            PermissionState::Granted => return Ok(()),
            PermissionState::Denied | PermissionState::Prompt => self
                .backend
                .request_permission(handle, PermissionMode::ReadWrite)?,
        };
        if state == PermissionState::Granted {
            Ok(())
        } else {
            Err(AccessError::PermissionDenied(handle.name().to_string()))
        }
    }

    fn guard(&self, target: &Handle) -> RootGuard<'_> {
        let key = self.root.as_ref().unwrap_or(target).token().as_str();
        self.lock.acquire(key)
    }

    /// Immediate children of `dir`, directories first, then by name.
    pub fn read_directory_level(
        &self,
        dir: &Handle,
        parent_path: &str,
    ) -> Result<Vec<DirEntry>, AccessError> {
        let mut entries: Vec<DirEntry> = self
            .backend
            .entries(dir)?
            .into_iter()
            .map(|handle| DirEntry {
                name: handle.name().to_string(),
                kind: handle.kind(),
                path: join_path(parent_path, handle.name()),
                parent: dir.clone(),
                handle,
            })
            .collect();
        sort_entries(&mut entries);
        debug!(dir = dir.name(), count = entries.len(), "enumerated directory");
        Ok(entries)
    }

    /// Non-creating lookup of a named child. `name` must denote a single
    /// entry inside `dir`.
    pub fn lookup(&self, dir: &Handle, name: &str, kind: EntryKind) -> Result<Handle, AccessError> {
        validate_segment(name)?;
        self.backend.child(dir, name, kind, false)
    }

    /// Walks `path` from `root` by name. The empty path resolves to `root`;
    /// `.`, `..` and empty segments are rejected so the walk never leaves
    /// the root.  
    /// 依名稱從根目錄逐層解析相對路徑，拒絕跳出根目錄的片段。
    pub fn resolve_path(
        &self,
        root: &Handle,
        path: &str,
        kind: EntryKind,
    ) -> Result<Handle, AccessError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return if kind == root.kind() {
                Ok(root.clone())
            } else {
                Err(AccessError::NotAFile(root.name().to_string()))
            };
        }
        let segments: Vec<&str> = trimmed.split('/').collect();
        for segment in &segments {
            validate_segment(segment).map_err(|_| AccessError::InvalidName(path.to_string()))?;
        }
        let Some((last, dirs)) = segments.split_last() else {
            return Err(AccessError::InvalidName(path.to_string()));
        };
        let mut current = root.clone();
        for segment in dirs {
            current = self.lookup(&current, segment, EntryKind::Directory)?;
        }
        self.lookup(&current, last, kind)
    }

    pub fn create_file(&self, parent: &Handle, name: &str) -> Result<Handle, AccessError> {
        self.create(parent, name, EntryKind::File)
    }

    pub fn create_directory(&self, parent: &Handle, name: &str) -> Result<Handle, AccessError> {
        self.create(parent, name, EntryKind::Directory)
    }

    fn create(&self, parent: &Handle, name: &str, kind: EntryKind) -> Result<Handle, AccessError> {
        validate_name(name)?;
        let _guard = self.guard(parent);
        let handle = self.backend.child(parent, name, kind, true)?;
        debug!(parent = parent.name(), name, %kind, "created entry");
        Ok(handle)
    }

    /// Removes `handle` (recursively) from `parent`. Fails if the handle no
    /// longer resolves there.
    pub fn delete_entry(&self, handle: &Handle, parent: &Handle) -> Result<(), AccessError> {
        let _guard = self.guard(parent);
        let current = self.lookup(parent, handle.name(), handle.kind())?;
        if !self.same_entry(&current, handle) {
            return Err(AccessError::Stale(handle.name().to_string()));
        }
        self.backend.remove(parent, handle.name(), true)?;
        info!(name = handle.name(), "deleted entry");
        Ok(())
    }

    /// Renames `handle` within `parent`.
    ///
    /// Uses the backend's atomic rename when it has one. Otherwise copies the
    /// entry to `new_name` and removes the original; that path is not atomic
    /// and a failure surfaces as [`AccessError::NonAtomicRename`], possibly
    /// leaving both entries behind.
    pub fn rename_entry(
        &self,
        handle: &Handle,
        new_name: &str,
        parent: &Handle,
    ) -> Result<Handle, AccessError> {
        validate_name(new_name)?;
        if new_name == handle.name() {
            return Ok(handle.clone());
        }
        let _guard = self.guard(parent);
        match self.backend.child(parent, new_name, handle.kind(), false) {
            Ok(_) | Err(AccessError::KindConflict { .. }) => {
                return Err(AccessError::AlreadyExists(new_name.to_string()));
            }
            Err(AccessError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
        let current = self.lookup(parent, handle.name(), handle.kind())?;
        if !self.same_entry(&current, handle) {
            return Err(AccessError::Stale(handle.name().to_string()));
        }

        if let Some(renamed) = self.backend.rename_atomic(parent, handle, new_name)? {
            info!(from = handle.name(), to = new_name, "renamed entry");
            return Ok(renamed);
        }

        warn!(
            from = handle.name(),
            to = new_name,
            "backend has no atomic rename; copying then deleting"
        );
        let failure = |stage, source| AccessError::NonAtomicRename {
            from: handle.name().to_string(),
            to: new_name.to_string(),
            stage,
            source: Box::new(source),
        };
        let target = self
            .backend
            .child(parent, new_name, handle.kind(), true)
            .and_then(|target| self.copy_into(handle, &target, 0).map(|()| target))
            .map_err(|source| failure(RenameStage::Copy, source))?;
        self.backend
            .remove(parent, handle.name(), true)
            .map_err(|source| failure(RenameStage::RemoveOriginal, source))?;
        info!(from = handle.name(), to = new_name, "renamed entry by copy");
        Ok(target)
    }

    fn copy_into(&self, source: &Handle, target: &Handle, depth: usize) -> Result<(), AccessError> {
        if depth > MAX_TRAVERSAL_DEPTH {
            return Err(AccessError::TooDeep(source.name().to_string()));
        }
        match source.kind() {
            EntryKind::File => {
                let data = self.backend.read(source)?;
                self.backend.write(target, &data)
            }
            EntryKind::Directory => {
                for child in self.backend.entries(source)? {
                    let created = self.backend.child(target, child.name(), child.kind(), true)?;
                    self.copy_into(&child, &created, depth + 1)?;
                }
                Ok(())
            }
        }
    }

    /// Finds the directory containing `target` by walking from `search_root`.
    /// Cost is proportional to the size of the searched tree.
    pub fn get_parent_handle(
        &self,
        target: &Handle,
        search_root: &Handle,
    ) -> Result<Handle, AccessError> {
        let mut pending = vec![(search_root.clone(), 0usize)];
        let mut truncated = false;
        while let Some((dir, depth)) = pending.pop() {
            for child in self.backend.entries(&dir)? {
                if self.same_entry(&child, target) {
                    return Ok(dir);
                }
                if child.is_directory() {
                    if depth + 1 < MAX_TRAVERSAL_DEPTH {
                        pending.push((child, depth + 1));
                    } else {
                        truncated = true;
                    }
                }
            }
        }
        if truncated {
            Err(AccessError::TooDeep(search_root.name().to_string()))
        } else {
            Err(AccessError::NotFound(target.name().to_string()))
        }
    }

    /// Identity check through the backend, falling back to name and kind.
    pub fn same_entry(&self, a: &Handle, b: &Handle) -> bool {
        self.backend
            .is_same_entry(a, b)
            .unwrap_or_else(|| a.kind() == b.kind() && a.name() == b.name())
    }

    pub fn read_file(&self, file: &Handle) -> Result<Vec<u8>, AccessError> {
        self.backend.read(file)
    }

    pub fn write_file(&self, file: &Handle, data: &[u8]) -> Result<(), AccessError> {
        let _guard = self.guard(file);
        self.backend.write(file, data)
    }
}

fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| {
        b.kind
            .is_directory()
            .cmp(&a.kind.is_directory())
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Joins a parent path and a child name with `/`; the root path is `""`.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Path of the directory containing `path` (`""` for top-level entries).
pub fn parent_path(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// Rejects names that cannot denote a single child entry.
/// 拒絕無法代表單一子項目的名稱。
pub fn validate_name(name: &str) -> Result<(), AccessError> {
    validate_segment(name)?;
    if name.trim() != name {
        return Err(AccessError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Looser check for names that already exist on disk: whitespace padding is
/// allowed, path syntax is not.
fn validate_segment(name: &str) -> Result<(), AccessError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(AccessError::InvalidName(name.to_string()));
    }
    Ok(())
}
