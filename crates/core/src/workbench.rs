use thiserror::Error;
use tracing::{debug, info, warn};

use treepad_access::{join_path, parent_path, AccessError, DirectoryAccess, EntryKind, Handle};
use treepad_project::{FileRecord, TreeCache, TreeError};
use treepad_settings::{Settings, SettingsError};

use crate::session::{self, RestoreOutcome};
use crate::tab::{Edit, TabId};
use crate::tabs::{CloseOutcome, TabError, TabManager};

/// User-facing failure classes. Drives how a front end reacts: prompt to
/// re-grant, stay silent, refresh, or keep the document marked dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    PermissionDenied,
    UserCancelled,
    EntryNotFound,
    NonAtomicRename,
    WriteFailure,
    Other,
}

#[derive(Debug, Error)]
pub enum WorkbenchError {
    #[error("no folder is open")]
    NoFolder,
    #[error("folder selection was cancelled")]
    Cancelled,
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Tab(#[from] TabError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl WorkbenchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            WorkbenchError::NoFolder | WorkbenchError::Settings(_) => ErrorClass::Other,
            WorkbenchError::Cancelled => ErrorClass::UserCancelled,
            WorkbenchError::Access(err) => classify_access(err),
            WorkbenchError::Tree(TreeError::UnknownPath(_)) => ErrorClass::EntryNotFound,
            WorkbenchError::Tree(TreeError::Access(err)) => classify_access(err),
            WorkbenchError::Tree(_) => ErrorClass::Other,
            WorkbenchError::Tab(err) => match err.access_error() {
                Some(source) if source.is_permission_denied() => ErrorClass::PermissionDenied,
                _ if err.is_write_failure() => ErrorClass::WriteFailure,
                Some(source) => classify_access(source),
                None => ErrorClass::Other,
            },
        }
    }
}

fn classify_access(err: &AccessError) -> ErrorClass {
    match err {
        AccessError::PermissionDenied(_) => ErrorClass::PermissionDenied,
        AccessError::NonAtomicRename { .. } => ErrorClass::NonAtomicRename,
        AccessError::WriteFailed { .. } => ErrorClass::WriteFailure,
        other if other.is_not_found() => ErrorClass::EntryNotFound,
        _ => ErrorClass::Other,
    }
}

/// Application controller owning the folder grant, tree cache, open tabs
/// and settings. Its methods are the command surface.
///
/// Instances are independent; construct one per window or test.
#[derive(Debug)]
pub struct Workbench {
    access: DirectoryAccess,
    tree: TreeCache,
    tabs: TabManager,
    settings: Settings,
}

impl Workbench {
    pub fn new(access: DirectoryAccess, settings: Settings) -> Self {
        Self {
            access,
            tree: TreeCache::new(),
            tabs: TabManager::new(),
            settings,
        }
    }

    pub fn access(&self) -> &DirectoryAccess {
        &self.access
    }

    pub fn tree(&self) -> &TreeCache {
        &self.tree
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn root(&self) -> Option<&Handle> {
        self.access.root()
    }

    fn require_root(&self) -> Result<Handle, WorkbenchError> {
        self.access.root().cloned().ok_or(WorkbenchError::NoFolder)
    }

    /// Resyncs the tree when a failure means the cache disagrees with disk.
    fn finish<T>(&mut self, result: Result<T, WorkbenchError>) -> Result<T, WorkbenchError> {
        if let Err(err) = &result {
            if err.class() == ErrorClass::EntryNotFound {
                debug!(%err, "entry missing; refreshing tree");
                self.refresh_after_missing_entry();
            }
        }
        result
    }

    fn refresh_after_missing_entry(&mut self) {
        if self.access.root().is_none() {
            return;
        }
        if let Err(err) = self.tree.refresh(&self.access) {
            warn!(%err, "tree refresh failed");
        }
    }

    fn resync(&mut self, dir_path: &str) {
        if let Err(err) = self.tree.resync(&self.access, dir_path) {
            warn!(dir = dir_path, %err, "could not reload directory after change");
        }
    }

    fn record_active(&mut self) {
        let Some(folder) = self.access.root().map(|root| root.name().to_string()) else {
            return;
        };
        match self.tabs.active().map(|tab| tab.path().to_string()) {
            Some(path) => {
                session::remember(&mut self.settings, &folder, Some(&path));
                session::push_recent(&mut self.settings, &path);
            }
            None => session::forget(&mut self.settings),
        }
    }

    /// Prompts for a folder. A dismissed prompt yields
    /// [`WorkbenchError::Cancelled`], which callers treat as a no-op.
    pub fn open_folder(&mut self) -> Result<Handle, WorkbenchError> {
        let Some(root) = self.access.open_directory()? else {
            debug!("folder selection cancelled");
            return Err(WorkbenchError::Cancelled);
        };
        self.adopt_root(&root)?;
        Ok(root)
    }

    /// Adopts an already granted directory handle as the folder.
    pub fn open_folder_handle(&mut self, root: Handle) -> Result<(), WorkbenchError> {
        self.access.grant_root(root.clone())?;
        self.adopt_root(&root)
    }

    fn adopt_root(&mut self, root: &Handle) -> Result<(), WorkbenchError> {
        self.tabs.reset();
        self.tree.load_root(&self.access)?;
        session::remember_folder(&mut self.settings, root);
        session::remember(&mut self.settings, root.name(), None);
        info!(folder = root.name(), "folder opened");
        Ok(())
    }

    /// Re-acquires the last folder and document. Never fails: anything that
    /// cannot be restored is skipped and logged.
    pub fn restore(&mut self) -> RestoreOutcome {
        let Some(root) = self.access.load_last_opened_folder() else {
            debug!("no folder to restore");
            return RestoreOutcome::default();
        };
        self.tabs.reset();
        let mut outcome = RestoreOutcome {
            folder: Some(root.name().to_string()),
            document: None,
        };
        if let Err(err) = self.tree.load_root(&self.access) {
            warn!(%err, "restored folder could not be listed");
            return outcome;
        }
        let Some(path) = session::pending_document(&self.settings, root.name()) else {
            return outcome;
        };
        match self.open_file(&path) {
            Ok(id) => {
                info!(%id, "restored last document");
                outcome.document = Some(id);
            }
            Err(err) => {
                warn!(%path, %err, "last document could not be restored");
                session::remember(&mut self.settings, root.name(), None);
            }
        }
        outcome
    }

    /// Drops the folder, its tabs, the tree and the persisted session.
    pub fn close_folder(&mut self) {
        self.tabs.reset();
        self.tree.clear();
        self.access.close_directory();
        session::forget(&mut self.settings);
        session::forget_folder(&mut self.settings);
    }

    /// Opens the file at `path`, or activates its existing tab.
    pub fn open_file(&mut self, path: &str) -> Result<TabId, WorkbenchError> {
        let result = self.open_file_inner(path);
        self.finish(result)
    }

    fn open_file_inner(&mut self, path: &str) -> Result<TabId, WorkbenchError> {
        let root = self.require_root()?;
        let handle = self.access.resolve_path(&root, path, EntryKind::File)?;
        let outcome = self.tabs.open(&self.access, handle, path)?;
        self.record_active();
        Ok(outcome.id)
    }

    pub fn activate_tab(&mut self, id: &TabId) -> Result<(), WorkbenchError> {
        self.tabs.activate(id)?;
        self.record_active();
        Ok(())
    }

    /// Closes a tab. Callers confirm beforehand when it is dirty; the outcome
    /// reports whether changes were discarded.
    pub fn close_tab(&mut self, id: &TabId) -> Result<CloseOutcome, WorkbenchError> {
        let outcome = self.tabs.close(id)?;
        self.record_active();
        Ok(outcome)
    }

    pub fn edit_active(&mut self, edit: Edit) -> Result<(), WorkbenchError> {
        Ok(self.tabs.edit(edit)?)
    }

    pub fn save_active(&mut self) -> Result<TabId, WorkbenchError> {
        let result = self.tabs.save_active(&self.access).map_err(WorkbenchError::from);
        self.finish(result)
    }

    /// Saves every dirty tab; failed tabs stay dirty and are returned.
    pub fn save_all(&mut self) -> Vec<(TabId, WorkbenchError)> {
        let failures: Vec<(TabId, WorkbenchError)> = self
            .tabs
            .save_all(&self.access)
            .into_iter()
            .map(|(id, err)| (id, err.into()))
            .collect();
        if failures
            .iter()
            .any(|(_, err)| err.class() == ErrorClass::EntryNotFound)
        {
            self.refresh_after_missing_entry();
        }
        failures
    }

    /// Creates an empty file under the directory at `parent`; returns its path.
    pub fn new_file(&mut self, parent: &str, name: &str) -> Result<String, WorkbenchError> {
        let result = self.create_entry(parent, name, EntryKind::File);
        self.finish(result)
    }

    /// Creates a directory under the directory at `parent`; returns its path.
    pub fn new_folder(&mut self, parent: &str, name: &str) -> Result<String, WorkbenchError> {
        let result = self.create_entry(parent, name, EntryKind::Directory);
        self.finish(result)
    }

    fn create_entry(
        &mut self,
        parent: &str,
        name: &str,
        kind: EntryKind,
    ) -> Result<String, WorkbenchError> {
        let root = self.require_root()?;
        let dir = self.access.resolve_path(&root, parent, EntryKind::Directory)?;
        match kind {
            EntryKind::File => self.access.create_file(&dir, name)?,
            EntryKind::Directory => self.access.create_directory(&dir, name)?,
        };
        self.resync(parent);
        Ok(join_path(parent, name))
    }

    /// Handle and parent handle for `path`, preferring the tree cache.
    fn resolve_entry(&self, root: &Handle, path: &str) -> Result<(Handle, Handle), WorkbenchError> {
        if path.trim_matches('/').is_empty() {
            return Err(AccessError::InvalidName(path.to_string()).into());
        }
        if let Some(entry) = self.tree.entry(path) {
            return Ok((entry.handle.clone(), entry.parent_handle.clone()));
        }
        let parent = self
            .access
            .resolve_path(root, parent_path(path), EntryKind::Directory)?;
        let name = path.rsplit('/').next().unwrap_or(path);
        let handle = match self.access.lookup(&parent, name, EntryKind::File) {
            Ok(handle) => handle,
            Err(AccessError::KindConflict { existing, .. }) => {
                self.access.lookup(&parent, name, existing)?
            }
            Err(err) => return Err(err.into()),
        };
        Ok((handle, parent))
    }

    /// Renames the entry at `path` in place; returns the new path.
    ///
    /// A [`ErrorClass::NonAtomicRename`] failure may leave both names on
    /// disk; the tree is refreshed so both are visible.
    pub fn rename_entry(&mut self, path: &str, new_name: &str) -> Result<String, WorkbenchError> {
        let result = self.rename_entry_inner(path, new_name);
        self.finish(result)
    }

    fn rename_entry_inner(&mut self, path: &str, new_name: &str) -> Result<String, WorkbenchError> {
        let root = self.require_root()?;
        let (handle, parent) = self.resolve_entry(&root, path)?;
        let dir_path = parent_path(path).to_string();
        let new_path = join_path(&dir_path, new_name);

        if let Err(err) = self.access.rename_entry(&handle, new_name, &parent) {
            if matches!(err, AccessError::NonAtomicRename { .. }) {
                warn!(%err, "rename left the folder in a partial state");
                self.resync(&dir_path);
            }
            return Err(err.into());
        }
        self.resync(&dir_path);
        self.tabs.rename_path(&self.access, &root, path, &new_path);
        session::rename_recent(&mut self.settings, path, &new_path);
        if self.tabs.active().is_some() {
            self.record_active();
        }
        info!(from = path, to = %new_path, "renamed entry");
        Ok(new_path)
    }

    /// Deletes the entry at `path` recursively and closes tabs below it.
    pub fn delete_entry(&mut self, path: &str) -> Result<Vec<TabId>, WorkbenchError> {
        let result = self.delete_entry_inner(path);
        self.finish(result)
    }

    fn delete_entry_inner(&mut self, path: &str) -> Result<Vec<TabId>, WorkbenchError> {
        let root = self.require_root()?;
        let (handle, parent) = self.resolve_entry(&root, path)?;
        self.access.delete_entry(&handle, &parent)?;
        self.resync(parent_path(path));
        let closed = self.tabs.forget_path(path);
        session::forget_recent(&mut self.settings, path);
        if !closed.is_empty() {
            self.record_active();
        }
        info!(path, closed = closed.len(), "deleted entry");
        Ok(closed)
    }

    pub fn refresh_tree(&mut self) -> Result<(), WorkbenchError> {
        self.require_root()?;
        Ok(self.tree.refresh(&self.access)?)
    }

    pub fn expand(&mut self, path: &str) -> Result<(), WorkbenchError> {
        let result = self
            .tree
            .expand(&self.access, path)
            .map(|_| ())
            .map_err(WorkbenchError::from);
        self.finish(result)
    }

    pub fn collapse(&mut self, path: &str) -> Result<(), WorkbenchError> {
        Ok(self.tree.collapse(path)?)
    }

    /// Every non-ignored file below the root, sorted by path.
    pub fn list_all_files(&mut self) -> Result<Vec<FileRecord>, WorkbenchError> {
        self.require_root()?;
        let result = self.tree.all_files(&self.access).map_err(WorkbenchError::from);
        self.finish(result)
    }
}
