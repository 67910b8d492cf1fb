//! In-memory backend with permission toggles, call counters and fault
//! injection. Used by tests and demos; mirrors a browser grant in that it has
//! no atomic rename unless asked for one.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::{DirectoryBackend, IdentityResolver};
use crate::error::AccessError;
use crate::handle::{
    EntryKind, Handle, HandleToken, PermissionMode, PermissionState, PersistedHandle,
};

const TOKEN_PREFIX: &str = "mem:";

#[derive(Debug)]
struct Node {
    name: String,
    kind: EntryKind,
    parent: Option<u64>,
    children: BTreeMap<String, u64>,
    data: Vec<u8>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounters {
    pub entries: usize,
    pub reads: usize,
    pub writes: usize,
    pub removes: usize,
}

#[derive(Debug, Default)]
struct Faults {
    fail_writes: bool,
    fail_removes: usize,
    fail_write_after: Option<usize>,
}

#[derive(Debug)]
struct MemoryState {
    nodes: HashMap<u64, Node>,
    next_id: u64,
    root: u64,
    permission: PermissionState,
    grant_on_request: bool,
    cancel_pick: bool,
    atomic_rename: bool,
    identity_support: bool,
    counters: CallCounters,
    faults: Faults,
}

/// Shared, thread-safe in-memory filesystem.  
/// 可跨執行緒共用的記憶體檔案系統，供測試注入錯誤使用。
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Creates a backend with an empty root directory named `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            1,
            Node {
                name: root_name.into(),
                kind: EntryKind::Directory,
                parent: None,
                children: BTreeMap::new(),
                data: Vec::new(),
            },
        );
        Self {
            state: Mutex::new(MemoryState {
                nodes,
                next_id: 2,
                root: 1,
                permission: PermissionState::Granted,
                grant_on_request: true,
                cancel_pick: false,
                atomic_rename: false,
                identity_support: true,
                counters: CallCounters::default(),
                faults: Faults::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle for the root directory, as a picker would return it.
    pub fn root(&self) -> Handle {
        let state = self.lock();
        state.handle(state.root)
    }

    /// Adds a file at `path` (intermediate directories are created).
    pub fn add_file(&self, path: &str, contents: impl AsRef<[u8]>) -> Handle {
        let mut state = self.lock();
        let (parent, name) = state.ensure_parent(path);
        let id = state.insert(parent, name, EntryKind::File);
        if let Some(node) = state.nodes.get_mut(&id) {
            node.data = contents.as_ref().to_vec();
        }
        state.handle(id)
    }

    /// Adds a directory at `path` (intermediate directories are created).
    pub fn add_dir(&self, path: &str) -> Handle {
        let mut state = self.lock();
        let (parent, name) = state.ensure_parent(path);
        let id = state.insert(parent, name, EntryKind::Directory);
        state.handle(id)
    }

    /// Removes the entry at `path` behind the editor's back.
    pub fn remove_path(&self, path: &str) -> bool {
        let mut state = self.lock();
        match state.lookup(path) {
            Some(id) if id != state.root => {
                state.detach(id);
                true
            }
            _ => false,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lock().lookup(path).is_some()
    }

    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        let id = state.lookup(path)?;
        let node = state.nodes.get(&id)?;
        (node.kind == EntryKind::File).then(|| node.data.clone())
    }

    /// Makes the next `pick_directory` behave like a dismissed prompt.
    pub fn cancel_picks(&self, cancel: bool) {
        self.lock().cancel_pick = cancel;
    }

    /// Revokes the grant; later requests succeed only if `grant_on_request`.
    pub fn revoke_permission(&self, grant_on_request: bool) {
        let mut state = self.lock();
        state.permission = PermissionState::Prompt;
        state.grant_on_request = grant_on_request;
    }

    pub fn grant_permission(&self) {
        self.lock().permission = PermissionState::Granted;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().faults.fail_writes = fail;
    }

    /// Lets `count` more writes succeed, then fails every following write.
    pub fn fail_writes_after(&self, count: usize) {
        self.lock().faults.fail_write_after = Some(count);
    }

    /// Fails the next `count` remove calls.
    pub fn fail_next_removes(&self, count: usize) {
        self.lock().faults.fail_removes = count;
    }

    pub fn set_atomic_rename(&self, enabled: bool) {
        self.lock().atomic_rename = enabled;
    }

    /// When disabled, identity checks report "unknown" so callers exercise
    /// their name+kind fallback.
    pub fn set_identity_support(&self, enabled: bool) {
        self.lock().identity_support = enabled;
    }

    pub fn counters(&self) -> CallCounters {
        self.lock().counters
    }

    pub fn reset_counters(&self) {
        self.lock().counters = CallCounters::default();
    }
}

impl MemoryState {
    fn handle(&self, id: u64) -> Handle {
        let node = &self.nodes[&id];
        Handle::new(
            node.kind,
            node.name.clone(),
            HandleToken::new(format!("{TOKEN_PREFIX}{id}")),
        )
    }

    fn id_of(&self, handle: &Handle) -> Result<u64, AccessError> {
        let stale = || AccessError::Stale(handle.name().to_string());
        let id: u64 = handle
            .token()
            .as_str()
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(stale)?;
        match self.nodes.get(&id) {
            Some(node) if node.kind == handle.kind() => Ok(id),
            _ => Err(stale()),
        }
    }

    fn check_permission(&self, handle: &Handle) -> Result<(), AccessError> {
        if self.permission == PermissionState::Granted {
            Ok(())
        } else {
            Err(AccessError::PermissionDenied(handle.name().to_string()))
        }
    }

    fn directory(&self, handle: &Handle) -> Result<u64, AccessError> {
        self.check_permission(handle)?;
        if !handle.is_directory() {
            return Err(AccessError::NotADirectory(handle.name().to_string()));
        }
        self.id_of(handle)
    }

    fn file(&self, handle: &Handle) -> Result<u64, AccessError> {
        self.check_permission(handle)?;
        if handle.is_directory() {
            return Err(AccessError::NotAFile(handle.name().to_string()));
        }
        self.id_of(handle)
    }

    fn insert(&mut self, parent: u64, name: &str, kind: EntryKind) -> u64 {
        if let Some(existing) = self.nodes[&parent].children.get(name) {
            return *existing;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                kind,
                parent: Some(parent),
                children: BTreeMap::new(),
                data: Vec::new(),
            },
        );
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.insert(name.to_string(), id);
        }
        id
    }

    fn ensure_parent<'p>(&mut self, path: &'p str) -> (u64, &'p str) {
        let trimmed = path.trim_matches('/');
        let (dirs, name) = match trimmed.rsplit_once('/') {
            Some((dirs, name)) => (Some(dirs), name),
            None => (None, trimmed),
        };
        let mut current = self.root;
        if let Some(dirs) = dirs {
            for segment in dirs.split('/').filter(|segment| !segment.is_empty()) {
                current = self.insert(current, segment, EntryKind::Directory);
            }
        }
        (current, name)
    }

    fn lookup(&self, path: &str) -> Option<u64> {
        let mut current = self.root;
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            current = *self.nodes.get(&current)?.children.get(segment)?;
        }
        Some(current)
    }

    fn detach(&mut self, id: u64) {
        if let Some(parent) = self.nodes.get(&id).and_then(|node| node.parent) {
            let name = self.nodes[&id].name.clone();
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.remove(&name);
            }
        }
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                pending.extend(node.children.values().copied());
            }
        }
    }
}

impl IdentityResolver for MemoryBackend {
    fn is_same_entry(&self, a: &Handle, b: &Handle) -> Option<bool> {
        let state = self.lock();
        if !state.identity_support {
            return None;
        }
        Some(a.kind() == b.kind() && a.token() == b.token())
    }
}

impl DirectoryBackend for MemoryBackend {
    fn pick_directory(&self) -> Result<Option<Handle>, AccessError> {
        let mut state = self.lock();
        if state.cancel_pick {
            return Ok(None);
        }
        state.permission = PermissionState::Granted;
        Ok(Some(state.handle(state.root)))
    }

    fn query_permission(
        &self,
        handle: &Handle,
        _mode: PermissionMode,
    ) -> Result<PermissionState, AccessError> {
        let state = self.lock();
        state.id_of(handle)?;
        Ok(state.permission)
    }

    fn request_permission(
        &self,
        handle: &Handle,
        _mode: PermissionMode,
    ) -> Result<PermissionState, AccessError> {
        let mut state = self.lock();
        state.id_of(handle)?;
        if state.permission != PermissionState::Granted {
            state.permission = if state.grant_on_request {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
        }
        Ok(state.permission)
    }

    fn entries(&self, dir: &Handle) -> Result<Vec<Handle>, AccessError> {
        let mut state = self.lock();
        let id = state.directory(dir)?;
        state.counters.entries += 1;
        let children: Vec<u64> = state.nodes[&id].children.values().copied().collect();
        Ok(children.into_iter().map(|child| state.handle(child)).collect())
    }

    fn child(
        &self,
        dir: &Handle,
        name: &str,
        kind: EntryKind,
        create: bool,
    ) -> Result<Handle, AccessError> {
        let mut state = self.lock();
        let id = state.directory(dir)?;
        if let Some(existing) = state.nodes[&id].children.get(name).copied() {
            let existing_kind = state.nodes[&existing].kind;
            if existing_kind != kind {
                return Err(AccessError::KindConflict {
                    name: name.to_string(),
                    existing: existing_kind,
                });
            }
            return Ok(state.handle(existing));
        }
        if !create {
            return Err(AccessError::NotFound(name.to_string()));
        }
        let created = state.insert(id, name, kind);
        Ok(state.handle(created))
    }

    fn remove(&self, dir: &Handle, name: &str, recursive: bool) -> Result<(), AccessError> {
        let mut state = self.lock();
        let id = state.directory(dir)?;
        state.counters.removes += 1;
        if state.faults.fail_removes > 0 {
            state.faults.fail_removes -= 1;
            return Err(AccessError::Io {
                name: name.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected remove failure"),
            });
        }
        let target = state.nodes[&id]
            .children
            .get(name)
            .copied()
            .ok_or_else(|| AccessError::NotFound(name.to_string()))?;
        if !recursive && !state.nodes[&target].children.is_empty() {
            return Err(AccessError::Io {
                name: name.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "directory not empty"),
            });
        }
        state.detach(target);
        Ok(())
    }

    fn read(&self, file: &Handle) -> Result<Vec<u8>, AccessError> {
        let mut state = self.lock();
        let id = state.file(file)?;
        state.counters.reads += 1;
        Ok(state.nodes[&id].data.clone())
    }

    fn write(&self, file: &Handle, data: &[u8]) -> Result<(), AccessError> {
        let mut state = self.lock();
        let id = state.file(file)?;
        state.counters.writes += 1;
        let budget_exhausted = match state.faults.fail_write_after {
            Some(0) => true,
            Some(remaining) => {
                state.faults.fail_write_after = Some(remaining - 1);
                false
            }
            None => false,
        };
        if state.faults.fail_writes || budget_exhausted {
            return Err(AccessError::WriteFailed {
                name: file.name().to_string(),
                reason: "injected write failure".to_string(),
            });
        }
        if let Some(node) = state.nodes.get_mut(&id) {
            node.data = data.to_vec();
        }
        Ok(())
    }

    fn rename_atomic(
        &self,
        parent: &Handle,
        entry: &Handle,
        new_name: &str,
    ) -> Result<Option<Handle>, AccessError> {
        let mut state = self.lock();
        if !state.atomic_rename {
            return Ok(None);
        }
        let parent_id = state.directory(parent)?;
        let entry_id = state.id_of(entry)?;
        if state.nodes[&parent_id].children.contains_key(new_name) {
            return Err(AccessError::AlreadyExists(new_name.to_string()));
        }
        let old_name = state.nodes[&entry_id].name.clone();
        if let Some(parent_node) = state.nodes.get_mut(&parent_id) {
            parent_node.children.remove(&old_name);
            parent_node.children.insert(new_name.to_string(), entry_id);
        }
        if let Some(node) = state.nodes.get_mut(&entry_id) {
            node.name = new_name.to_string();
        }
        Ok(Some(state.handle(entry_id)))
    }

    fn export(&self, handle: &Handle) -> Result<PersistedHandle, AccessError> {
        Ok(PersistedHandle {
            name: handle.name().to_string(),
            kind: handle.kind(),
            locator: handle.token().as_str().to_string(),
        })
    }

    fn revive(&self, persisted: &PersistedHandle) -> Result<Handle, AccessError> {
        let state = self.lock();
        let candidate = Handle::new(
            persisted.kind,
            persisted.name.clone(),
            HandleToken::new(&persisted.locator),
        );
        let id = state.id_of(&candidate)?;
        Ok(state.handle(id))
    }
}
