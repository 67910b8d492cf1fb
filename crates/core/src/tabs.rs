use thiserror::Error;
use tracing::{debug, info, warn};

use treepad_access::{AccessError, DirectoryAccess, EntryKind, Handle};

use crate::language::detect_language;
use crate::tab::{Edit, EditState, Tab, TabId};
use crate::text::{self, TextError};

#[derive(Debug, Error)]
pub enum TabError {
    #[error("no document is open")]
    NoActiveTab,
    #[error("no open tab with id '{0}'")]
    UnknownTab(String),
    #[error("invalid edit: {0}")]
    InvalidEdit(String),
    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: AccessError,
    },
    #[error("could not decode '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: TextError,
    },
    #[error("could not encode '{path}': {source}")]
    Encode {
        path: String,
        #[source]
        source: TextError,
    },
    #[error("could not save '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: AccessError,
    },
}

impl TabError {
    /// Underlying access failure, if any.
    pub fn access_error(&self) -> Option<&AccessError> {
        match self {
            TabError::Read { source, .. } | TabError::Write { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_write_failure(&self) -> bool {
        matches!(self, TabError::Write { .. } | TabError::Encode { .. })
    }
}

/// Result of [`TabManager::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOutcome {
    pub id: TabId,
    /// `false` when an existing tab was activated instead.
    pub created: bool,
}

/// Result of [`TabManager::close`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub closed: TabId,
    /// The closed tab had unsaved edits.
    pub discarded_changes: bool,
    /// Tab active after the close; `None` once the last tab is gone.
    pub active: Option<TabId>,
}

/// Live editing surface. Holds the visible buffer of the active tab until
/// it is flushed back into the tab; `None` when unbound.
#[derive(Debug, Default)]
struct EditingSurface {
    state: Option<EditState>,
}

/// Owns open documents and the single editing surface they share.
///
/// At most one tab exists per path. A tab is dirty iff a buffer edit landed
/// after its last successful save.
#[derive(Debug, Default)]
pub struct TabManager {
    tabs: Vec<Tab>,
    active: Option<usize>,
    surface: EditingSurface,
}

impl TabManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn tab(&self, id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| &tab.id == id)
    }

    pub fn active(&self) -> Option<&Tab> {
        self.active.and_then(|idx| self.tabs.get(idx))
    }

    pub fn active_id(&self) -> Option<&TabId> {
        self.active().map(Tab::id)
    }

    /// Visible state of the active tab, including edits not yet flushed.
    pub fn active_state(&self) -> Option<&EditState> {
        self.surface.state.as_ref()
    }

    fn position(&self, id: &TabId) -> Result<usize, TabError> {
        self.tabs
            .iter()
            .position(|tab| &tab.id == id)
            .ok_or_else(|| TabError::UnknownTab(id.to_string()))
    }

    /// Captures the surface into the active tab.
    fn flush(&mut self) {
        if let (Some(idx), Some(state)) = (self.active, self.surface.state.as_ref()) {
            if let Some(tab) = self.tabs.get_mut(idx) {
                tab.state.clone_from(state);
            }
        }
    }

    fn bind(&mut self, idx: Option<usize>) {
        self.active = idx;
        self.surface.state = idx
            .and_then(|idx| self.tabs.get(idx))
            .map(|tab| tab.state.clone());
    }

    /// Opens `handle` at `path`, or activates the tab already showing it.
    pub fn open(
        &mut self,
        access: &DirectoryAccess,
        handle: Handle,
        path: &str,
    ) -> Result<OpenOutcome, TabError> {
        let id = TabId::for_path(path);
        if self.tab(&id).is_some() {
            debug!(%id, "path already open; activating existing tab");
            self.activate(&id)?;
            return Ok(OpenOutcome { id, created: false });
        }
        if handle.kind() != EntryKind::File {
            return Err(TabError::Read {
                path: path.to_string(),
                source: AccessError::NotAFile(handle.name().to_string()),
            });
        }

        let bytes = access.read_file(&handle).map_err(|source| TabError::Read {
            path: path.to_string(),
            source,
        })?;
        let decoded = text::decode(&bytes).map_err(|source| TabError::Decode {
            path: path.to_string(),
            source,
        })?;
        let tab = Tab {
            id: id.clone(),
            name: handle.name().to_string(),
            path: path.to_string(),
            language: detect_language(handle.name()),
            encoding: decoded.encoding,
            state: EditState::new(decoded.text),
            dirty: false,
            handle,
        };
        info!(%id, language = tab.language, encoding = tab.encoding.name(), "opened document");
        self.flush();
        self.tabs.push(tab);
        self.bind(Some(self.tabs.len() - 1));
        Ok(OpenOutcome { id, created: true })
    }

    /// Switches the surface to `id`, flushing the current tab first.
    pub fn activate(&mut self, id: &TabId) -> Result<(), TabError> {
        let idx = self.position(id)?;
        if self.active == Some(idx) {
            return Ok(());
        }
        self.flush();
        self.bind(Some(idx));
        debug!(%id, "activated tab");
        Ok(())
    }

    /// Applies an edit to the active tab's live buffer.
    pub fn edit(&mut self, edit: Edit) -> Result<(), TabError> {
        let idx = self.active.ok_or(TabError::NoActiveTab)?;
        let state = self.surface.state.as_mut().ok_or(TabError::NoActiveTab)?;
        edit.apply(state).map_err(TabError::InvalidEdit)?;
        if edit.mutates_buffer() {
            if let Some(tab) = self.tabs.get_mut(idx) {
                tab.dirty = true;
            }
        }
        Ok(())
    }

    /// Closes `id`. The left neighbour (or the new first tab) becomes active
    /// when the closed tab was active.
    pub fn close(&mut self, id: &TabId) -> Result<CloseOutcome, TabError> {
        let idx = self.position(id)?;
        let was_active = self.active == Some(idx);
        if !was_active {
            self.flush();
        }
        let removed = self.tabs.remove(idx);
        if removed.dirty {
            warn!(id = %removed.id, "closed tab with unsaved changes");
        }

        let next = match self.active {
            _ if self.tabs.is_empty() => None,
            Some(active) if active == idx => Some(idx.saturating_sub(1)),
            Some(active) if active > idx => Some(active - 1),
            other => other,
        };
        if was_active || next.is_none() {
            self.bind(next);
        } else {
            self.active = next;
        }
        Ok(CloseOutcome {
            closed: removed.id,
            discarded_changes: removed.dirty,
            active: self.active_id().cloned(),
        })
    }

    /// Closes every tab.
    pub fn reset(&mut self) {
        self.tabs.clear();
        self.bind(None);
    }

    /// Writes the active tab to disk.
    pub fn save_active(&mut self, access: &DirectoryAccess) -> Result<TabId, TabError> {
        let id = self.active_id().cloned().ok_or(TabError::NoActiveTab)?;
        self.save(access, &id)?;
        Ok(id)
    }

    /// Writes one tab verbatim in its original encoding. `dirty` clears only
    /// after the backend confirms the write.
    pub fn save(&mut self, access: &DirectoryAccess, id: &TabId) -> Result<(), TabError> {
        self.flush();
        let idx = self.position(id)?;
        let tab = &mut self.tabs[idx];
        let bytes = text::encode(&tab.state.text, tab.encoding).map_err(|source| {
            TabError::Encode {
                path: tab.path.clone(),
                source,
            }
        })?;
        access
            .write_file(&tab.handle, &bytes)
            .map_err(|source| TabError::Write {
                path: tab.path.clone(),
                source,
            })?;
        tab.dirty = false;
        info!(%id, bytes = bytes.len(), "saved document");
        Ok(())
    }

    /// Saves every dirty tab, returning the ones that failed.
    pub fn save_all(&mut self, access: &DirectoryAccess) -> Vec<(TabId, TabError)> {
        self.flush();
        let dirty: Vec<TabId> = self
            .tabs
            .iter()
            .filter(|tab| tab.dirty)
            .map(|tab| tab.id.clone())
            .collect();
        dirty
            .into_iter()
            .filter_map(|id| self.save(access, &id).err().map(|err| (id, err)))
            .collect()
    }

    /// Re-binds tabs at or below `old` after a rename to `new`. Handles are
    /// re-resolved from `root`; a tab whose file cannot be resolved keeps its
    /// old handle and will fail on save.
    pub fn rename_path(
        &mut self,
        access: &DirectoryAccess,
        root: &Handle,
        old: &str,
        new: &str,
    ) -> usize {
        let mut renamed = 0;
        for tab in &mut self.tabs {
            let Some(rest) = below(&tab.path, old) else {
                continue;
            };
            let path = format!("{new}{rest}");
            match access.resolve_path(root, &path, EntryKind::File) {
                Ok(handle) => {
                    debug!(from = %tab.path, to = %path, "re-bound tab after rename");
                    tab.rebind(path, handle);
                    renamed += 1;
                }
                Err(err) => {
                    warn!(path = %path, %err, "could not re-resolve renamed document");
                }
            }
        }
        renamed
    }

    /// Closes tabs at or below `prefix`, returning their ids.
    pub fn forget_path(&mut self, prefix: &str) -> Vec<TabId> {
        let doomed: Vec<TabId> = self
            .tabs
            .iter()
            .filter(|tab| below(&tab.path, prefix).is_some())
            .map(|tab| tab.id.clone())
            .collect();
        for id in &doomed {
            if let Err(err) = self.close(id) {
                debug!(%id, %err, "tab vanished while forgetting path");
            }
        }
        doomed
    }
}

/// Remainder of `path` if it is `prefix` or lies below it.
fn below<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}
