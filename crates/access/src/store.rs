use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::AccessError;
use crate::handle::PersistedHandle;
use crate::util::write_json_atomic;

/// Durable slot for the last granted root handle. Kept apart from the
/// key-value settings because handles need backend cooperation to persist.  
/// 保存上次授權根目錄的儲存槽。
pub trait RootHandleStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedHandle>, AccessError>;
    fn save(&self, handle: &PersistedHandle) -> Result<(), AccessError>;
    fn clear(&self) -> Result<(), AccessError>;
}

/// Persists the root handle as JSON using atomic writes.  
/// 以原子寫入將根目錄控制代碼存為 JSON。
#[derive(Debug)]
pub struct JsonHandleStore {
    path: PathBuf,
}

impl JsonHandleStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RootHandleStore for JsonHandleStore {
    fn load(&self) -> Result<Option<PersistedHandle>, AccessError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(|err| AccessError::Store(err.to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AccessError::Store(err.to_string())),
        }
    }

    fn save(&self, handle: &PersistedHandle) -> Result<(), AccessError> {
        write_json_atomic(&self.path, handle).map_err(|err| AccessError::Store(err.to_string()))
    }

    fn clear(&self) -> Result<(), AccessError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AccessError::Store(err.to_string())),
        }
    }
}

/// Process-local store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryHandleStore {
    slot: Mutex<Option<PersistedHandle>>,
}

impl MemoryHandleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RootHandleStore for MemoryHandleStore {
    fn load(&self) -> Result<Option<PersistedHandle>, AccessError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, handle: &PersistedHandle) -> Result<(), AccessError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AccessError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
