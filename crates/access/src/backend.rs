use crate::error::AccessError;
use crate::handle::{EntryKind, Handle, PermissionMode, PermissionState, PersistedHandle};

/// Decides whether two handles refer to the same filesystem entry.
///
/// Returns `None` when the backend cannot tell; callers then fall back to
/// comparing name and kind.
pub trait IdentityResolver {
    fn is_same_entry(&self, a: &Handle, b: &Handle) -> Option<bool>;
}

/// Permission-scoped filesystem primitives over opaque handles.
///
/// Implementations must fail explicitly on stale handles rather than act on
/// whatever entry happens to live at the old location.
///
/// 以不透明控制代碼操作、受權限限制的檔案系統基本操作。
pub trait DirectoryBackend: IdentityResolver + Send + Sync {
    /// Prompts for a new directory grant. `Ok(None)` means the user cancelled.
    fn pick_directory(&self) -> Result<Option<Handle>, AccessError>;

    fn query_permission(
        &self,
        handle: &Handle,
        mode: PermissionMode,
    ) -> Result<PermissionState, AccessError>;

    fn request_permission(
        &self,
        handle: &Handle,
        mode: PermissionMode,
    ) -> Result<PermissionState, AccessError>;

    /// Immediate children of `dir`, in no particular order.
    fn entries(&self, dir: &Handle) -> Result<Vec<Handle>, AccessError>;

    /// Looks up (and with `create`, creates if absent) the named child.
    fn child(
        &self,
        dir: &Handle,
        name: &str,
        kind: EntryKind,
        create: bool,
    ) -> Result<Handle, AccessError>;

    /// Removes the named child of `dir`; directories require `recursive`
    /// unless empty.
    fn remove(&self, dir: &Handle, name: &str, recursive: bool) -> Result<(), AccessError>;

    fn read(&self, file: &Handle) -> Result<Vec<u8>, AccessError>;

    /// Replaces the file contents. A failed write leaves the previous contents.
    fn write(&self, file: &Handle, data: &[u8]) -> Result<(), AccessError>;

    /// Atomic rename when the platform has one; `Ok(None)` when it does not.
    fn rename_atomic(
        &self,
        _parent: &Handle,
        _entry: &Handle,
        _new_name: &str,
    ) -> Result<Option<Handle>, AccessError> {
        Ok(None)
    }

    fn export(&self, handle: &Handle) -> Result<PersistedHandle, AccessError>;

    /// Rebuilds a handle from its persisted form; fails with `Stale` when the
    /// entry is gone.
    fn revive(&self, persisted: &PersistedHandle) -> Result<Handle, AccessError>;
}
