//! Capability-scoped directory access for Treepad.
//! Wraps a permission-gated backend behind opaque handles and keeps track of
//! the granted root across restarts.

mod util;

pub mod backend;
pub mod error;
pub mod handle;
pub mod lock;
pub mod memory;
pub mod native;
pub mod provider;
pub mod store;

pub use backend::{DirectoryBackend, IdentityResolver};
pub use error::{AccessError, RenameStage};
pub use handle::{
    EntryKind, Handle, HandleToken, PermissionMode, PermissionState, PersistedHandle,
};
pub use lock::{RootGuard, RootLock};
pub use memory::MemoryBackend;
pub use native::NativeBackend;
pub use provider::{
    join_path, parent_path, validate_name, DirEntry, DirectoryAccess, MAX_TRAVERSAL_DEPTH,
};
pub use store::{JsonHandleStore, MemoryHandleStore, RootHandleStore};
pub use util::write_json_atomic;
