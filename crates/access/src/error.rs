use std::fmt;
use std::io;

use thiserror::Error;

use crate::handle::EntryKind;

/// Step of a copy-then-delete rename that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameStage {
    /// Creating the new entry or copying content into it.
    Copy,
    /// Removing the original after a complete copy.
    RemoveOriginal,
}

impl fmt::Display for RenameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenameStage::Copy => f.write_str("copy"),
            RenameStage::RemoveOriginal => f.write_str("removal of the original"),
        }
    }
}

/// Errors raised by directory backends and the access provider.  
/// 目錄後端與存取提供者回報的錯誤。
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("permission denied for '{0}'")]
    PermissionDenied(String),
    #[error("'{0}' does not exist")]
    NotFound(String),
    #[error("handle for '{0}' is stale")]
    Stale(String),
    #[error("'{name}' already exists as a {existing}")]
    KindConflict { name: String, existing: EntryKind },
    #[error("'{0}' already exists")]
    AlreadyExists(String),
    #[error("'{0}' is not a valid entry name")]
    InvalidName(String),
    #[error("'{0}' is not a directory")]
    NotADirectory(String),
    #[error("'{0}' is not a file")]
    NotAFile(String),
    #[error("traversal below '{0}' exceeded the maximum depth")]
    TooDeep(String),
    /// A copy-then-delete rename stopped partway. Both the original and a
    /// (possibly partial) copy may exist; verify manually.
    #[error("rename of '{from}' to '{to}' did not complete ({stage} failed): {source}")]
    NonAtomicRename {
        from: String,
        to: String,
        stage: RenameStage,
        #[source]
        source: Box<AccessError>,
    },
    #[error("write to '{name}' failed: {reason}")]
    WriteFailed { name: String, reason: String },
    #[error("I/O error on '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("root handle store error: {0}")]
    Store(String),
}

impl AccessError {
    /// Maps an `io::Error` to the matching access error for the named entry.
    pub fn from_io(name: impl Into<String>, err: io::Error) -> Self {
        let name = name.into();
        match err.kind() {
            io::ErrorKind::NotFound => AccessError::NotFound(name),
            io::ErrorKind::PermissionDenied => AccessError::PermissionDenied(name),
            io::ErrorKind::AlreadyExists => AccessError::AlreadyExists(name),
            _ => AccessError::Io { name, source: err },
        }
    }

    /// `true` when the target no longer resolves at its expected location.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessError::NotFound(_) | AccessError::Stale(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, AccessError::PermissionDenied(_))
    }
}
