use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Kind of filesystem entry a handle grants access to.  
/// 控制代碼所指向的項目類型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn is_directory(self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-minted locator. Callers must treat it as opaque: paths are composed
/// from entry names during traversal, never parsed out of a token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HandleToken(Arc<str>);

impl HandleToken {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HandleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleToken({})", self.0)
    }
}

/// Opaque, permission-scoped reference to one file or directory.
///
/// A handle knows its own name and kind but not its location; a handle whose
/// entry was deleted or whose permission was revoked is *stale* and every
/// backend operation against it fails explicitly.
///
/// 指向單一檔案或資料夾、受權限範圍限制的不透明參照。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    kind: EntryKind,
    name: String,
    token: HandleToken,
}

impl Handle {
    pub fn new(kind: EntryKind, name: impl Into<String>, token: HandleToken) -> Self {
        Self {
            kind,
            name: name.into(),
            token,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &HandleToken {
        &self.token
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    pub fn is_file(&self) -> bool {
        !self.kind.is_directory()
    }
}

/// Serializable form of a handle, as produced by [`crate::DirectoryBackend::export`].  
/// 可序列化的控制代碼，用於跨工作階段保存。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedHandle {
    pub name: String,
    pub kind: EntryKind,
    pub locator: String,
}

/// Access level requested from the permission layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    Read,
    ReadWrite,
}

/// Result of a permission query or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not decided yet; a request may prompt the user.
    Prompt,
}
