use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::backend::{DirectoryBackend, IdentityResolver};
use crate::error::AccessError;
use crate::handle::{
    EntryKind, Handle, HandleToken, PermissionMode, PermissionState, PersistedHandle,
};

type Picker = Box<dyn Fn() -> Option<PathBuf> + Send + Sync>;

/// `std::fs` backed implementation. Tokens are absolute paths; identity is
/// resolved through canonical paths and rename uses `fs::rename`.  
/// 以 `std::fs` 實作的本機後端。
pub struct NativeBackend {
    picker: Picker,
}

impl fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBackend").finish_non_exhaustive()
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend {
    /// Backend whose directory picker always reports a cancelled prompt.
    pub fn new() -> Self {
        Self {
            picker: Box::new(|| None),
        }
    }

    /// Backend whose "prompt" is answered by `picker`.
    pub fn with_picker<F>(picker: F) -> Self
    where
        F: Fn() -> Option<PathBuf> + Send + Sync + 'static,
    {
        Self {
            picker: Box::new(picker),
        }
    }

    /// Grants a directory handle for `path` directly.
    pub fn directory_handle(path: impl AsRef<Path>) -> Result<Handle, AccessError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let canonical = fs::canonicalize(path).map_err(|err| AccessError::from_io(&display, err))?;
        let metadata =
            fs::metadata(&canonical).map_err(|err| AccessError::from_io(&display, err))?;
        if !metadata.is_dir() {
            return Err(AccessError::NotADirectory(display));
        }
        let name = canonical
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| display.clone());
        handle_for(EntryKind::Directory, name, &canonical)
            .ok_or(AccessError::InvalidName(display))
    }

    fn path_of(handle: &Handle) -> PathBuf {
        PathBuf::from(handle.token().as_str())
    }

    fn require_directory(handle: &Handle) -> Result<PathBuf, AccessError> {
        if !handle.is_directory() {
            return Err(AccessError::NotADirectory(handle.name().to_string()));
        }
        let path = Self::path_of(handle);
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => Ok(path),
            Ok(_) => Err(AccessError::Stale(handle.name().to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(AccessError::Stale(handle.name().to_string()))
            }
            Err(err) => Err(AccessError::from_io(handle.name(), err)),
        }
    }

    fn require_file(handle: &Handle) -> Result<PathBuf, AccessError> {
        if handle.is_directory() {
            return Err(AccessError::NotAFile(handle.name().to_string()));
        }
        let path = Self::path_of(handle);
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => Ok(path),
            Ok(_) => Err(AccessError::Stale(handle.name().to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(AccessError::Stale(handle.name().to_string()))
            }
            Err(err) => Err(AccessError::from_io(handle.name(), err)),
        }
    }
}

fn handle_for(kind: EntryKind, name: impl Into<String>, path: &Path) -> Option<Handle> {
    let token = path.to_str()?;
    Some(Handle::new(kind, name, HandleToken::new(token)))
}

fn kind_of(metadata: &fs::Metadata) -> EntryKind {
    if metadata.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    }
}

fn permission_from_metadata(metadata: &fs::Metadata, mode: PermissionMode) -> PermissionState {
    if mode == PermissionMode::ReadWrite && metadata.permissions().readonly() {
        PermissionState::Denied
    } else {
        PermissionState::Granted
    }
}

impl IdentityResolver for NativeBackend {
    fn is_same_entry(&self, a: &Handle, b: &Handle) -> Option<bool> {
        if a.kind() != b.kind() {
            return Some(false);
        }
        let left = fs::canonicalize(Self::path_of(a)).ok()?;
        let right = fs::canonicalize(Self::path_of(b)).ok()?;
        Some(left == right)
    }
}

impl DirectoryBackend for NativeBackend {
    fn pick_directory(&self) -> Result<Option<Handle>, AccessError> {
        match (self.picker)() {
            Some(path) => Self::directory_handle(path).map(Some),
            None => Ok(None),
        }
    }

    fn query_permission(
        &self,
        handle: &Handle,
        mode: PermissionMode,
    ) -> Result<PermissionState, AccessError> {
        match fs::metadata(Self::path_of(handle)) {
            Ok(metadata) => Ok(permission_from_metadata(&metadata, mode)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(AccessError::Stale(handle.name().to_string()))
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => Ok(PermissionState::Denied),
            Err(err) => Err(AccessError::from_io(handle.name(), err)),
        }
    }

    fn request_permission(
        &self,
        handle: &Handle,
        mode: PermissionMode,
    ) -> Result<PermissionState, AccessError> {
        // There is no interactive grant on a native filesystem; the answer is
        // whatever the OS already allows.
        self.query_permission(handle, mode)
    }

    fn entries(&self, dir: &Handle) -> Result<Vec<Handle>, AccessError> {
        let path = Self::require_directory(dir)?;
        let reader = fs::read_dir(&path).map_err(|err| AccessError::from_io(dir.name(), err))?;
        let mut entries = Vec::new();
        for item in reader {
            let item = item.map_err(|err| AccessError::from_io(dir.name(), err))?;
            let child_path = item.path();
            let Some(name) = item.file_name().to_str().map(str::to_string) else {
                debug!(path = %child_path.display(), "skipping entry with non UTF-8 name");
                continue;
            };
            // Follows symlinks; dangling links are skipped.
            let metadata = match fs::metadata(&child_path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!(path = %child_path.display(), %err, "skipping unreadable entry");
                    continue;
                }
            };
            if let Some(handle) = handle_for(kind_of(&metadata), name, &child_path) {
                entries.push(handle);
            }
        }
        Ok(entries)
    }

    fn child(
        &self,
        dir: &Handle,
        name: &str,
        kind: EntryKind,
        create: bool,
    ) -> Result<Handle, AccessError> {
        let parent = Self::require_directory(dir)?;
        let path = parent.join(name);
        match fs::metadata(&path) {
            Ok(metadata) => {
                let existing = kind_of(&metadata);
                if existing != kind {
                    return Err(AccessError::KindConflict {
                        name: name.to_string(),
                        existing,
                    });
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if !create {
                    return Err(AccessError::NotFound(name.to_string()));
                }
                let created = match kind {
                    EntryKind::File => OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .open(&path)
                        .map(|_| ()),
                    EntryKind::Directory => fs::create_dir(&path),
                };
                created.map_err(|err| AccessError::from_io(name, err))?;
            }
            Err(err) => return Err(AccessError::from_io(name, err)),
        }
        handle_for(kind, name, &path).ok_or_else(|| AccessError::InvalidName(name.to_string()))
    }

    fn remove(&self, dir: &Handle, name: &str, recursive: bool) -> Result<(), AccessError> {
        let parent = Self::require_directory(dir)?;
        let path = parent.join(name);
        let metadata = fs::symlink_metadata(&path).map_err(|err| AccessError::from_io(name, err))?;
        let result = if metadata.is_dir() {
            if recursive {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_dir(&path)
            }
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|err| AccessError::from_io(name, err))
    }

    fn read(&self, file: &Handle) -> Result<Vec<u8>, AccessError> {
        let path = Self::require_file(file)?;
        fs::read(&path).map_err(|err| AccessError::from_io(file.name(), err))
    }

    fn write(&self, file: &Handle, data: &[u8]) -> Result<(), AccessError> {
        let path = Self::require_file(file)?;
        let tmp_path = path.with_file_name(format!(".{}.treepad-tmp", file.name()));
        let written: io::Result<()> = (|| {
            let mut tmp_file = File::create(&tmp_path)?;
            tmp_file.write_all(data)?;
            tmp_file.sync_all()?;
            fs::rename(&tmp_path, &path)
        })();
        written.map_err(|err| {
            let _ = fs::remove_file(&tmp_path);
            AccessError::WriteFailed {
                name: file.name().to_string(),
                reason: err.to_string(),
            }
        })
    }

    fn rename_atomic(
        &self,
        parent: &Handle,
        entry: &Handle,
        new_name: &str,
    ) -> Result<Option<Handle>, AccessError> {
        let parent_path = Self::require_directory(parent)?;
        let source = parent_path.join(entry.name());
        if !source.exists() {
            return Err(AccessError::NotFound(entry.name().to_string()));
        }
        let target = parent_path.join(new_name);
        if target.exists() {
            return Err(AccessError::AlreadyExists(new_name.to_string()));
        }
        fs::rename(&source, &target).map_err(|err| AccessError::from_io(entry.name(), err))?;
        Ok(handle_for(entry.kind(), new_name, &target))
    }

    fn export(&self, handle: &Handle) -> Result<PersistedHandle, AccessError> {
        Ok(PersistedHandle {
            name: handle.name().to_string(),
            kind: handle.kind(),
            locator: handle.token().as_str().to_string(),
        })
    }

    fn revive(&self, persisted: &PersistedHandle) -> Result<Handle, AccessError> {
        let path = PathBuf::from(&persisted.locator);
        match fs::metadata(&path) {
            Ok(metadata) if kind_of(&metadata) == persisted.kind => {
                handle_for(persisted.kind, persisted.name.clone(), &path)
                    .ok_or_else(|| AccessError::Stale(persisted.name.clone()))
            }
            Ok(_) => Err(AccessError::Stale(persisted.name.clone())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(AccessError::Stale(persisted.name.clone()))
            }
            Err(err) => Err(AccessError::from_io(&persisted.name, err)),
        }
    }
}
