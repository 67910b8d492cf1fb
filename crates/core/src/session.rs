//! Session persistence: which folder and document were active.
//!
//! Records are hints. Failures to persist them are logged and never abort
//! the user action that triggered them.

use tracing::{debug, warn};

use treepad_access::Handle;
use treepad_settings::{FolderHint, SessionRecord, Settings};

use crate::tab::TabId;

/// What startup brought back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub folder: Option<String>,
    pub document: Option<TabId>,
}

/// Stores the folder hint for `root`.
pub(crate) fn remember_folder(settings: &mut Settings, root: &Handle) {
    let hint = FolderHint {
        name: root.name().to_string(),
        kind: root.kind(),
    };
    if let Err(err) = settings.set_folder_hint(&hint) {
        warn!(%err, "could not persist folder hint");
    }
}

/// Records `{folder, document, now}` as the active session.
pub(crate) fn remember(settings: &mut Settings, folder: &str, document: Option<&str>) {
    let record = SessionRecord::now(folder, document.map(str::to_string));
    match settings.save_session(&record) {
        Ok(()) => debug!(folder, ?document, "session recorded"),
        Err(err) => warn!(%err, "could not persist session"),
    }
}

pub(crate) fn push_recent(settings: &mut Settings, path: &str) {
    if let Err(err) = settings.push_recent(path) {
        warn!(%err, "could not update recent files");
    }
}

pub(crate) fn rename_recent(settings: &mut Settings, old: &str, new: &str) {
    let mut recent = settings.recent_files();
    if recent.rename_prefix(old, new) {
        if let Err(err) = settings.save_recent_files(&recent) {
            warn!(%err, "could not update recent files");
        }
    }
}

pub(crate) fn forget_recent(settings: &mut Settings, prefix: &str) {
    let mut recent = settings.recent_files();
    if recent.remove_prefix(prefix) {
        if let Err(err) = settings.save_recent_files(&recent) {
            warn!(%err, "could not update recent files");
        }
    }
}

/// Clears the session record.
pub(crate) fn forget(settings: &mut Settings) {
    match settings.clear_session() {
        Ok(()) => debug!("session cleared"),
        Err(err) => warn!(%err, "could not clear session"),
    }
}

pub(crate) fn forget_folder(settings: &mut Settings) {
    if let Err(err) = settings.clear_folder_hint() {
        warn!(%err, "could not clear folder hint");
    }
}

/// Document path recorded for `folder`, if the stored session belongs to it.
pub(crate) fn pending_document(settings: &Settings, folder: &str) -> Option<String> {
    let record = settings.session()?;
    if record.folder_name != folder {
        debug!(
            recorded = %record.folder_name,
            folder,
            "session belongs to another folder; ignoring"
        );
        return None;
    }
    record.current_file_path
}
