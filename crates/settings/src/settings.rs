use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::SettingsError;
use crate::preferences::{Preferences, Theme};
use crate::recent::{RecentFiles, RECENT_FILES_LIMIT};
use crate::session::{FolderHint, SessionRecord};
use crate::store::KeyValueStore;

pub const KEY_THEME: &str = "theme";
pub const KEY_FONT_SIZE: &str = "fontSize";
pub const KEY_TAB_SIZE: &str = "tabSize";
pub const KEY_RECENT_FILES: &str = "recentFiles";
pub const KEY_LAST_OPENED_FOLDER: &str = "lastOpenedFolder";
pub const KEY_EDITOR_SESSION: &str = "editorSession";

/// Typed view over a [`KeyValueStore`]. Malformed stored values are logged
/// and read back as their defaults.
pub struct Settings {
    store: Box<dyn KeyValueStore>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings").finish_non_exhaustive()
    }
}

impl Settings {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.store.get(key)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(key, %err, "ignoring malformed setting");
                None
            }
        }
    }

    fn write<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), SettingsError> {
        let value = serde_json::to_value(value).map_err(|source| SettingsError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, value)
    }

    pub fn preferences(&self) -> Preferences {
        let defaults = Preferences::default();
        let mut prefs = Preferences {
            theme: self.read::<Theme>(KEY_THEME).unwrap_or(defaults.theme),
            font_size: self.read(KEY_FONT_SIZE).unwrap_or(defaults.font_size),
            tab_size: self.read(KEY_TAB_SIZE).unwrap_or(defaults.tab_size),
        };
        prefs.sanitize();
        prefs
    }

    pub fn update_preferences<F>(&mut self, op: F) -> Result<Preferences, SettingsError>
    where
        F: FnOnce(&mut Preferences),
    {
        let mut prefs = self.preferences();
        op(&mut prefs);
        prefs.sanitize();
        self.write(KEY_THEME, &prefs.theme)?;
        self.write(KEY_FONT_SIZE, &prefs.font_size)?;
        self.write(KEY_TAB_SIZE, &prefs.tab_size)?;
        Ok(prefs)
    }

    pub fn recent_files(&self) -> RecentFiles {
        let entries: Vec<String> = self.read(KEY_RECENT_FILES).unwrap_or_default();
        RecentFiles::with_entries(RECENT_FILES_LIMIT, entries)
    }

    pub fn save_recent_files(&mut self, recent: &RecentFiles) -> Result<(), SettingsError> {
        self.write(KEY_RECENT_FILES, &recent.to_vec())
    }

    /// Promotes `path` to the front of the persisted recent list.
    pub fn push_recent(&mut self, path: &str) -> Result<(), SettingsError> {
        let mut recent = self.recent_files();
        recent.add(path);
        self.save_recent_files(&recent)
    }

    pub fn folder_hint(&self) -> Option<FolderHint> {
        self.read(KEY_LAST_OPENED_FOLDER)
    }

    pub fn set_folder_hint(&mut self, hint: &FolderHint) -> Result<(), SettingsError> {
        self.write(KEY_LAST_OPENED_FOLDER, hint)
    }

    pub fn clear_folder_hint(&mut self) -> Result<(), SettingsError> {
        self.store.remove(KEY_LAST_OPENED_FOLDER)
    }

    pub fn session(&self) -> Option<SessionRecord> {
        self.read(KEY_EDITOR_SESSION)
    }

    pub fn save_session(&mut self, record: &SessionRecord) -> Result<(), SettingsError> {
        self.write(KEY_EDITOR_SESSION, record)
    }

    pub fn clear_session(&mut self) -> Result<(), SettingsError> {
        self.store.remove(KEY_EDITOR_SESSION)
    }

    #[cfg(test)]
    fn raw(&self, key: &str) -> Option<serde_json::Value> {
        self.store.get(key)
    }
}
