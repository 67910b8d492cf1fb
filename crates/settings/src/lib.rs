//! Persisted editor settings: a narrow key-value store and the typed records
//! kept in it.

mod error;
pub mod preferences;
pub mod recent;
pub mod session;
mod settings;
pub mod store;

pub use error::SettingsError;
pub use preferences::{Preferences, Theme, FONT_SIZE_RANGE, TAB_SIZE_RANGE};
pub use recent::{RecentFiles, RECENT_FILES_LIMIT};
pub use session::{FolderHint, SessionRecord};
pub use settings::{
    Settings, KEY_EDITOR_SESSION, KEY_FONT_SIZE, KEY_LAST_OPENED_FOLDER, KEY_RECENT_FILES,
    KEY_TAB_SIZE, KEY_THEME,
};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
