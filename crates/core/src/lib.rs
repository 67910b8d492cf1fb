//! Editing core: open documents, session persistence and the workbench
//! controller that exposes the command surface.

pub mod language;
mod session;
pub mod tab;
pub mod tabs;
pub mod text;
pub mod workbench;

pub use language::{detect_language, PLAIN_TEXT};
pub use session::RestoreOutcome;
pub use tab::{Edit, EditState, Tab, TabId};
pub use tabs::{CloseOutcome, OpenOutcome, TabError, TabManager};
pub use text::{DecodedText, TextEncoding, TextError};
pub use workbench::{ErrorClass, Workbench, WorkbenchError};

pub use treepad_access as access;
pub use treepad_project as project;
pub use treepad_settings as settings;
