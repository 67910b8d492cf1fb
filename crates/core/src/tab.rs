use std::fmt;
use std::ops::Range;

use treepad_access::Handle;

use crate::text::TextEncoding;

const TAB_ID_PREFIX: &str = "tab:";

/// Tab identifier derived from the file path; unique among open tabs.  
/// 由檔案路徑衍生的分頁識別碼。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(String);

impl TabId {
    pub fn for_path(path: &str) -> Self {
        Self(format!("{TAB_ID_PREFIX}{path}"))
    }

    /// Accepts either a full id (`tab:src/main.rs`) or a bare path.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(TAB_ID_PREFIX) {
            Some(_) => Self(raw.to_string()),
            None => Self::for_path(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn path(&self) -> &str {
        self.0.strip_prefix(TAB_ID_PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Buffer plus view position of one document. Offsets are byte offsets on
/// char boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditState {
    pub text: String,
    pub cursor: usize,
    pub scroll_top: usize,
}

impl EditState {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cursor: 0,
            scroll_top: 0,
        }
    }
}

/// One mutation of the live editing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Insert { at: usize, text: String },
    Delete { range: Range<usize> },
    /// Replaces the whole buffer.
    Replace { text: String },
    MoveCursor(usize),
    Scroll(usize),
}

impl Edit {
    /// `true` for edits that change buffer content.
    pub fn mutates_buffer(&self) -> bool {
        matches!(
            self,
            Edit::Insert { .. } | Edit::Delete { .. } | Edit::Replace { .. }
        )
    }

    pub(crate) fn apply(&self, state: &mut EditState) -> Result<(), String> {
        match self {
            Edit::Insert { at, text } => {
                check_offset(&state.text, *at)?;
                state.text.insert_str(*at, text);
                state.cursor = at + text.len();
            }
            Edit::Delete { range } => {
                if range.start > range.end {
                    return Err(format!("inverted range {}..{}", range.start, range.end));
                }
                check_offset(&state.text, range.start)?;
                check_offset(&state.text, range.end)?;
                state.text.replace_range(range.clone(), "");
                state.cursor = range.start;
            }
            Edit::Replace { text } => {
                state.text.clone_from(text);
                state.cursor = state.cursor.min(state.text.len());
                while !state.text.is_char_boundary(state.cursor) {
                    state.cursor -= 1;
                }
            }
            Edit::MoveCursor(offset) => {
                check_offset(&state.text, *offset)?;
                state.cursor = *offset;
            }
            Edit::Scroll(line) => state.scroll_top = *line,
        }
        Ok(())
    }
}

fn check_offset(text: &str, offset: usize) -> Result<(), String> {
    if offset <= text.len() && text.is_char_boundary(offset) {
        Ok(())
    } else {
        Err(format!("offset {offset} is not a character boundary"))
    }
}

/// One open document bound to a file handle.  
/// 綁定檔案控制代碼的已開啟文件。
#[derive(Debug, Clone)]
pub struct Tab {
    pub(crate) id: TabId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) handle: Handle,
    pub(crate) language: &'static str,
    pub(crate) encoding: TextEncoding,
    /// Last state captured from the editing surface.
    pub(crate) state: EditState,
    pub(crate) dirty: bool,
}

impl Tab {
    pub fn id(&self) -> &TabId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Edit state as of the last flush; for the active tab prefer
    /// [`crate::TabManager::active_state`].
    pub fn edit_state(&self) -> &EditState {
        &self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn rebind(&mut self, path: String, handle: Handle) {
        self.name = handle.name().to_string();
        self.id = TabId::for_path(&path);
        self.path = path;
        self.handle = handle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_ids_derive_from_paths() {
        let id = TabId::for_path("src/main.rs");
        assert_eq!(id.as_str(), "tab:src/main.rs");
        assert_eq!(id.path(), "src/main.rs");
        assert_eq!(TabId::parse("tab:src/main.rs"), id);
        assert_eq!(TabId::parse("src/main.rs"), id);
    }

    #[test]
    fn edits_respect_char_boundaries() {
        let mut state = EditState::new("héllo");
        assert!(Edit::Insert { at: 2, text: "x".into() }.apply(&mut state).is_err());
        Edit::Insert { at: 3, text: "y".into() }.apply(&mut state).unwrap();
        assert_eq!(state.text, "héyllo");
        assert_eq!(state.cursor, 4);
        Edit::Delete { range: 0..3 }.apply(&mut state).unwrap();
        assert_eq!(state.text, "yllo");
        assert!(Edit::Delete { range: 3..1 }.apply(&mut state).is_err());
        Edit::Scroll(12).apply(&mut state).unwrap();
        assert_eq!(state.scroll_top, 12);
        assert!(!Edit::Scroll(1).mutates_buffer());
    }
}
