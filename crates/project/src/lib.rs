//! Folder tree primitives: ignore rules, the lazily expanded tree cache and
//! quick-open matching.
//! 資料夾樹核心：忽略規則、延遲展開的樹狀快取與快速開啟比對。

pub mod fuzzy;
pub mod ignore;
pub mod tree;

pub use fuzzy::fuzzy_filter;
pub use ignore::{IgnoreRule, IgnoreRules};
pub use tree::{FileRecord, TreeCache, TreeEntry, TreeError, TreeRow, IGNORE_FILE_NAME};
