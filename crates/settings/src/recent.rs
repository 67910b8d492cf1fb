use std::collections::VecDeque;

/// Upper bound on remembered paths.
pub const RECENT_FILES_LIMIT: usize = 20;

/// 管理最近開啟檔案的清單。 / Maintains a bounded, de-duplicated list of recently opened paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentFiles {
    capacity: usize,
    entries: VecDeque<String>,
}

impl Default for RecentFiles {
    fn default() -> Self {
        Self::new(RECENT_FILES_LIMIT)
    }
}

impl RecentFiles {
    /// 建立指定容量的清單。 / Creates a history list with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// 依序列化資料還原清單，去除重複並修剪。 / Rebuilds the list from persisted entries, dropping duplicates.
    pub fn with_entries(capacity: usize, entries: Vec<String>) -> Self {
        let mut recent = Self::new(capacity);
        for entry in entries {
            if recent.entries.len() >= recent.capacity {
                break;
            }
            if !recent.entries.contains(&entry) {
                recent.entries.push_back(entry);
            }
        }
        recent
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 加入或提升某個路徑至清單頂端。 / Inserts or promotes a path to the front of the list.
    pub fn add(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.entries.retain(|existing| existing != &path);
        self.entries.push_front(path);
        self.entries.truncate(self.capacity);
    }

    /// 移除指定路徑；若存在則回傳 `true`。 / Removes the given path and returns `true` if it existed.
    pub fn remove(&mut self, path: &str) -> bool {
        let initial_len = self.entries.len();
        self.entries.retain(|existing| existing != path);
        initial_len != self.entries.len()
    }

    /// Rewrites `old` and every path below it to live under `new`.
    pub fn rename_prefix(&mut self, old: &str, new: &str) -> bool {
        let mut changed = false;
        for entry in self.entries.iter_mut() {
            if let Some(rest) = strip_path_prefix(entry, old) {
                *entry = format!("{new}{rest}");
                changed = true;
            }
        }
        if changed {
            let mut seen = Vec::with_capacity(self.entries.len());
            self.entries.retain(|entry| {
                let fresh = !seen.contains(entry);
                if fresh {
                    seen.push(entry.clone());
                }
                fresh
            });
        }
        changed
    }

    /// Drops `prefix` and every path below it.
    pub fn remove_prefix(&mut self, prefix: &str) -> bool {
        let initial_len = self.entries.len();
        self.entries
            .retain(|entry| strip_path_prefix(entry, prefix).is_none());
        initial_len != self.entries.len()
    }

    /// 清空清單。 / Clears all tracked entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Remainder of `path` after `prefix` when `path` is `prefix` itself or lies
/// below it.
fn strip_path_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}
