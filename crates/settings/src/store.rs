use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use treepad_access::write_json_atomic;

use crate::error::SettingsError;

/// Narrow get/set interface over persisted settings.  
/// 設定值的精簡存取介面。
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), SettingsError>;
    fn remove(&mut self, key: &str) -> Result<(), SettingsError>;
}

/// Settings kept as one JSON object on disk, rewritten atomically on every
/// change.  
/// 以單一 JSON 物件保存設定，每次變更皆以原子方式寫回。
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFileStore {
    /// Opens the store; a missing file starts empty.  
    /// 開啟設定檔；若檔案不存在則從空白開始。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(values)) => values,
                Ok(_) => return Err(SettingsError::NotAnObject { path }),
                Err(source) => return Err(SettingsError::Parse { path, source }),
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(SettingsError::Read { path, source }),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), SettingsError> {
        write_json_atomic(&self.path, &self.values).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value);
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

/// Non-persistent store for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: Map<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        self.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn json_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut store = JsonFileStore::open(&path).unwrap();
        assert!(store.get("theme").is_none());
        store.set("theme", json!("light")).unwrap();
        store.set("tabSize", json!(2)).unwrap();
        store.remove("tabSize").unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("theme"), Some(json!("light")));
        assert!(reopened.get("tabSize").is_none());
    }

    #[test]
    fn json_store_writes_leave_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut store = JsonFileStore::open(&path).unwrap();
        store.set("fontSize", json!(16)).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["settings.json"]);
        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({ "fontSize": 16 }));
    }

    #[test]
    fn json_store_rejects_non_object_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(SettingsError::NotAnObject { .. })
        ));
        fs::write(&path, "{ broken").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(SettingsError::Parse { .. })
        ));
    }
}
