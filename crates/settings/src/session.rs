use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use treepad_access::EntryKind;

/// Display-only reminder of the last opened folder. Not a capability.  
/// 最近開啟資料夾的提示，不具存取權限。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderHint {
    pub name: String,
    pub kind: EntryKind,
}

/// Advisory record of the active folder and document.  
/// 目前資料夾與文件的參考紀錄，使用前須重新驗證。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub folder_name: String,
    #[serde(default)]
    pub current_file_path: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: u64,
}

impl SessionRecord {
    pub fn now(folder_name: impl Into<String>, current_file_path: Option<String>) -> Self {
        Self {
            folder_name: folder_name.into(),
            current_file_path,
            timestamp: unix_millis(),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_record_uses_camel_case_keys() {
        let record = SessionRecord {
            folder_name: "project".into(),
            current_file_path: Some("src/main.rs".into()),
            timestamp: 42,
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "folderName": "project", "currentFilePath": "src/main.rs", "timestamp": 42 })
        );
    }

    #[test]
    fn missing_optional_fields_default() {
        let record: SessionRecord = serde_json::from_value(json!({ "folderName": "p" })).unwrap();
        assert_eq!(record.current_file_path, None);
        assert_eq!(record.timestamp, 0);
        assert!(SessionRecord::now("p", None).timestamp > 0);
    }
}
