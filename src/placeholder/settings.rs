/// Key-value settings stores for placeholder history
///
/// The resolver persists its history ledgers as named maps of string key to an
/// ordered list of strings. The file-backed store writes one JSON file per map
/// under a settings directory and keeps the previous version as `<file>.bak`.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

/// One persisted map: key to ordered values
pub type StringListMap = BTreeMap<String, Vec<String>>;

/// Storage of named string-list maps
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load a map; a map that was never saved is empty
    async fn load(&self, name: &str) -> Result<StringListMap>;

    /// Replace a map
    async fn save(&self, name: &str, values: &StringListMap) -> Result<()>;
}

/// JSON files in a settings directory
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    directory: PathBuf,
}

impl FileSettingsStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self, name: &str) -> Result<StringListMap> {
        let path = self.path(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StringListMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, name: &str, values: &StringListMap) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.path(name);
        if tokio::fs::try_exists(&path).await? {
            let backup = self.path(&format!("{name}.bak"));
            tokio::fs::copy(&path, &backup).await?;
        }
        let text = serde_json::to_string_pretty(values)?;
        tokio::fs::write(&path, text).await?;
        tracing::debug!("Saved settings {} ({} keys)", path.display(), values.len());
        Ok(())
    }
}

/// In-memory store for tests and single-session use
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    maps: Mutex<HashMap<String, StringListMap>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self, name: &str) -> Result<StringListMap> {
        let maps = self.maps.lock().unwrap_or_else(|e| e.into_inner());
        Ok(maps.get(name).cloned().unwrap_or_default())
    }

    async fn save(&self, name: &str, values: &StringListMap) -> Result<()> {
        let mut maps = self.maps.lock().unwrap_or_else(|e| e.into_inner());
        maps.insert(name.to_string(), values.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_round_trips_and_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path());

        assert!(store.load("history.json").await.unwrap().is_empty());

        let mut values = StringListMap::new();
        values.insert("wf.type.host".into(), vec!["a".into(), "b".into()]);
        store.save("history.json", &values).await.unwrap();
        store.save("history.json", &values).await.unwrap();

        assert_eq!(store.load("history.json").await.unwrap(), values);
        assert!(dir.path().join("history.json.bak").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        let store = FileSettingsStore::new(dir.path());

        let err = store.load("broken.json").await.unwrap_err();
        assert!(err.line().is_some());
    }
}
