//! Record persistence
//!
//! Records are JSON values keyed by entity id, grouped in tables. Two
//! backends are provided:
//!
//! - [`MemoryStore`]: process-local, for tests and one-shot runs
//! - [`JsonFileStore`]: one versioned JSON document on disk, with a
//!   `.backup` copy of the previous document kept on every save

use crate::error::{ControlPlaneError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

const STORE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tenants,
    Environments,
    Projects,
    Services,
    Resources,
    BuildWorkers,
    ServiceDeployments,
    ExecutionLogs,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Tenants => "tenants",
            Table::Environments => "environments",
            Table::Projects => "projects",
            Table::Services => "services",
            Table::Resources => "resources",
            Table::BuildWorkers => "build_workers",
            Table::ServiceDeployments => "service_deployments",
            Table::ExecutionLogs => "execution_logs",
        }
    }

    /// Singular noun used in error messages
    pub fn entity_name(&self) -> &'static str {
        match self {
            Table::Tenants => "tenant",
            Table::Environments => "environment",
            Table::Projects => "project",
            Table::Services => "service",
            Table::Resources => "resource",
            Table::BuildWorkers => "build worker",
            Table::ServiceDeployments => "service deployment",
            Table::ExecutionLogs => "execution log",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key/value persistence of JSON records
#[async_trait]
pub trait Store: Send + Sync {
    async fn load(&self, table: Table, id: Uuid) -> Result<Option<Value>>;

    /// Inserts or replaces the record
    async fn save(&self, table: Table, id: Uuid, record: Value) -> Result<()>;

    async fn scan(&self, table: Table) -> Result<Vec<Value>>;
}

/// Store backed by a map in memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, HashMap<Uuid, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, table: Table, id: Uuid) -> Result<Option<Value>> {
        let tables = self.tables.read().await;
        Ok(tables.get(&table).and_then(|rows| rows.get(&id)).cloned())
    }

    async fn save(&self, table: Table, id: Uuid, record: Value) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.entry(table).or_default().insert(id, record);
        Ok(())
    }

    async fn scan(&self, table: Table) -> Result<Vec<Value>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// On-disk document holding every table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    updated_at: DateTime<Utc>,
    /// Table name → record id → record
    #[serde(default)]
    tables: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            updated_at: Utc::now(),
            tables: BTreeMap::new(),
        }
    }
}

/// Store persisted as a single JSON file.
///
/// The document is read once and cached; every save rewrites the whole
/// file under the same mutex, so concurrent workflows never interleave
/// partial writes.
pub struct JsonFileStore {
    path: PathBuf,
    document: Mutex<Option<StoreDocument>>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            document: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".backup");
        PathBuf::from(name)
    }

    async fn read_document(&self) -> Result<StoreDocument> {
        if !fs::try_exists(&self.path).await? {
            tracing::debug!("Store file {} not found, starting empty", self.path.display());
            return Ok(StoreDocument::default());
        }

        let content = fs::read_to_string(&self.path).await?;
        let document: StoreDocument = serde_json::from_str(&content)?;
        if document.version > STORE_VERSION {
            return Err(ControlPlaneError::Store(format!(
                "store file version {} is newer than supported version {}",
                document.version, STORE_VERSION
            )));
        }
        tracing::debug!(
            "Loaded store with {} tables from {}",
            document.tables.len(),
            self.path.display()
        );
        Ok(document)
    }

    async fn write_document(&self, document: &StoreDocument) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        if fs::try_exists(&self.path).await? {
            fs::copy(&self.path, self.backup_path()).await?;
        }

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, serde_json::to_string_pretty(document)?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn read_with<T>(&self, f: impl FnOnce(&StoreDocument) -> T) -> Result<T> {
        let mut guard = self.document.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_document().await?);
        }
        let document = guard.get_or_insert_with(StoreDocument::default);
        Ok(f(document))
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load(&self, table: Table, id: Uuid) -> Result<Option<Value>> {
        self.read_with(|doc| {
            doc.tables
                .get(table.name())
                .and_then(|rows| rows.get(&id.to_string()))
                .cloned()
        })
        .await
    }

    async fn save(&self, table: Table, id: Uuid, record: Value) -> Result<()> {
        let mut guard = self.document.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_document().await?);
        }
        // the cache only takes the change once it is on disk
        let mut document = guard.clone().unwrap_or_default();
        document
            .tables
            .entry(table.name().to_string())
            .or_default()
            .insert(id.to_string(), record);
        document.updated_at = Utc::now();
        self.write_document(&document).await?;
        *guard = Some(document);
        tracing::debug!(%table, %id, "Saved record");
        Ok(())
    }

    async fn scan(&self, table: Table) -> Result<Vec<Value>> {
        self.read_with(|doc| {
            doc.tables
                .get(table.name())
                .map(|rows| rows.values().cloned().collect())
                .unwrap_or_default()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        assert!(store.load(Table::Projects, id).await.unwrap().is_none());
        store
            .save(Table::Projects, id, json!({"name": "api"}))
            .await
            .unwrap();
        store
            .save(Table::Projects, id, json!({"name": "api-v2"}))
            .await
            .unwrap();

        let loaded = store.load(Table::Projects, id).await.unwrap().unwrap();
        assert_eq!(loaded["name"], "api-v2");
        assert_eq!(store.scan(Table::Projects).await.unwrap().len(), 1);
        assert!(store.scan(Table::Services).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_file_store_persists_across_instances() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("state").join("seedflow-state.json");
        let id = Uuid::new_v4();

        let store = JsonFileStore::new(&path);
        store
            .save(Table::Environments, id, json!({"name": "prod"}))
            .await
            .unwrap();

        let reopened = JsonFileStore::new(&path);
        let loaded = reopened.load(Table::Environments, id).await.unwrap();
        assert_eq!(loaded.unwrap()["name"], "prod");
    }

    #[tokio::test]
    async fn test_json_file_store_keeps_backup() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("seedflow-state.json");
        let store = JsonFileStore::new(&path);

        store
            .save(Table::Tenants, Uuid::new_v4(), json!({"name": "acme"}))
            .await
            .unwrap();
        assert!(!store.backup_path().exists());

        store
            .save(Table::Tenants, Uuid::new_v4(), json!({"name": "globex"}))
            .await
            .unwrap();
        let backup = std::fs::read_to_string(store.backup_path()).unwrap();
        assert!(backup.contains("acme"));
        assert!(!backup.contains("globex"));
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_newer_version() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("seedflow-state.json");
        std::fs::write(
            &path,
            json!({"version": 99, "updated_at": "2024-01-01T00:00:00Z", "tables": {}}).to_string(),
        )
        .unwrap();

        let store = JsonFileStore::new(&path);
        let err = store.scan(Table::Tenants).await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Store(_)));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("state.json");
        let store = JsonFileStore::new(&path);
        let kept = Uuid::new_v4();
        let lost = Uuid::new_v4();

        store
            .save(Table::Services, kept, json!({"n": 1}))
            .await
            .unwrap();
        // a directory in place of the temp file makes the next write fail
        std::fs::create_dir(temp_dir.path().join("state.json.tmp")).unwrap();

        assert!(store.save(Table::Services, lost, json!({"n": 2})).await.is_err());
        assert!(store.load(Table::Services, lost).await.unwrap().is_none());
        assert_eq!(store.scan(Table::Services).await.unwrap().len(), 1);

        let reopened = JsonFileStore::new(&path);
        assert!(reopened.load(Table::Services, kept).await.unwrap().is_some());
        assert!(reopened.load(Table::Services, lost).await.unwrap().is_none());
    }
}
