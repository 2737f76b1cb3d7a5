//! Lead persistence.
//!
//! [`LeadStore`] is the seam the intake service is composed over. Two backends
//! implement it: [`JsonFileStore`], a single JSON document holding every lead,
//! and [`crate::db_storage::PgLeadStore`]. [`LeadRepository`] picks one at
//! startup from configuration.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::db_storage::PgLeadStore;
use crate::models::{Lead, NewLead};

/// File name of the lead document inside the data directory.
pub const LEADS_FILE: &str = "leads.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing resource could not be read or reached.
    #[error("lead storage unavailable: {0}")]
    Unavailable(String),
    /// A write did not complete; nothing was stored.
    #[error("failed to write lead storage: {0}")]
    Write(String),
}

/// Durable, insertion-ordered lead storage.
///
/// `add` is the only operation whose failure must reach the caller as a hard
/// error. All others report [`StoreError::Unavailable`] when degraded.
pub trait LeadStore: Send + Sync + 'static {
    /// Assigns an id and timestamp and appends the lead.
    fn add(&self, fields: NewLead) -> impl Future<Output = Result<Lead, StoreError>> + Send;

    fn get_by_id(&self, id: &str)
        -> impl Future<Output = Result<Option<Lead>, StoreError>> + Send;

    /// All leads, oldest first.
    fn list_all(&self) -> impl Future<Output = Result<Vec<Lead>, StoreError>> + Send;

    /// Returns `true` when a record was removed.
    fn delete_by_id(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Records that the notification for `id` was delivered.
    fn mark_notified(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

// ============ JSON document backend ============

/// Stores every lead in one pretty-printed JSON array.
///
/// Nothing touches the filesystem until the first call; the data directory is
/// created on first write and a missing file reads as an empty collection.
/// Mutating calls hold `write_lock` across read-modify-write so they never
/// interleave within the process.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at `<data_dir>/leads.json`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(LEADS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Lead>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                tracing::warn!("[Leads Storage] Error reading {:?}: {}", self.path, e);
                return Err(StoreError::Unavailable(e.to_string()));
            }
        };

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!("[Leads Storage] Corrupt lead file {:?}: {}", self.path, e);
            StoreError::Unavailable(format!("corrupt lead file: {}", e))
        })
    }

    /// Replaces the document atomically: write a sibling temp file, then rename.
    async fn save(&self, leads: &[Lead]) -> Result<(), StoreError> {
        let write_err = |e: std::io::Error| {
            tracing::error!("[Leads Storage] Error saving leads: {}", e);
            StoreError::Write(e.to_string())
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(write_err)?;
        }

        let body = serde_json::to_vec_pretty(leads).map_err(|e| StoreError::Write(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}

impl LeadStore for JsonFileStore {
    async fn add(&self, fields: NewLead) -> Result<Lead, StoreError> {
        let _guard = self.write_lock.lock().await;

        // A corrupt document must not be overwritten with a fresh array
        let mut leads = self
            .load()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        let mut lead = Lead::from_new(fields);
        while leads.iter().any(|l| l.id == lead.id) {
            lead.id = crate::models::generate_lead_id();
        }

        leads.push(lead.clone());
        self.save(&leads).await?;

        tracing::info!("[Leads Storage] Stored lead {}", lead.id);
        Ok(lead)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Lead>, StoreError> {
        let leads = self.load().await?;
        Ok(leads.into_iter().find(|l| l.id == id))
    }

    async fn list_all(&self) -> Result<Vec<Lead>, StoreError> {
        self.load().await
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut leads = self.load().await?;
        let Some(index) = leads.iter().position(|l| l.id == id) else {
            return Ok(false);
        };

        leads.remove(index);
        self.save(&leads).await?;
        tracing::info!("[Leads Storage] Deleted lead {}", id);
        Ok(true)
    }

    async fn mark_notified(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut leads = self.load().await?;
        let Some(lead) = leads.iter_mut().find(|l| l.id == id) else {
            return Ok(false);
        };

        if !lead.notification_sent {
            lead.notification_sent = true;
            self.save(&leads).await?;
        }
        Ok(true)
    }
}

// ============ Backend selection ============

/// The configured lead store.
pub enum LeadRepository {
    File(JsonFileStore),
    Postgres(PgLeadStore),
}

impl LeadRepository {
    pub fn backend_name(&self) -> &'static str {
        match self {
            LeadRepository::File(_) => "json-file",
            LeadRepository::Postgres(_) => "postgres",
        }
    }
}

impl LeadStore for LeadRepository {
    async fn add(&self, fields: NewLead) -> Result<Lead, StoreError> {
        match self {
            LeadRepository::File(s) => s.add(fields).await,
            LeadRepository::Postgres(s) => s.add(fields).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Lead>, StoreError> {
        match self {
            LeadRepository::File(s) => s.get_by_id(id).await,
            LeadRepository::Postgres(s) => s.get_by_id(id).await,
        }
    }

    async fn list_all(&self) -> Result<Vec<Lead>, StoreError> {
        match self {
            LeadRepository::File(s) => s.list_all().await,
            LeadRepository::Postgres(s) => s.list_all().await,
        }
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        match self {
            LeadRepository::File(s) => s.delete_by_id(id).await,
            LeadRepository::Postgres(s) => s.delete_by_id(id).await,
        }
    }

    async fn mark_notified(&self, id: &str) -> Result<bool, StoreError> {
        match self {
            LeadRepository::File(s) => s.mark_notified(id).await,
            LeadRepository::Postgres(s) => s.mark_notified(id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_lead(name: &str) -> NewLead {
        NewLead {
            name: name.to_string(),
            email: "joao@example.com".to_string(),
            phone: "(11) 99999-9999".to_string(),
            cpf: "123.456.789-09".to_string(),
            company: "Tech Co".to_string(),
            service: "Desenvolvimento Web".to_string(),
            message: None,
        }
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path().join("not-created-yet"));

        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(store.get_by_id("lead-1").await.unwrap(), None);
        assert!(!store.delete_by_id("lead-1").await.unwrap());
        // Reads never create the directory
        assert!(!dir.path().join("not-created-yet").exists());
    }

    #[tokio::test]
    async fn test_add_then_get_returns_equal_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path().join("data"));

        let added = store.add(new_lead("João Silva")).await.unwrap();
        let fetched = store.get_by_id(&added.id).await.unwrap();

        assert_eq!(fetched, Some(added));
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_identical_adds_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());

        let a = store.add(new_lead("Same")).await.unwrap();
        let b = store.add(new_lead("Same")).await.unwrap();

        assert_ne!(a.id, b.id);
        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, a.id);
        assert_eq!(all[1].id, b.id);
    }

    #[tokio::test]
    async fn test_delete_removes_only_target() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());

        let first = store.add(new_lead("First")).await.unwrap();
        let second = store.add(new_lead("Second")).await.unwrap();

        assert!(!store.delete_by_id("lead-0-missing").await.unwrap());
        assert_eq!(store.list_all().await.unwrap().len(), 2);

        assert!(store.delete_by_id(&first.id).await.unwrap());
        let remaining = store.list_all().await.unwrap();
        assert_eq!(remaining, vec![second]);
    }

    #[tokio::test]
    async fn test_mark_notified_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());

        let lead = store.add(new_lead("João Silva")).await.unwrap();
        assert!(!lead.notification_sent);

        assert!(store.mark_notified(&lead.id).await.unwrap());
        assert!(!store.mark_notified("lead-0-missing").await.unwrap());

        let stored = store.get_by_id(&lead.id).await.unwrap().unwrap();
        assert!(stored.notification_sent);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(JsonFileStore::in_dir(dir.path()));

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.add(new_lead(&format!("Lead {}", i))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.list_all().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        tokio::fs::write(store.path(), b"{ not json").await.unwrap();

        assert!(matches!(
            store.list_all().await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.add(new_lead("João Silva")).await,
            Err(StoreError::Write(_))
        ));

        let contents = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert_eq!(contents, "{ not json");
    }
}
