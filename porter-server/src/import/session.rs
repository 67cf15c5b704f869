//! redb-backed import session store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `import_sessions` | import id | JSON `{expires_at, state}` | In-progress imports |
//!
//! Sessions expire `ttl` after their last write. An expired session reads
//! as missing and is physically removed by [`SessionStore::purge_expired`].
//!
//! State is always read and written as a whole value. There is no
//! compare-and-swap: two concurrent writers for the same id both succeed
//! and the later one wins.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// key = import id, value = JSON-serialized [`Envelope`]
const SESSIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("import_sessions");

/// Import ids are 12 characters of `[0-9a-z]`
pub const IMPORT_ID_LEN: usize = 12;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Import session not found or expired: {0}")]
    NotFound(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => AppError::new(ErrorCode::ImportSessionNotFound)
                .with_detail("import_id", id),
            other => AppError::storage(other.to_string()),
        }
    }
}

/// State of one in-progress import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Working directory holding the unpacked package
    pub dir: PathBuf,
    /// Number of records in the manifest
    pub total: usize,
    /// Records processed so far; never decreases, never exceeds `total`
    pub processed: usize,
    pub update_existing: bool,
    /// Fixed when the session is created
    pub batch_size: usize,
    /// Package image file name → attachment id
    #[serde(default)]
    pub media_map: BTreeMap<String, i64>,
    /// Creation time (Unix millis)
    pub created: i64,
}

impl SessionState {
    pub fn new(dir: PathBuf, total: usize, update_existing: bool, batch_size: usize) -> Self {
        Self {
            dir,
            total,
            processed: 0,
            update_existing,
            batch_size: batch_size.max(1),
            media_map: BTreeMap::new(),
            created: shared::util::now_millis(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    expires_at: i64,
    state: SessionState,
}

/// Generate a fresh import id (12 lowercase hex characters)
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..IMPORT_ID_LEN].to_string()
}

/// Whether `id` has the shape of an import id
pub fn is_valid_id(id: &str) -> bool {
    id.len() == IMPORT_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

/// Import session storage backed by redb
#[derive(Clone)]
pub struct SessionStore {
    db: Arc<Database>,
    ttl: Duration,
}

impl SessionStore {
    /// Open or create the session database at the given path
    pub fn open(path: impl AsRef<Path>, ttl: Duration) -> SessionResult<Self> {
        let db = Database::create(path)?;
        Self::init(db, ttl)
    }

    /// In-memory store (tests)
    pub fn open_in_memory(ttl: Duration) -> SessionResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db, ttl)
    }

    fn init(db: Database, ttl: Duration) -> SessionResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSIONS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self {
            db: Arc::new(db),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn expires_at(&self, now: i64) -> i64 {
        now.saturating_add(i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX))
    }

    fn write(&self, id: &str, state: &SessionState) -> SessionResult<()> {
        let envelope = Envelope {
            expires_at: self.expires_at(shared::util::now_millis()),
            state: state.clone(),
        };
        let value = serde_json::to_vec(&envelope)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SESSIONS_TABLE)?;
            table.insert(id, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Store the initial state of a new session
    pub fn create(&self, id: &str, state: &SessionState) -> SessionResult<()> {
        self.write(id, state)
    }

    /// Read a live session
    pub fn read(&self, id: &str) -> SessionResult<SessionState> {
        if !is_valid_id(id) {
            return Err(SessionError::NotFound(id.to_string()));
        }
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS_TABLE)?;
        let Some(value) = table.get(id)? else {
            return Err(SessionError::NotFound(id.to_string()));
        };
        let envelope: Envelope = serde_json::from_slice(value.value())?;
        if envelope.expires_at <= shared::util::now_millis() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(envelope.state)
    }

    /// Replace the whole state and refresh the expiry
    pub fn update(&self, id: &str, state: &SessionState) -> SessionResult<()> {
        self.write(id, state)
    }

    /// Remove a session, returning its last state (expired or not)
    pub fn delete(&self, id: &str) -> SessionResult<Option<SessionState>> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SESSIONS_TABLE)?;
            let removed = table.remove(id)?;
            match removed {
                Some(value) => Some(serde_json::from_slice::<Envelope>(value.value())?.state),
                None => None,
            }
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Remove every session whose expiry is at or before `now` (Unix millis)
    /// and return their states
    pub fn purge_expired(&self, now: i64) -> SessionResult<Vec<(String, SessionState)>> {
        let txn = self.db.begin_write()?;
        let mut expired = Vec::new();
        {
            let mut table = txn.open_table(SESSIONS_TABLE)?;
            for result in table.iter()? {
                let (key, value) = result?;
                match serde_json::from_slice::<Envelope>(value.value()) {
                    Ok(envelope) if envelope.expires_at <= now => {
                        expired.push((key.value().to_string(), Some(envelope.state)));
                    }
                    Ok(_) => {}
                    // unreadable entries are dropped as well
                    Err(_) => expired.push((key.value().to_string(), None)),
                }
            }
            for (id, _) in &expired {
                table.remove(id.as_str())?;
            }
        }
        txn.commit()?;
        Ok(expired
            .into_iter()
            .filter_map(|(id, state)| state.map(|s| (id, s)))
            .collect())
    }

    /// Number of stored sessions, expired ones included
    pub fn len(&self) -> SessionResult<u64> {
        use redb::ReadableTableMetadata;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS_TABLE)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> SessionResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::open_in_memory(Duration::from_secs(86_400)).unwrap()
    }

    #[test]
    fn test_generate_id() {
        let id = generate_id();
        assert_eq!(id.len(), IMPORT_ID_LEN);
        assert!(is_valid_id(&id));
        assert_ne!(id, generate_id());
        assert!(!is_valid_id("ABCDEFGHIJKL"));
        assert!(!is_valid_id("../../etc"));
        assert!(!is_valid_id(""));
    }

    #[test]
    fn test_create_read_update_delete() {
        let store = store();
        let id = generate_id();
        let mut state = SessionState::new("/tmp/porter-temp-x".into(), 12, true, 5);
        store.create(&id, &state).unwrap();

        let read = store.read(&id).unwrap();
        assert_eq!(read, state);

        state.processed = 5;
        state.media_map.insert("a.jpg".into(), 42);
        store.update(&id, &state).unwrap();
        assert_eq!(store.read(&id).unwrap().media_map["a.jpg"], 42);

        let removed = store.delete(&id).unwrap().unwrap();
        assert_eq!(removed.processed, 5);
        assert!(matches!(store.read(&id), Err(SessionError::NotFound(_))));
        assert!(store.delete(&id).unwrap().is_none());
    }

    #[test]
    fn test_unknown_and_invalid_ids() {
        let store = store();
        assert!(matches!(store.read("000000000000"), Err(SessionError::NotFound(_))));
        assert!(matches!(store.read("nope"), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_expired_sessions_read_as_missing_and_purge() {
        let store = SessionStore::open_in_memory(Duration::ZERO).unwrap();
        let id = generate_id();
        store
            .create(&id, &SessionState::new("/tmp/x".into(), 1, false, 5))
            .unwrap();
        assert!(matches!(store.read(&id), Err(SessionError::NotFound(_))));

        let purged = store.purge_expired(shared::util::now_millis()).unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].0, id);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_purge_keeps_live_sessions() {
        let store = store();
        let id = generate_id();
        store
            .create(&id, &SessionState::new("/tmp/x".into(), 1, false, 5))
            .unwrap();
        assert!(store.purge_expired(shared::util::now_millis()).unwrap().is_empty());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.redb");
        let id = generate_id();
        {
            let store = SessionStore::open(&path, Duration::from_secs(60)).unwrap();
            store
                .create(&id, &SessionState::new(dir.path().into(), 3, false, 5))
                .unwrap();
        }
        let store = SessionStore::open(&path, Duration::from_secs(60)).unwrap();
        assert_eq!(store.read(&id).unwrap().total, 3);
    }
}
