//! Batch orchestrator
//!
//! `setup` unpacks a package into `imports/porter-temp-<id>` and stores the
//! session. `process_batch` re-reads the manifest and reconciles one slice
//! per call. `cleanup` drops the working directory and the session.
//!
//! Calls are independent: the only state carried between them is the
//! session value, written back whole after each batch.

use super::error::{ImportError, ImportResult};
use super::reconcile::Reconciler;
use super::session::{SessionState, SessionStore, generate_id, is_valid_id};
use crate::archive;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Working directory name prefix; the import id follows
pub const WORK_DIR_PREFIX: &str = "porter-temp-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupResult {
    pub import_id: String,
    pub total_products: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub logs: Vec<String>,
    /// Records handled by this call
    pub processed: usize,
    /// Session-wide progress after this call
    pub processed_total: usize,
    pub total: usize,
    pub completed: bool,
}

/// What a sweep removed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_sessions: usize,
    pub orphan_dirs: usize,
}

pub struct Importer {
    reconciler: Reconciler,
    sessions: SessionStore,
    imports_dir: PathBuf,
    batch_size: usize,
}

impl Importer {
    pub fn new(
        reconciler: Reconciler,
        sessions: SessionStore,
        imports_dir: impl Into<PathBuf>,
        batch_size: usize,
    ) -> Self {
        Self {
            reconciler,
            sessions,
            imports_dir: imports_dir.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    fn working_dir(&self, import_id: &str) -> PathBuf {
        self.imports_dir.join(format!("{WORK_DIR_PREFIX}{import_id}"))
    }

    /// Unpack a package and open a session for it
    pub async fn setup(&self, package: Vec<u8>, update_existing: bool) -> ImportResult<SetupResult> {
        if package.is_empty() {
            return Err(ImportError::MissingFile);
        }

        tokio::fs::create_dir_all(&self.imports_dir)
            .await
            .map_err(ImportError::UploadDir)?;
        let import_id = generate_id();
        let dir = self.working_dir(&import_id);
        tokio::fs::create_dir(&dir)
            .await
            .map_err(ImportError::UploadDir)?;

        let total = match unpack_package(package, dir.clone()).await {
            Ok(total) => total,
            Err(e) => {
                remove_dir_quietly(&dir).await;
                return Err(e);
            }
        };

        let state = SessionState::new(dir.clone(), total, update_existing, self.batch_size);
        if let Err(e) = self.sessions.create(&import_id, &state) {
            remove_dir_quietly(&dir).await;
            return Err(e.into());
        }

        tracing::info!(import_id = %import_id, total, update_existing, "Import session created");
        crate::audit_log!(
            "import.setup",
            import_id.as_str(),
            format!("total={total} update_existing={update_existing}")
        );

        Ok(SetupResult {
            import_id,
            total_products: total,
            batch_size: state.batch_size,
        })
    }

    /// Reconcile batch `batch_number` (1-based) of a session.
    ///
    /// A batch past the end is a no-op. Progress only moves forward, so
    /// repeating a batch number is safe.
    pub async fn process_batch(&self, import_id: &str, batch_number: usize) -> ImportResult<BatchResult> {
        let mut state = self.sessions.read(import_id)?;

        let dir = state.dir.clone();
        let records = tokio::task::spawn_blocking(move || archive::read_manifest(&dir)).await??;

        let batch_size = state.batch_size.max(1);
        let offset = batch_number.max(1).saturating_sub(1).saturating_mul(batch_size);
        let batch: Vec<_> = records.into_iter().skip(offset).take(batch_size).collect();

        if batch.is_empty() {
            return Ok(BatchResult {
                logs: Vec::new(),
                processed: 0,
                processed_total: state.processed,
                total: state.total,
                completed: state.is_complete(),
            });
        }

        let mut logs = Vec::with_capacity(batch.len());
        for (i, entry) in batch.into_iter().enumerate() {
            let outcome = self.reconciler.reconcile(entry, &mut state).await;
            if outcome.is_error() {
                tracing::warn!(import_id, position = offset + i + 1, "{outcome}");
            } else {
                tracing::debug!(import_id, position = offset + i + 1, "{outcome}");
            }
            logs.push(outcome.to_string());
        }

        let processed_now = logs.len();
        state.processed = state
            .processed
            .max((offset + processed_now).min(state.total));
        self.sessions.update(import_id, &state)?;

        let completed = state.is_complete();
        tracing::info!(
            import_id,
            batch = batch_number,
            processed = processed_now,
            processed_total = state.processed,
            total = state.total,
            "Import batch processed"
        );
        if completed {
            crate::audit_log!("import.completed", import_id, format!("total={}", state.total));
        }

        Ok(BatchResult {
            logs,
            processed: processed_now,
            processed_total: state.processed,
            total: state.total,
            completed,
        })
    }

    /// Drop a session and its working directory. Unknown ids are fine.
    pub async fn cleanup(&self, import_id: &str) {
        match self.sessions.delete(import_id) {
            Ok(Some(state)) => {
                self.remove_working_dir(&state.dir).await;
                tracing::info!(import_id, "Import session cleaned up");
                crate::audit_log!("import.cleanup", import_id);
            }
            Ok(None) => {
                // expired and purged, or never existed; the directory may remain
                if is_valid_id(import_id) {
                    self.remove_working_dir(&self.working_dir(import_id)).await;
                }
            }
            Err(e) => tracing::warn!(import_id, error = %e, "Failed to delete import session"),
        }
    }

    /// Purge expired sessions and working directories nobody owns anymore
    pub async fn sweep_expired(&self) -> ImportResult<SweepReport> {
        let mut report = SweepReport::default();

        for (import_id, state) in self.sessions.purge_expired(shared::util::now_millis())? {
            tracing::info!(import_id = %import_id, "Expired import session purged");
            self.remove_working_dir(&state.dir).await;
            report.expired_sessions += 1;
        }

        let Ok(mut entries) = tokio::fs::read_dir(&self.imports_dir).await else {
            return Ok(report);
        };
        let ttl = self.sessions.ttl();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(import_id) = name.to_str().and_then(|n| n.strip_prefix(WORK_DIR_PREFIX)) else {
                continue;
            };
            if self.sessions.read(import_id).is_ok() {
                continue;
            }
            let age = entry
                .metadata()
                .await
                .ok()
                .and_then(|meta| meta.modified().ok())
                .and_then(|modified| modified.elapsed().ok());
            if age.is_some_and(|age| age >= ttl) {
                tracing::info!(dir = %entry.path().display(), "Removing orphaned import directory");
                remove_dir_quietly(&entry.path()).await;
                report.orphan_dirs += 1;
            }
        }

        Ok(report)
    }

    async fn remove_working_dir(&self, dir: &Path) {
        if !dir.starts_with(&self.imports_dir) {
            tracing::warn!(dir = %dir.display(), "Refusing to remove directory outside the imports root");
            return;
        }
        remove_dir_quietly(dir).await;
    }
}

/// Unpack on the blocking pool and count manifest records
async fn unpack_package(package: Vec<u8>, dir: PathBuf) -> ImportResult<usize> {
    let total = tokio::task::spawn_blocking(move || -> Result<usize, archive::ArchiveError> {
        let files = archive::unpack(&package, &dir)?;
        tracing::debug!(dir = %dir.display(), files, "Package unpacked");
        Ok(archive::read_manifest(&dir)?.len())
    })
    .await??;

    if total == 0 {
        return Err(ImportError::EmptyPackage);
    }
    Ok(total)
}

async fn remove_dir_quietly(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove directory"),
    }
}
