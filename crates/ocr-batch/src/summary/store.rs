use std::path::PathBuf;

use log::{debug, info};

use crate::error::{StorageError, SummaryError};
use crate::storage::{FileStorage, SessionRoots};
use crate::summary::BatchSummary;

/// One summary slot per session, under that session's root. Saving
/// replaces the slot; loading returns whatever was saved last.
#[derive(Debug, Clone)]
pub struct SummaryStore {
    roots: SessionRoots,
}

impl SummaryStore {
    pub fn new(roots: SessionRoots) -> Self {
        Self { roots }
    }

    pub fn save(&self, summary: &BatchSummary) -> Result<PathBuf, SummaryError> {
        let storage = FileStorage::new(self.roots.resolve(&summary.session_id)?);

        let bytes = serde_json::to_vec_pretty(summary).map_err(|e| StorageError::Serialize {
            path: storage.root().summary_path(),
            source: e,
        })?;
        let path = storage.write_summary(&bytes)?;

        info!(
            "Saved summary for batch {} (session {})",
            summary.batch_id,
            storage.root().fingerprint()
        );
        Ok(path)
    }

    pub fn load(&self, session_id: &str) -> Result<BatchSummary, SummaryError> {
        let storage = FileStorage::new(self.roots.resolve(session_id)?);

        let Some(bytes) = storage.read_summary()? else {
            debug!("No summary yet for session {}", storage.root().fingerprint());
            return Err(SummaryError::NotFound);
        };

        serde_json::from_slice(&bytes).map_err(|e| SummaryError::Corrupt {
            path: storage.root().summary_path(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::error::ValidationError;

    fn summary(session: &str, batch: &str) -> BatchSummary {
        BatchSummary::from_tasks(session, batch, Utc::now(), "eng", 0.95, &[])
    }

    #[test]
    fn test_load_without_save_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = SummaryStore::new(SessionRoots::new(temp_dir.path()));

        assert!(matches!(store.load("nobody"), Err(SummaryError::NotFound)));
    }

    #[test]
    fn test_last_write_wins() {
        let temp_dir = TempDir::new().unwrap();
        let store = SummaryStore::new(SessionRoots::new(temp_dir.path()));

        store.save(&summary("s1", "first")).unwrap();
        store.save(&summary("s1", "second")).unwrap();

        assert_eq!(store.load("s1").unwrap().batch_id, "second");
    }

    #[test]
    fn test_sessions_have_separate_slots() {
        let temp_dir = TempDir::new().unwrap();
        let store = SummaryStore::new(SessionRoots::new(temp_dir.path()));

        store.save(&summary("alice", "a1")).unwrap();
        store.save(&summary("bob", "b1")).unwrap();

        assert_eq!(store.load("alice").unwrap().batch_id, "a1");
        assert_eq!(store.load("bob").unwrap().batch_id, "b1");
        assert!(matches!(store.load("carol"), Err(SummaryError::NotFound)));
    }

    #[test]
    fn test_empty_session_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = SummaryStore::new(SessionRoots::new(temp_dir.path()));

        assert!(matches!(
            store.load(""),
            Err(SummaryError::Validation(ValidationError::EmptySession))
        ));
    }

    #[test]
    fn test_corrupt_summary_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let roots = SessionRoots::new(temp_dir.path());
        let storage = FileStorage::new(roots.resolve("s1").unwrap());
        storage.write_summary(b"{ not json").unwrap();

        let store = SummaryStore::new(roots);
        assert!(matches!(store.load("s1"), Err(SummaryError::Corrupt { .. })));
    }
}
