use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::ingest::{ExtractedData, NewUpload, UploadRecord, UploadStore, UserCounter};

#[derive(Default)]
struct MemoryState {
    uploads: HashMap<Uuid, UploadRecord>,
    files_uploaded: HashMap<Uuid, i64>,
}

/// In-memory UploadStore for pipeline tests. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryUploadStore {
    state: Arc<Mutex<MemoryState>>,
    fail_counters: Arc<AtomicBool>,
    fail_completions: Arc<AtomicBool>,
    reject_nul: Arc<AtomicBool>,
}

impl MemoryUploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with zeroed counters and return its id
    pub fn add_user(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().files_uploaded.insert(id, 0);
        id
    }

    /// Make every subsequent counter update return an error
    pub fn fail_counter_updates(&self) {
        self.fail_counters.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent `mark_completed` return an error
    pub fn fail_completions(&self) {
        self.fail_completions.store(true, Ordering::SeqCst);
    }

    /// Refuse completed payloads whose JSON carries a `\u0000` escape, as jsonb does
    pub fn reject_nul_payloads(&self) {
        self.reject_nul.store(true, Ordering::SeqCst);
    }

    pub fn record(&self, id: Uuid) -> Option<UploadRecord> {
        self.state.lock().unwrap().uploads.get(&id).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().uploads.len()
    }

    pub fn files_uploaded(&self, user_id: Uuid) -> Option<i64> {
        self.state.lock().unwrap().files_uploaded.get(&user_id).copied()
    }

    fn with_record<F>(&self, id: Uuid, f: F) -> Result<(), DatabaseError>
    where
        F: FnOnce(&mut UploadRecord) -> Result<(), crate::ingest::TransitionError>,
    {
        let mut state = self.state.lock().unwrap();
        let record = state
            .uploads
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("Upload {} not found", id)))?;
        f(record)?;
        Ok(())
    }
}

#[async_trait]
impl UploadStore for MemoryUploadStore {
    async fn create_upload(&self, fields: NewUpload) -> Result<UploadRecord, DatabaseError> {
        let record = UploadRecord::new(Uuid::new_v4(), fields, Utc::now());
        self.state.lock().unwrap().uploads.insert(record.id, record.clone());
        Ok(record)
    }

    async fn mark_completed(&self, id: Uuid, data: &ExtractedData) -> Result<(), DatabaseError> {
        if self.fail_completions.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("completion refused".to_string()));
        }
        if self.reject_nul.load(Ordering::SeqCst) && serde_json::to_string(data)?.contains("\\u0000") {
            return Err(DatabaseError::QueryError("unsupported Unicode escape sequence".to_string()));
        }
        self.with_record(id, |record| record.complete(data.clone(), Utc::now()))
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), DatabaseError> {
        self.with_record(id, |record| record.fail(message, Utc::now()))
    }

    async fn increment_user_counter(&self, user_id: Uuid, counter: UserCounter) -> Result<bool, DatabaseError> {
        if self.fail_counters.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError(format!("{} update refused", counter.column())));
        }
        let mut state = self.state.lock().unwrap();
        match (counter, state.files_uploaded.get_mut(&user_id)) {
            (UserCounter::FilesUploaded, Some(count)) => {
                *count += 1;
                Ok(true)
            }
            (_, Some(_)) => Ok(true),
            (_, None) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(owner_id: Uuid) -> NewUpload {
        NewUpload {
            original_name: "a.csv".to_string(),
            stored_name: "b.csv".to_string(),
            media_type: "text/csv".to_string(),
            size_bytes: 3,
            owner_id,
        }
    }

    #[tokio::test]
    async fn guards_repeat_transitions() {
        let store = MemoryUploadStore::new();
        let owner = store.add_user();
        let record = store.create_upload(fields(owner)).await.unwrap();

        store.mark_failed(record.id, "boom").await.unwrap();
        let err = store.mark_completed(record.id, &ExtractedData::default()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Transition(_)));
    }

    #[tokio::test]
    async fn unknown_record_is_not_found() {
        let store = MemoryUploadStore::new();
        let err = store.mark_failed(Uuid::new_v4(), "boom").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }
}
