use async_trait::async_trait;
use uuid::Uuid;

use crate::database::manager::DatabaseError;

use super::parser::ExtractedData;
use super::record::{NewUpload, UploadRecord};

/// Per-user usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCounter {
    FilesUploaded,
    ChartsCreated,
}

impl UserCounter {
    /// Column backing the counter in the users table
    pub fn column(&self) -> &'static str {
        match self {
            UserCounter::FilesUploaded => "files_uploaded",
            UserCounter::ChartsCreated => "charts_created",
        }
    }
}

/// Durable writes the ingestion pipeline depends on. Each call is a single-row write.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Persist a new record in the `processing` state.
    async fn create_upload(&self, fields: NewUpload) -> Result<UploadRecord, DatabaseError>;

    /// `processing -> completed`. Errors if the record is not processing.
    async fn mark_completed(&self, id: Uuid, data: &ExtractedData) -> Result<(), DatabaseError>;

    /// `processing -> failed`. Errors if the record is not processing.
    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), DatabaseError>;

    /// Atomically add one to a user counter. Returns false when the user does not exist.
    async fn increment_user_counter(&self, user_id: Uuid, counter: UserCounter) -> Result<bool, DatabaseError>;
}
