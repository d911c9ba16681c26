use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::database::manager::DatabaseError;

use super::parser::{self, SheetFormat};
use super::projector::{self, ChartProjection};
use super::record::NewUpload;
use super::store::{UploadStore, UserCounter};

/// An uploaded file whose bytes have already been written to storage
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub stored_name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub projection: Option<ChartProjection>,
    pub record_id: Uuid,
    pub sheet_count: usize,
    pub total_rows: usize,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Invalid file type '{0}'. Only Excel and CSV files are allowed.")]
    UnsupportedMediaType(String),

    #[error("{message}")]
    ProcessingFailed { record_id: Uuid, message: String },

    /// The record exists but its state update could not be written
    #[error("Failed to update upload {record_id}: {source}")]
    RecordUpdate { record_id: Uuid, source: DatabaseError },

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl IngestError {
    /// Whether an upload record exists for the failed ingestion. When it does
    /// not, the stored file has no owner and should be removed by the caller.
    pub fn record_created(&self) -> bool {
        matches!(
            self,
            IngestError::ProcessingFailed { .. } | IngestError::RecordUpdate { .. }
        )
    }
}

/// upload -> record -> parse -> project -> record update -> counters
pub struct IngestPipeline<S> {
    store: S,
}

impl<S: UploadStore> IngestPipeline<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn ingest(
        &self,
        file: Option<IncomingFile>,
        owner_id: Option<Uuid>,
    ) -> Result<IngestOutcome, IngestError> {
        let file = file.ok_or_else(|| IngestError::InvalidRequest("No file uploaded".to_string()))?;
        let owner_id = owner_id
            .ok_or_else(|| IngestError::InvalidRequest("Owner is required for upload".to_string()))?;

        SheetFormat::from_media_type(&file.media_type)
            .map_err(|_| IngestError::UnsupportedMediaType(file.media_type.clone()))?;

        let record = self
            .store
            .create_upload(NewUpload {
                original_name: file.original_name.clone(),
                stored_name: file.stored_name.clone(),
                media_type: file.media_type.clone(),
                size_bytes: file.bytes.len() as i64,
                owner_id,
            })
            .await?;

        tracing::info!(
            "Upload {} created for user {}: {} ({} bytes)",
            record.id, owner_id, file.original_name, record.size_bytes
        );

        let extracted = match parser::parse(&file.bytes, &file.media_type) {
            Ok(data) => data,
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("Upload {} failed to parse: {}", record.id, message);
                self.store
                    .mark_failed(record.id, &message)
                    .await
                    .map_err(|source| IngestError::RecordUpdate { record_id: record.id, source })?;
                return Err(IngestError::ProcessingFailed { record_id: record.id, message });
            }
        };

        if let Err(e) = self.store.mark_completed(record.id, &extracted).await {
            // A record left in processing never resolves; fail it instead
            tracing::error!("Upload {} could not store extracted data: {}", record.id, e);
            let message = "Failed to store extracted data".to_string();
            self.store
                .mark_failed(record.id, &message)
                .await
                .map_err(|source| IngestError::RecordUpdate { record_id: record.id, source })?;
            return Err(IngestError::ProcessingFailed { record_id: record.id, message });
        }

        let projection = projector::project(&extracted);
        self.bump_upload_counter(owner_id).await;

        tracing::info!(
            "Upload {} completed: {} sheet(s), {} row(s)",
            record.id, extracted.summary.total_sheets, extracted.summary.total_rows
        );

        Ok(IngestOutcome {
            projection,
            record_id: record.id,
            sheet_count: extracted.sheets.len(),
            total_rows: extracted.summary.total_rows,
        })
    }

    /// Fire-and-forget: failures are logged and never reach the caller.
    async fn bump_upload_counter(&self, owner_id: Uuid) {
        match self
            .store
            .increment_user_counter(owner_id, UserCounter::FilesUploaded)
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Upload counter skipped: user {} not found", owner_id),
            Err(e) => tracing::warn!("Upload counter update failed for user {}: {}", owner_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parser::{CSV_MEDIA_TYPE, XLSX_MEDIA_TYPE};
    use crate::ingest::record::{UploadState, UploadStatus};
    use crate::testing::MemoryUploadStore;

    fn csv_file(body: &'static str) -> IncomingFile {
        IncomingFile {
            original_name: "sales.csv".to_string(),
            stored_name: "stored-sales.csv".to_string(),
            media_type: CSV_MEDIA_TYPE.to_string(),
            bytes: Bytes::from_static(body.as_bytes()),
        }
    }

    #[tokio::test]
    async fn ingests_csv_and_completes_record() {
        let store = MemoryUploadStore::new();
        let owner = store.add_user();
        let pipeline = IngestPipeline::new(store.clone());

        let outcome = pipeline
            .ingest(Some(csv_file("Month,Sales\nJan,100\nFeb,200\n")), Some(owner))
            .await
            .unwrap();

        let projection = outcome.projection.unwrap();
        assert_eq!(projection.labels, vec!["Jan", "Feb"]);
        assert_eq!(projection.dataset.values, vec![100.0, 200.0]);
        assert_eq!(projection.dataset.label, "Sales");
        assert_eq!(outcome.sheet_count, 1);
        assert_eq!(outcome.total_rows, 3);

        let record = store.record(outcome.record_id).unwrap();
        assert_eq!(record.status(), UploadStatus::Completed);
        assert_eq!(record.owner_id, owner);
        assert_eq!(record.stored_name, "stored-sales.csv");
        assert_eq!(store.files_uploaded(owner), Some(1));
    }

    #[tokio::test]
    async fn corrupt_workbook_marks_record_failed() {
        let store = MemoryUploadStore::new();
        let owner = store.add_user();
        let pipeline = IngestPipeline::new(store.clone());

        let file = IncomingFile {
            original_name: "broken.xlsx".to_string(),
            stored_name: "stored-broken.xlsx".to_string(),
            media_type: XLSX_MEDIA_TYPE.to_string(),
            bytes: Bytes::from_static(b"this is not a workbook"),
        };

        let err = pipeline.ingest(Some(file), Some(owner)).await.unwrap_err();
        let IngestError::ProcessingFailed { record_id, message } = &err else {
            panic!("expected ProcessingFailed, got {err:?}");
        };
        assert!(err.record_created());

        let record = store.record(*record_id).unwrap();
        match &record.state {
            UploadState::Failed(stored) => assert_eq!(stored, message),
            other => panic!("expected failed state, got {other:?}"),
        }
        assert_eq!(store.files_uploaded(owner), Some(0));
    }

    #[tokio::test]
    async fn missing_inputs_persist_nothing() {
        let store = MemoryUploadStore::new();
        let owner = store.add_user();
        let pipeline = IngestPipeline::new(store.clone());

        let err = pipeline.ingest(None, Some(owner)).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidRequest(_)));
        assert!(!err.record_created());

        let err = pipeline.ingest(Some(csv_file("a,b\n")), None).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidRequest(_)));

        assert_eq!(store.record_count(), 0);
    }

    #[tokio::test]
    async fn unsupported_media_type_persists_nothing() {
        let store = MemoryUploadStore::new();
        let owner = store.add_user();
        let pipeline = IngestPipeline::new(store.clone());

        let mut file = csv_file("a,b\n");
        file.media_type = "application/pdf".to_string();

        let err = pipeline.ingest(Some(file), Some(owner)).await.unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedMediaType(ref t) if t == "application/pdf"));
        assert_eq!(store.record_count(), 0);
    }

    #[tokio::test]
    async fn header_only_file_completes_without_projection() {
        let store = MemoryUploadStore::new();
        let owner = store.add_user();
        let pipeline = IngestPipeline::new(store.clone());

        let outcome = pipeline.ingest(Some(csv_file("Month,Sales\n")), Some(owner)).await.unwrap();
        assert!(outcome.projection.is_none());
        assert_eq!(store.record(outcome.record_id).unwrap().status(), UploadStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_owner_is_tolerated() {
        let store = MemoryUploadStore::new();
        let pipeline = IngestPipeline::new(store.clone());
        let stranger = Uuid::new_v4();

        let outcome = pipeline
            .ingest(Some(csv_file("k,v\nx,1\n")), Some(stranger))
            .await
            .unwrap();

        assert_eq!(store.record(outcome.record_id).unwrap().status(), UploadStatus::Completed);
        assert_eq!(store.files_uploaded(stranger), None);
    }

    #[tokio::test]
    async fn counter_failure_does_not_fail_ingestion() {
        let store = MemoryUploadStore::new();
        let owner = store.add_user();
        store.fail_counter_updates();
        let pipeline = IngestPipeline::new(store.clone());

        let outcome = pipeline.ingest(Some(csv_file("k,v\nx,1\n")), Some(owner)).await;
        assert!(outcome.is_ok());
        assert_eq!(store.files_uploaded(owner), Some(0));
    }

    #[tokio::test]
    async fn nul_cells_are_stored_without_escape() {
        let store = MemoryUploadStore::new();
        let owner = store.add_user();
        store.reject_nul_payloads();
        let pipeline = IngestPipeline::new(store.clone());

        let outcome = pipeline
            .ingest(Some(csv_file("Label,Value\nx\0,1\n")), Some(owner))
            .await
            .unwrap();

        assert_eq!(outcome.projection.unwrap().labels, vec!["x"]);
        assert_eq!(store.record(outcome.record_id).unwrap().status(), UploadStatus::Completed);
    }

    #[tokio::test]
    async fn rejected_completion_marks_record_failed() {
        let store = MemoryUploadStore::new();
        let owner = store.add_user();
        store.fail_completions();
        let pipeline = IngestPipeline::new(store.clone());

        let err = pipeline
            .ingest(Some(csv_file("k,v\nx,1\n")), Some(owner))
            .await
            .unwrap_err();
        let IngestError::ProcessingFailed { record_id, .. } = &err else {
            panic!("expected ProcessingFailed, got {err:?}");
        };

        let record = store.record(*record_id).unwrap();
        assert_eq!(record.status(), UploadStatus::Failed);
        assert_eq!(store.files_uploaded(owner), Some(0));
    }

    #[tokio::test]
    async fn every_upload_gets_a_fresh_record() {
        let store = MemoryUploadStore::new();
        let owner = store.add_user();
        let pipeline = IngestPipeline::new(store.clone());

        let first = pipeline.ingest(Some(csv_file("k,v\nx,1\n")), Some(owner)).await.unwrap();
        let second = pipeline.ingest(Some(csv_file("k,v\nx,1\n")), Some(owner)).await.unwrap();

        assert_ne!(first.record_id, second.record_id);
        assert_eq!(store.record_count(), 2);
        assert_eq!(store.files_uploaded(owner), Some(2));
    }
}
