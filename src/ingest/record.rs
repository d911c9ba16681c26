use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::parser::ExtractedData;

/// Status column values, as stored in `file_uploads.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Declared for a queued phase; the upload path never produces it.
    Pending,
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(UploadStatus::Pending),
            "processing" => Some(UploadStatus::Processing),
            "completed" => Some(UploadStatus::Completed),
            "failed" => Some(UploadStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing state. The payload travels with the state, so a completed
/// record always has extracted data and a failed one always has an error.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    Pending,
    Processing,
    Completed(ExtractedData),
    Failed(String),
}

impl UploadState {
    pub fn status(&self) -> UploadStatus {
        match self {
            UploadState::Pending => UploadStatus::Pending,
            UploadState::Processing => UploadStatus::Processing,
            UploadState::Completed(_) => UploadStatus::Completed,
            UploadState::Failed(_) => UploadStatus::Failed,
        }
    }

    pub fn extracted_data(&self) -> Option<&ExtractedData> {
        match self {
            UploadState::Completed(data) => Some(data),
            _ => None,
        }
    }

    pub fn processing_error(&self) -> Option<&str> {
        match self {
            UploadState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Rebuild a state from its stored columns, rejecting combinations the
    /// state machine cannot produce.
    pub fn from_parts(
        status: UploadStatus,
        extracted_data: Option<ExtractedData>,
        processing_error: Option<String>,
    ) -> Result<Self, TransitionError> {
        match (status, extracted_data, processing_error) {
            (UploadStatus::Pending, None, None) => Ok(UploadState::Pending),
            (UploadStatus::Processing, None, None) => Ok(UploadState::Processing),
            (UploadStatus::Completed, Some(data), None) => Ok(UploadState::Completed(data)),
            (UploadStatus::Failed, None, Some(message)) => Ok(UploadState::Failed(message)),
            (status, ..) => Err(TransitionError::Inconsistent(status)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("upload is already {from}; cannot move to {to}")]
    NotProcessing { from: UploadStatus, to: UploadStatus },

    #[error("stored upload state '{0}' does not match its payload columns")]
    Inconsistent(UploadStatus),
}

/// Fields supplied when an upload record is first persisted
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub original_name: String,
    pub stored_name: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub owner_id: Uuid,
}

/// Lifecycle record for one uploaded file
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRecord {
    pub id: Uuid,
    pub original_name: String,
    pub stored_name: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub owner_id: Uuid,
    pub state: UploadState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadRecord {
    /// New records enter directly in `processing`.
    pub fn new(id: Uuid, fields: NewUpload, now: DateTime<Utc>) -> Self {
        Self {
            id,
            original_name: fields.original_name,
            stored_name: fields.stored_name,
            media_type: fields.media_type,
            size_bytes: fields.size_bytes,
            owner_id: fields.owner_id,
            state: UploadState::Processing,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> UploadStatus {
        self.state.status()
    }

    pub fn complete(&mut self, data: ExtractedData, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_processing(UploadStatus::Completed)?;
        self.state = UploadState::Completed(data);
        self.updated_at = now;
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_processing(UploadStatus::Failed)?;
        self.state = UploadState::Failed(message.into());
        self.updated_at = now;
        Ok(())
    }

    fn ensure_processing(&self, to: UploadStatus) -> Result<(), TransitionError> {
        match self.status() {
            UploadStatus::Processing => Ok(()),
            from => Err(TransitionError::NotProcessing { from, to }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> UploadRecord {
        UploadRecord::new(
            Uuid::new_v4(),
            NewUpload {
                original_name: "sales.xlsx".to_string(),
                stored_name: "abc.xlsx".to_string(),
                media_type: "text/csv".to_string(),
                size_bytes: 12,
                owner_id: Uuid::new_v4(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn starts_processing() {
        let rec = record();
        assert_eq!(rec.status(), UploadStatus::Processing);
        assert!(rec.state.extracted_data().is_none());
        assert!(rec.state.processing_error().is_none());
    }

    #[test]
    fn completes_once() {
        let mut rec = record();
        rec.complete(ExtractedData::default(), Utc::now()).unwrap();
        assert_eq!(rec.status(), UploadStatus::Completed);
        assert!(rec.state.extracted_data().is_some());
        assert!(rec.state.processing_error().is_none());

        let err = rec.fail("late failure", Utc::now()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotProcessing { from: UploadStatus::Completed, to: UploadStatus::Failed }
        );
        assert_eq!(rec.status(), UploadStatus::Completed);
    }

    #[test]
    fn failed_record_is_terminal() {
        let mut rec = record();
        rec.fail("bad zip", Utc::now()).unwrap();
        assert_eq!(rec.state.processing_error(), Some("bad zip"));
        assert!(rec.state.extracted_data().is_none());

        assert!(rec.complete(ExtractedData::default(), Utc::now()).is_err());
        assert!(rec.fail("again", Utc::now()).is_err());
        assert_eq!(rec.state.processing_error(), Some("bad zip"));
    }

    #[test]
    fn from_parts_rejects_mixed_payloads() {
        assert!(UploadState::from_parts(UploadStatus::Completed, None, None).is_err());
        assert!(UploadState::from_parts(UploadStatus::Failed, Some(ExtractedData::default()), Some("x".into())).is_err());
        assert!(UploadState::from_parts(UploadStatus::Processing, None, Some("x".into())).is_err());
        assert_eq!(
            UploadState::from_parts(UploadStatus::Failed, None, Some("x".into())).unwrap(),
            UploadState::Failed("x".into())
        );
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [UploadStatus::Pending, UploadStatus::Processing, UploadStatus::Completed, UploadStatus::Failed] {
            assert_eq!(UploadStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(UploadStatus::parse("done"), None);
    }
}
