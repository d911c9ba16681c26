use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::ingest::{
    ExtractedData, NewUpload, TransitionError, UploadRecord, UploadState, UploadStatus, UploadStore,
    UserCounter,
};

/// Raw `file_uploads` row
#[derive(Debug, Clone, FromRow)]
pub struct UploadRow {
    pub id: Uuid,
    pub original_name: String,
    pub stored_name: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub owner_id: Uuid,
    pub status: String,
    pub extracted_data: Option<serde_json::Value>,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UploadRow> for UploadRecord {
    type Error = DatabaseError;

    fn try_from(row: UploadRow) -> Result<Self, Self::Error> {
        let status = UploadStatus::parse(&row.status)
            .ok_or_else(|| DatabaseError::QueryError(format!("unknown upload status '{}'", row.status)))?;
        let extracted = row
            .extracted_data
            .map(serde_json::from_value::<ExtractedData>)
            .transpose()?;
        let state = UploadState::from_parts(status, extracted, row.processing_error)?;

        Ok(UploadRecord {
            id: row.id,
            original_name: row.original_name,
            stored_name: row.stored_name,
            media_type: row.media_type,
            size_bytes: row.size_bytes,
            owner_id: row.owner_id,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Listing view of an upload; omits the extracted sheets
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub id: Uuid,
    pub original_name: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub owner_id: Uuid,
    pub status: String,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full API view of an upload record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadView {
    pub id: Uuid,
    pub original_name: String,
    pub stored_name: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub owner_id: Uuid,
    pub status: UploadStatus,
    pub extracted_data: Option<ExtractedData>,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UploadRecord> for UploadView {
    fn from(record: UploadRecord) -> Self {
        let status = record.status();
        let (extracted_data, processing_error) = match record.state {
            UploadState::Completed(data) => (Some(data), None),
            UploadState::Failed(message) => (None, Some(message)),
            UploadState::Pending | UploadState::Processing => (None, None),
        };
        Self {
            id: record.id,
            original_name: record.original_name,
            stored_name: record.stored_name,
            media_type: record.media_type,
            size_bytes: record.size_bytes,
            owner_id: record.owner_id,
            status,
            extracted_data,
            processing_error,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

const UPLOAD_COLUMNS: &str = "id, original_name, stored_name, media_type, size_bytes, owner_id, \
     status, extracted_data, processing_error, created_at, updated_at";

/// PostgreSQL-backed upload persistence
#[derive(Clone)]
pub struct PgUploadStore {
    pool: PgPool,
}

impl PgUploadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<UploadRecord>, DatabaseError> {
        let sql = format!("SELECT {} FROM file_uploads WHERE id = $1", UPLOAD_COLUMNS);
        let row = sqlx::query_as::<_, UploadRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(UploadRecord::try_from).transpose()
    }

    /// Newest first, without extracted data
    pub async fn history(&self, owner_id: Uuid) -> Result<Vec<UploadSummary>, DatabaseError> {
        let rows = sqlx::query_as::<_, UploadSummary>(
            "SELECT id, original_name, media_type, size_bytes, owner_id, status,
                    processing_error, created_at, updated_at
             FROM file_uploads
             WHERE owner_id = $1
             ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM file_uploads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stored names for every upload of a user, used to clean storage before cascading deletes
    pub async fn stored_names_for_owner(&self, owner_id: Uuid) -> Result<Vec<String>, DatabaseError> {
        let names: Vec<(String,)> = sqlx::query_as("SELECT stored_name FROM file_uploads WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(names.into_iter().map(|(n,)| n).collect())
    }

    /// Explain a zero-row conditional update: missing record or wrong state
    async fn transition_failure(&self, id: Uuid, to: UploadStatus) -> DatabaseError {
        let current: Result<Option<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT status FROM file_uploads WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;

        match current {
            Ok(Some((status,))) => match UploadStatus::parse(&status) {
                Some(from) => TransitionError::NotProcessing { from, to }.into(),
                None => DatabaseError::QueryError(format!("unknown upload status '{}'", status)),
            },
            Ok(None) => DatabaseError::NotFound(format!("Upload {} not found", id)),
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl UploadStore for PgUploadStore {
    async fn create_upload(&self, fields: NewUpload) -> Result<UploadRecord, DatabaseError> {
        let sql = format!(
            "INSERT INTO file_uploads (id, original_name, stored_name, media_type, size_bytes, owner_id, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            UPLOAD_COLUMNS
        );
        let row = sqlx::query_as::<_, UploadRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&fields.original_name)
            .bind(&fields.stored_name)
            .bind(&fields.media_type)
            .bind(fields.size_bytes)
            .bind(fields.owner_id)
            .bind(UploadStatus::Processing.as_str())
            .fetch_one(&self.pool)
            .await?;
        UploadRecord::try_from(row)
    }

    async fn mark_completed(&self, id: Uuid, data: &ExtractedData) -> Result<(), DatabaseError> {
        let payload = serde_json::to_value(data)?;
        let result = sqlx::query(
            "UPDATE file_uploads
             SET status = 'completed', extracted_data = $2, processing_error = NULL, updated_at = now()
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_failure(id, UploadStatus::Completed).await);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE file_uploads
             SET status = 'failed', processing_error = $2, updated_at = now()
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_failure(id, UploadStatus::Failed).await);
        }
        Ok(())
    }

    async fn increment_user_counter(&self, user_id: Uuid, counter: UserCounter) -> Result<bool, DatabaseError> {
        // Single-statement increment; concurrent uploads cannot lose updates
        let sql = format!(
            "UPDATE users SET {col} = {col} + 1, updated_at = now() WHERE id = $1",
            col = counter.column()
        );
        let result = sqlx::query(&sql).bind(user_id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(status: &str, extracted: Option<serde_json::Value>, error: Option<&str>) -> UploadRow {
        UploadRow {
            id: Uuid::new_v4(),
            original_name: "sales.xlsx".to_string(),
            stored_name: "x.xlsx".to_string(),
            media_type: "text/csv".to_string(),
            size_bytes: 10,
            owner_id: Uuid::new_v4(),
            status: status.to_string(),
            extracted_data: extracted,
            processing_error: error.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn completed_row_decodes_extracted_data() {
        let extracted = json!({
            "sheets": [{"name": "Sheet1", "rows": [["Month", "Sales"], ["Jan", 100]], "rowCount": 2, "columnCount": 2}],
            "summary": {"totalSheets": 1, "totalRows": 2, "totalColumns": 2}
        });
        let record = UploadRecord::try_from(row("completed", Some(extracted), None)).unwrap();
        let data = record.state.extracted_data().unwrap();
        assert_eq!(data.sheets[0].name, "Sheet1");
        assert_eq!(data.summary.total_rows, 2);
    }

    #[test]
    fn inconsistent_row_is_rejected() {
        let err = UploadRecord::try_from(row("completed", None, Some("oops"))).unwrap_err();
        assert!(matches!(err, DatabaseError::Transition(TransitionError::Inconsistent(UploadStatus::Completed))));

        let err = UploadRecord::try_from(row("archived", None, None)).unwrap_err();
        assert!(matches!(err, DatabaseError::QueryError(_)));
    }

    #[test]
    fn view_exposes_payload_for_state() {
        let record = UploadRecord::try_from(row("failed", None, Some("bad zip"))).unwrap();
        let view = serde_json::to_value(UploadView::from(record)).unwrap();
        assert_eq!(view["status"], "failed");
        assert_eq!(view["processingError"], "bad zip");
        assert!(view["extractedData"].is_null());
    }
}
