use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Extension,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config;
use crate::database::uploads::{UploadSummary, UploadView};
use crate::database::PgUploadStore;
use crate::error::ApiError;
use crate::handlers::{confirm_admin, db_pool, self_or_admin_pool};
use crate::ingest::{media_type_for_filename, ChartProjection, IncomingFile, IngestPipeline, UploadRecord};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::server::AppState;
use crate::storage::sanitize_filename;

/// The `file` part of an upload request
struct FilePart {
    original_name: String,
    media_type: String,
    bytes: bytes::Bytes,
}

/// POST /api/files/upload - store, ingest and project one spreadsheet
pub async fn upload(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> ApiResult<Option<ChartProjection>> {
    let part = read_file_part(multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let max_bytes = config::config().api.max_upload_bytes;
    if part.bytes.len() > max_bytes {
        return Err(ApiError::payload_too_large(format!(
            "File exceeds the {} byte upload limit",
            max_bytes
        )));
    }

    let pool = db_pool().await?;
    let stored_name = state.storage.save(&part.original_name, &part.bytes).await?;

    let incoming = IncomingFile {
        original_name: part.original_name.clone(),
        stored_name: stored_name.clone(),
        media_type: part.media_type,
        bytes: part.bytes,
    };

    let pipeline = IngestPipeline::new(PgUploadStore::new(pool));
    let outcome = match pipeline.ingest(Some(incoming), Some(auth.user_id)).await {
        Ok(outcome) => outcome,
        Err(err) => {
            // No record points at the stored bytes, so nothing would ever clean them up
            if !err.record_created() {
                if let Err(e) = state.storage.delete(&stored_name).await {
                    warn!("Failed to remove orphaned upload {}: {}", stored_name, e);
                }
            }
            return Err(err.into());
        }
    };

    info!("User {} uploaded {} as {}", auth.user_id, part.original_name, outcome.record_id);
    Ok(ApiResponse::success(outcome.projection).with_extra(json!({
        "message": "File uploaded and processed successfully",
        "fileId": outcome.record_id,
        "metadata": {
            "filename": part.original_name,
            "sheets": outcome.sheet_count,
            "totalRows": outcome.total_rows,
        }
    })))
}

async fn read_file_part(mut multipart: Multipart) -> Result<Option<FilePart>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = sanitize_filename(field.file_name().unwrap_or("upload"));
        let declared = field.content_type().map(normalize_media_type).unwrap_or_default();
        // Browsers commonly send octet-stream for CSV; fall back to the extension
        let media_type = if declared.is_empty() || declared == "application/octet-stream" {
            media_type_for_filename(&original_name)
                .map(str::to_string)
                .unwrap_or(declared)
        } else {
            declared
        };
        let bytes = field.bytes().await.map_err(multipart_error)?;

        return Ok(Some(FilePart {
            original_name,
            media_type,
            bytes,
        }));
    }
    Ok(None)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("File exceeds the upload limit")
    } else {
        ApiError::bad_request(err.body_text())
    }
}

/// `Text/CSV; charset=utf-8` -> `text/csv`
fn normalize_media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

/// GET /api/files/history/:user_id - newest first, extracted data omitted
pub async fn history(
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<UploadSummary>> {
    let store = PgUploadStore::new(self_or_admin_pool(&auth, user_id).await?);
    Ok(ApiResponse::success(store.history(user_id).await?))
}

/// GET /api/files/:id - full record including extracted data
pub async fn get(Extension(auth): Extension<AuthUser>, Path(id): Path<Uuid>) -> ApiResult<UploadView> {
    let pool = db_pool().await?;
    let record = find_owned(&pool, &auth, id).await?;
    Ok(ApiResponse::success(UploadView::from(record)))
}

/// DELETE /api/files/:id - remove the stored bytes, then the record
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Option<()>> {
    let pool = db_pool().await?;
    let record = find_owned(&pool, &auth, id).await?;

    state.storage.delete(&record.stored_name).await?;
    PgUploadStore::new(pool).delete(record.id).await?;

    info!("User {} deleted upload {}", auth.user_id, record.id);
    Ok(ApiResponse::success(None).with_extra(json!({"message": "File deleted successfully"})))
}

async fn find_owned(pool: &PgPool, auth: &AuthUser, id: Uuid) -> Result<UploadRecord, ApiError> {
    let record = PgUploadStore::new(pool.clone())
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;
    auth.require_self_or_admin(record.owner_id)?;
    if record.owner_id != auth.user_id {
        confirm_admin(auth, pool).await?;
    }
    Ok(record)
}
