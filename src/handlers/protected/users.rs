use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::user::UserAnalytics;
use crate::database::models::{Page, PageParams, ProfileUpdate, User, UserFilter, UserRole, UserStatus};
use crate::database::{PgUploadStore, UserRepository};
use crate::error::ApiError;
use crate::handlers::{admin_pool, self_or_admin_pool};
use crate::handlers::public::auth::validate_name;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

/// GET /api/users - admin listing
pub async fn list(Extension(auth): Extension<AuthUser>, Query(query): Query<UserListQuery>) -> ApiResult<Page<User>> {
    let pool = admin_pool(&auth).await?;

    let filter = UserFilter {
        role: query.role.as_deref().map(parse_role).transpose()?,
        status: query.status.as_deref().map(parse_status).transpose()?,
        search: query.search,
    };
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };

    let users = UserRepository::new(pool);
    Ok(ApiResponse::success(users.list(&filter, params).await?))
}

/// GET /api/users/:id
pub async fn get(Extension(auth): Extension<AuthUser>, Path(id): Path<Uuid>) -> ApiResult<User> {
    let users = UserRepository::new(self_or_admin_pool(&auth, id).await?);
    Ok(ApiResponse::success(users.select_404(id).await?))
}

/// PUT /api/users/:id - profile fields only; password, role and status in the body are ignored
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(mut body): Json<ProfileUpdate>,
) -> ApiResult<User> {
    auth.require_self_or_admin(id)?;
    if let Some(name) = body.name.take() {
        body.name = Some(validate_name(Some(&name))?);
    }

    let users = UserRepository::new(self_or_admin_pool(&auth, id).await?);
    Ok(ApiResponse::success(users.update_profile(id, &body).await?))
}

/// DELETE /api/users/:id - cascades to charts and uploads
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Option<()>> {
    let pool = admin_pool(&auth).await?;
    let users = UserRepository::new(pool.clone());
    users.select_404(id).await?;

    let stored_names = PgUploadStore::new(pool).stored_names_for_owner(id).await?;
    users.delete(id).await?;

    for name in stored_names {
        if let Err(e) = state.storage.delete(&name).await {
            warn!("Failed to remove stored file {} of deleted user {}: {}", name, id, e);
        }
    }

    info!("Admin {} deleted user {}", auth.user_id, id);
    Ok(ApiResponse::success(None).with_extra(json!({"message": "User deleted successfully"})))
}

/// PATCH /api/users/:id/role
pub async fn set_role(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleRequest>,
) -> ApiResult<User> {
    auth.require_admin()?;
    let role = parse_role(body.role.as_deref().unwrap_or_default())?;

    let users = UserRepository::new(admin_pool(&auth).await?);
    let user = users.set_role(id, role).await?;
    info!("Admin {} set role of {} to {}", auth.user_id, id, role.as_str());
    Ok(ApiResponse::success(user))
}

/// PATCH /api/users/:id/status
pub async fn set_status(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<User> {
    auth.require_admin()?;
    let status = parse_status(body.status.as_deref().unwrap_or_default())?;

    let users = UserRepository::new(admin_pool(&auth).await?);
    let user = users.set_status(id, status).await?;
    info!("Admin {} set status of {} to {}", auth.user_id, id, status.as_str());
    Ok(ApiResponse::success(user))
}

/// GET /api/users/:id/analytics
pub async fn analytics(Extension(auth): Extension<AuthUser>, Path(id): Path<Uuid>) -> ApiResult<UserAnalytics> {
    let users = UserRepository::new(self_or_admin_pool(&auth, id).await?);
    Ok(ApiResponse::success(users.analytics(id).await?))
}

fn parse_role(value: &str) -> Result<UserRole, ApiError> {
    UserRole::parse(value).ok_or_else(|| ApiError::invalid_field("role", "Role must be 'user' or 'admin'"))
}

fn parse_status(value: &str) -> Result<UserStatus, ApiError> {
    UserStatus::parse(value)
        .ok_or_else(|| ApiError::invalid_field("status", "Status must be 'active', 'inactive' or 'suspended'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_update_ignores_privileged_fields() {
        let update: ProfileUpdate = serde_json::from_value(json!({
            "name": "Ada",
            "role": "admin",
            "status": "active",
            "password": "hunter22"
        }))
        .unwrap();
        assert_eq!(update.name.as_deref(), Some("Ada"));
        assert!(update.avatar.is_none());
        assert!(update.preferences.is_none());
    }

    #[test]
    fn role_and_status_validation() {
        assert_eq!(parse_role("admin").unwrap(), UserRole::Admin);
        assert_eq!(parse_role("root").unwrap_err().status_code(), 400);
        assert_eq!(parse_status("inactive").unwrap(), UserStatus::Inactive);
        assert!(parse_status("").is_err());
    }
}
