use axum::Extension;

use crate::database::models::User;
use crate::database::UserRepository;
use crate::handlers::db_pool;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /api/auth/me - profile of the token's user, read fresh from the database
pub async fn me(Extension(auth): Extension<AuthUser>) -> ApiResult<User> {
    let users = UserRepository::new(db_pool().await?);
    Ok(ApiResponse::success(users.select_404(auth.user_id).await?))
}
