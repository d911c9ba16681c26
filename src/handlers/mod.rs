// HTTP handlers
//
// public/     token acquisition, no authentication
// protected/  everything under /api/* that requires a bearer JWT

pub mod protected;
pub mod public;

use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{DatabaseManager, UserRepository};
use crate::error::ApiError;
use crate::middleware::AuthUser;

/// Shared pool for handlers; connection problems surface as 503
pub(crate) async fn db_pool() -> Result<PgPool, ApiError> {
    Ok(DatabaseManager::pool().await?)
}

/// Check the token's admin role against the stored account, so a demotion
/// or suspension takes effect before the token expires
pub(crate) async fn confirm_admin(auth: &AuthUser, pool: &PgPool) -> Result<(), ApiError> {
    let account = UserRepository::new(pool.clone()).find_by_id(auth.user_id).await?;
    auth.confirmed_by(account.as_ref())?.require_admin()
}

/// Pool for an admin-only operation
pub(crate) async fn admin_pool(auth: &AuthUser) -> Result<PgPool, ApiError> {
    auth.require_admin()?;
    let pool = db_pool().await?;
    confirm_admin(auth, &pool).await?;
    Ok(pool)
}

/// Pool for an operation on `user_id`'s data by that user or an admin
pub(crate) async fn self_or_admin_pool(auth: &AuthUser, user_id: Uuid) -> Result<PgPool, ApiError> {
    auth.require_self_or_admin(user_id)?;
    let pool = db_pool().await?;
    if auth.user_id != user_id {
        confirm_admin(auth, &pool).await?;
    }
    Ok(pool)
}
