use axum::{
    extract::{Query, State},
    Extension,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::database::analytics::{ActivityPeriod, ChartAnalytics, Overview, UploadQueue, UserActivity};
use crate::database::{AnalyticsRepository, DatabaseManager};
use crate::handlers::{admin_pool, confirm_admin};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub database: &'static str,
    pub uploads: Option<UploadQueue>,
    pub uptime_seconds: u64,
}

/// GET /api/analytics/overview
pub async fn overview(Extension(auth): Extension<AuthUser>) -> ApiResult<Overview> {
    let analytics = AnalyticsRepository::new(admin_pool(&auth).await?);
    Ok(ApiResponse::success(analytics.overview().await?))
}

/// GET /api/analytics/user-activity?period=7d|30d|90d
pub async fn user_activity(
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<UserActivity> {
    let period = ActivityPeriod::from_query(query.period.as_deref());
    let analytics = AnalyticsRepository::new(admin_pool(&auth).await?);
    Ok(ApiResponse::success(analytics.user_activity(period).await?))
}

/// GET /api/analytics/charts
pub async fn charts(Extension(auth): Extension<AuthUser>) -> ApiResult<ChartAnalytics> {
    let analytics = AnalyticsRepository::new(admin_pool(&auth).await?);
    Ok(ApiResponse::success(analytics.charts().await?))
}

/// GET /api/analytics/health - answers even when the database is down
pub async fn health(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<SystemHealth> {
    auth.require_admin()?;

    let uptime_seconds = state.started_at.elapsed().as_secs();
    let uploads = match DatabaseManager::pool().await {
        Ok(pool) => {
            confirm_admin(&auth, &pool).await?;
            match AnalyticsRepository::new(pool).upload_queue().await {
                Ok(queue) => Some(queue),
                Err(e) => {
                    warn!("Upload queue query failed: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            warn!("Database unavailable for health report: {}", e);
            None
        }
    };

    Ok(ApiResponse::success(SystemHealth {
        database: if uploads.is_some() { "connected" } else { "disconnected" },
        uploads,
        uptime_seconds,
    }))
}
