use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub users: i64,
    pub charts: i64,
    pub files: i64,
    pub active_users: i64,
}

/// Rows created since one month ago
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Growth {
    pub users: i64,
    pub charts: i64,
    pub files: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RecentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RecentChart {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub chart_type: String,
    pub owner_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RecentFile {
    pub id: Uuid,
    pub original_name: String,
    pub status: String,
    pub owner_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub totals: Totals,
    pub growth: Growth,
    pub recent_users: Vec<RecentUser>,
    pub recent_charts: Vec<RecentChart>,
    pub recent_files: Vec<RecentFile>,
}

/// Reporting window for activity queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActivityPeriod {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl ActivityPeriod {
    /// Unknown or missing periods fall back to seven days
    pub fn from_query(key: Option<&str>) -> Self {
        match key {
            Some("30d") => ActivityPeriod::Month,
            Some("90d") => ActivityPeriod::Quarter,
            _ => ActivityPeriod::Week,
        }
    }

    pub fn days(&self) -> i32 {
        match self {
            ActivityPeriod::Week => 7,
            ActivityPeriod::Month => 30,
            ActivityPeriod::Quarter => 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivity {
    pub period: ActivityPeriod,
    pub registrations: Vec<DailyCount>,
    pub charts_created: Vec<DailyCount>,
    pub uploads: Vec<DailyCount>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub chart_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PopularChart {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub chart_type: String,
    pub views: i64,
    pub owner_name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthlyCount {
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartAnalytics {
    pub type_distribution: Vec<TypeCount>,
    pub most_viewed: Vec<PopularChart>,
    pub monthly_trend: Vec<MonthlyCount>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQueue {
    pub pending: i64,
    pub processing: i64,
    pub failed: i64,
}

pub struct AnalyticsRepository {
    pool: PgPool,
}

impl AnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn overview(&self) -> Result<Overview, DatabaseError> {
        let (users, charts, files, active_users): (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM charts),
                    (SELECT COUNT(*) FROM file_uploads),
                    (SELECT COUNT(*) FROM users WHERE status = 'active')",
        )
        .fetch_one(&self.pool)
        .await?;

        let (new_users, new_charts, new_files): (i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM users WHERE created_at >= now() - interval '1 month'),
                    (SELECT COUNT(*) FROM charts WHERE created_at >= now() - interval '1 month'),
                    (SELECT COUNT(*) FROM file_uploads WHERE created_at >= now() - interval '1 month')",
        )
        .fetch_one(&self.pool)
        .await?;

        let recent_users = sqlx::query_as::<_, RecentUser>(
            "SELECT id, name, email, created_at FROM users ORDER BY created_at DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;

        let recent_charts = sqlx::query_as::<_, RecentChart>(
            "SELECT c.id, c.title, c.chart_type, u.name AS owner_name, c.created_at
             FROM charts c JOIN users u ON u.id = c.owner_id
             ORDER BY c.created_at DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;

        let recent_files = sqlx::query_as::<_, RecentFile>(
            "SELECT f.id, f.original_name, f.status, u.name AS owner_name, f.created_at
             FROM file_uploads f JOIN users u ON u.id = f.owner_id
             ORDER BY f.created_at DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(Overview {
            totals: Totals {
                users,
                charts,
                files,
                active_users,
            },
            growth: Growth {
                users: new_users,
                charts: new_charts,
                files: new_files,
            },
            recent_users,
            recent_charts,
            recent_files,
        })
    }

    pub async fn user_activity(&self, period: ActivityPeriod) -> Result<UserActivity, DatabaseError> {
        Ok(UserActivity {
            period,
            registrations: self.daily_counts("users", period).await?,
            charts_created: self.daily_counts("charts", period).await?,
            uploads: self.daily_counts("file_uploads", period).await?,
        })
    }

    async fn daily_counts(&self, table: &'static str, period: ActivityPeriod) -> Result<Vec<DailyCount>, DatabaseError> {
        let sql = format!(
            "SELECT created_at::date AS day, COUNT(*) AS count
             FROM {}
             WHERE created_at >= now() - make_interval(days => $1)
             GROUP BY day
             ORDER BY day",
            table
        );
        Ok(sqlx::query_as::<_, DailyCount>(&sql)
            .bind(period.days())
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn charts(&self) -> Result<ChartAnalytics, DatabaseError> {
        let type_distribution = sqlx::query_as::<_, TypeCount>(
            "SELECT chart_type, COUNT(*) AS count FROM charts GROUP BY chart_type ORDER BY count DESC, chart_type",
        )
        .fetch_all(&self.pool)
        .await?;

        let most_viewed = sqlx::query_as::<_, PopularChart>(
            "SELECT c.id, c.title, c.chart_type, c.views, u.name AS owner_name
             FROM charts c JOIN users u ON u.id = c.owner_id
             ORDER BY c.views DESC, c.created_at DESC
             LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await?;

        let monthly_trend = sqlx::query_as::<_, MonthlyCount>(
            "SELECT to_char(date_trunc('month', created_at), 'YYYY-MM') AS month, COUNT(*) AS count
             FROM charts
             GROUP BY month
             ORDER BY month",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ChartAnalytics {
            type_distribution,
            most_viewed,
            monthly_trend,
        })
    }

    /// Uploads that have not reached `completed`
    pub async fn upload_queue(&self) -> Result<UploadQueue, DatabaseError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM file_uploads
             WHERE status IN ('pending', 'processing', 'failed')
             GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut queue = UploadQueue::default();
        for (status, count) in rows {
            match status.as_str() {
                "pending" => queue.pending = count,
                "processing" => queue.processing = count,
                "failed" => queue.failed = count,
                _ => {}
            }
        }
        Ok(queue)
    }
}
