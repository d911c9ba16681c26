use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::user::{ChartTypeCount, UserAnalytics};
use crate::database::models::{Page, PageParams, ProfileUpdate, User, UserFilter, UserRole, UserStatus};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, status, avatar, preferences, \
     files_uploaded, charts_created, total_downloads, last_login_at, created_at, updated_at";

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new account; a taken email is a `Conflict`
    pub async fn create(&self, name: &str, email: &str, password_hash: &str) -> Result<User, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    DatabaseError::Conflict("User already exists with this email".to_string())
                }
                other => other.into(),
            })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    pub async fn select_404(&self, id: Uuid) -> Result<User, DatabaseError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(&self.pool).await?)
    }

    pub async fn touch_login(&self, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Newest first, filtered by role, status and a name/email search
    pub async fn list(&self, filter: &UserFilter, params: PageParams) -> Result<Page<User>, DatabaseError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
        push_user_filters(&mut count, filter);
        let (total,) = count.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users WHERE TRUE", USER_COLUMNS));
        push_user_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());
        let users = select.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok(Page::new(users, total, params))
    }

    /// Only name, avatar and preferences; role, status and password are untouched
    pub async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User, DatabaseError> {
        let sql = format!(
            "UPDATE users
             SET name = COALESCE($2, name),
                 avatar = COALESCE($3, avatar),
                 preferences = COALESCE($4, preferences),
                 updated_at = now()
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.avatar.as_deref())
            .bind(update.preferences.clone().map(Json))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))
    }

    pub async fn set_role(&self, id: Uuid, role: UserRole) -> Result<User, DatabaseError> {
        self.set_column(id, "role", role.as_str()).await
    }

    pub async fn set_status(&self, id: Uuid, status: UserStatus) -> Result<User, DatabaseError> {
        self.set_column(id, "status", status.as_str()).await
    }

    async fn set_column(&self, id: Uuid, column: &'static str, value: &str) -> Result<User, DatabaseError> {
        let sql = format!(
            "UPDATE users SET {} = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            column, USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))
    }

    /// Charts and uploads go with the user (ON DELETE CASCADE)
    pub async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn analytics(&self, id: Uuid) -> Result<UserAnalytics, DatabaseError> {
        let user = self.select_404(id).await?;

        let charts_by_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT chart_type, COUNT(*) FROM charts WHERE owner_id = $1 GROUP BY chart_type ORDER BY chart_type",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let (total_charts, total_views, total_chart_downloads): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(views), 0)::BIGINT, COALESCE(SUM(downloads), 0)::BIGINT
             FROM charts WHERE owner_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let (total_files, total_bytes, processed_files): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COALESCE(SUM(size_bytes), 0)::BIGINT,
                    COUNT(*) FILTER (WHERE status = 'completed')
             FROM file_uploads WHERE owner_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserAnalytics {
            user_id: user.id,
            files_uploaded: user.files_uploaded,
            charts_created: user.charts_created,
            total_downloads: user.total_downloads,
            last_login: user.last_login_at,
            charts_by_type: charts_by_type
                .into_iter()
                .map(|(chart_type, count)| ChartTypeCount { chart_type, count })
                .collect(),
            total_charts,
            total_views,
            total_chart_downloads,
            total_files,
            total_bytes,
            processed_files,
        })
    }
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(role) = filter.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(pattern) = filter.search.as_deref().and_then(search_pattern) {
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// `%term%` with LIKE wildcards escaped; blank searches match everything
fn search_pattern(term: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    Some(format!("%{}%", escaped))
}
