use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Chart, ChartSort, ChartType, ChartUpdate, NewChart, Page, PageParams};
use crate::ingest::UserCounter;

const CHART_COLUMNS: &str = "id, title, chart_type, data, configuration, source_file, metadata, owner_id, \
     is_public, tags, views, downloads, last_viewed_at, created_at, updated_at";

/// Owner-scoped chart queries. Every read or write filters on `owner_id`,
/// so a chart belonging to someone else is indistinguishable from a missing one.
pub struct ChartRepository {
    pool: PgPool,
}

impl ChartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the chart and bump the owner's `charts_created` in one transaction
    pub async fn create(&self, owner_id: Uuid, chart: &NewChart) -> Result<Chart, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO charts (id, title, chart_type, data, configuration, source_file, metadata, owner_id, is_public, tags)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {}",
            CHART_COLUMNS
        );
        let created = sqlx::query_as::<_, Chart>(&sql)
            .bind(Uuid::new_v4())
            .bind(&chart.title)
            .bind(chart.chart_type.as_str())
            .bind(&chart.data)
            .bind(&chart.configuration)
            .bind(&chart.source_file)
            .bind(&chart.metadata)
            .bind(owner_id)
            .bind(chart.is_public)
            .bind(&chart.tags)
            .fetch_one(&mut *tx)
            .await?;

        let bump = format!(
            "UPDATE users SET {col} = {col} + 1, updated_at = now() WHERE id = $1",
            col = UserCounter::ChartsCreated.column()
        );
        sqlx::query(&bump)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    pub async fn list_for_owner(
        &self,
        owner_id: Uuid,
        chart_type: Option<ChartType>,
        sort: ChartSort,
        params: PageParams,
    ) -> Result<Page<Chart>, DatabaseError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM charts WHERE owner_id = ");
        count.push_bind(owner_id);
        if let Some(t) = chart_type {
            count.push(" AND chart_type = ").push_bind(t.as_str());
        }
        let (total,) = count.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM charts WHERE owner_id = ", CHART_COLUMNS));
        select.push_bind(owner_id);
        if let Some(t) = chart_type {
            select.push(" AND chart_type = ").push_bind(t.as_str());
        }
        // Column comes from a closed whitelist
        select
            .push(format!(" ORDER BY {} DESC, id LIMIT ", sort.column()))
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());
        let charts = select.build_query_as::<Chart>().fetch_all(&self.pool).await?;

        Ok(Page::new(charts, total, params))
    }

    /// Fetch an owned chart, counting the view and stamping `last_viewed_at`
    pub async fn view(&self, id: Uuid, owner_id: Uuid) -> Result<Chart, DatabaseError> {
        let sql = format!(
            "UPDATE charts SET views = views + 1, last_viewed_at = now()
             WHERE id = $1 AND owner_id = $2
             RETURNING {}",
            CHART_COLUMNS
        );
        sqlx::query_as::<_, Chart>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn update(&self, id: Uuid, owner_id: Uuid, update: &ChartUpdate) -> Result<Chart, DatabaseError> {
        let sql = format!(
            "UPDATE charts
             SET title = COALESCE($3, title),
                 chart_type = COALESCE($4, chart_type),
                 data = COALESCE($5, data),
                 configuration = COALESCE($6, configuration),
                 is_public = COALESCE($7, is_public),
                 tags = COALESCE($8, tags),
                 updated_at = now()
             WHERE id = $1 AND owner_id = $2
             RETURNING {}",
            CHART_COLUMNS
        );
        sqlx::query_as::<_, Chart>(&sql)
            .bind(id)
            .bind(owner_id)
            .bind(update.title.as_deref())
            .bind(update.chart_type.map(|t| t.as_str()))
            .bind(&update.data)
            .bind(&update.configuration)
            .bind(update.is_public)
            .bind(&update.tags)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM charts WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found());
        }
        Ok(())
    }
}

fn not_found() -> DatabaseError {
    DatabaseError::NotFound("Chart not found".to_string())
}
