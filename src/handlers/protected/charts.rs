use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::database::models::chart::normalize_tags;
use crate::database::models::{Chart, ChartSort, ChartType, ChartUpdate, NewChart, Page, PageParams};
use crate::database::ChartRepository;
use crate::error::ApiError;
use crate::handlers::db_pool;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

pub const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub chart_type: Option<String>,
    pub data: Option<Value>,
    pub configuration: Option<Value>,
    pub source_file: Option<Value>,
    pub metadata: Option<Value>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub chart_type: Option<String>,
    pub sort_by: Option<String>,
}

/// POST /api/charts
pub async fn create(Extension(auth): Extension<AuthUser>, Json(body): Json<ChartRequest>) -> ApiResult<Chart> {
    let chart = new_chart(body)?;
    let charts = ChartRepository::new(db_pool().await?);
    let created = charts.create(auth.user_id, &chart).await?;

    info!("User {} created chart {}", auth.user_id, created.id);
    Ok(ApiResponse::created(created))
}

/// GET /api/charts/user - the caller's charts, paginated
pub async fn list(Extension(auth): Extension<AuthUser>, Query(query): Query<ChartListQuery>) -> ApiResult<Page<Chart>> {
    let chart_type = query.chart_type.as_deref().map(parse_chart_type).transpose()?;
    let sort = ChartSort::from_query(query.sort_by.as_deref());
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };

    let charts = ChartRepository::new(db_pool().await?);
    Ok(ApiResponse::success(
        charts.list_for_owner(auth.user_id, chart_type, sort, params).await?,
    ))
}

/// GET /api/charts/:id - counts as a view
pub async fn get(Extension(auth): Extension<AuthUser>, Path(id): Path<Uuid>) -> ApiResult<Chart> {
    let charts = ChartRepository::new(db_pool().await?);
    Ok(ApiResponse::success(charts.view(id, auth.user_id).await?))
}

/// PUT /api/charts/:id - partial update
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChartRequest>,
) -> ApiResult<Chart> {
    let update = chart_update(body)?;
    let charts = ChartRepository::new(db_pool().await?);
    Ok(ApiResponse::success(charts.update(id, auth.user_id, &update).await?))
}

/// DELETE /api/charts/:id
pub async fn delete(Extension(auth): Extension<AuthUser>, Path(id): Path<Uuid>) -> ApiResult<Option<()>> {
    let charts = ChartRepository::new(db_pool().await?);
    charts.delete(id, auth.user_id).await?;

    info!("User {} deleted chart {}", auth.user_id, id);
    Ok(ApiResponse::success(None).with_extra(json!({"message": "Chart deleted successfully"})))
}

fn new_chart(body: ChartRequest) -> Result<NewChart, ApiError> {
    let title = validate_title(body.title.as_deref().unwrap_or_default())?;
    let chart_type = body
        .chart_type
        .as_deref()
        .ok_or_else(|| ApiError::invalid_field("type", "Chart type is required"))
        .and_then(parse_chart_type)?;
    let data = body
        .data
        .ok_or_else(|| ApiError::invalid_field("data", "Chart data is required"))
        .and_then(validate_data)?;

    Ok(NewChart {
        title,
        chart_type,
        data,
        configuration: body.configuration.unwrap_or_else(|| json!({})),
        source_file: body.source_file,
        metadata: body.metadata,
        is_public: body.is_public.unwrap_or(false),
        tags: normalize_tags(body.tags.unwrap_or_default()),
    })
}

fn chart_update(body: ChartRequest) -> Result<ChartUpdate, ApiError> {
    Ok(ChartUpdate {
        title: body.title.as_deref().map(validate_title).transpose()?,
        chart_type: body.chart_type.as_deref().map(parse_chart_type).transpose()?,
        data: body.data.map(validate_data).transpose()?,
        configuration: body.configuration,
        is_public: body.is_public,
        tags: body.tags.map(normalize_tags),
    })
}

fn validate_title(title: &str) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::invalid_field("title", "Chart title is required"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::invalid_field(
            "title",
            format!("Title cannot be more than {} characters", MAX_TITLE_LENGTH),
        ));
    }
    Ok(title.to_string())
}

fn parse_chart_type(value: &str) -> Result<ChartType, ApiError> {
    ChartType::parse(value).ok_or_else(|| ApiError::invalid_field("type", format!("Unknown chart type '{}'", value)))
}

/// Chart data must be a JSON object
fn validate_data(data: Value) -> Result<Value, ApiError> {
    if data.is_object() {
        Ok(data)
    } else {
        Err(ApiError::invalid_field("data", "Chart data must be an object"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: Value) -> ChartRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn new_chart_applies_defaults() {
        let chart = new_chart(request(json!({
            "title": "  Sales  ",
            "type": "3d-bar",
            "data": {"labels": ["Jan"], "datasets": [{"label": "Sales", "data": [1]}]},
            "tags": [" Q1 ", ""]
        })))
        .unwrap();
        assert_eq!(chart.title, "Sales");
        assert_eq!(chart.chart_type, ChartType::Bar3d);
        assert_eq!(chart.configuration, json!({}));
        assert!(!chart.is_public);
        assert_eq!(chart.tags, vec!["q1"]);
    }

    #[test]
    fn new_chart_requires_fields() {
        let err = new_chart(request(json!({"type": "bar", "data": {}}))).unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = new_chart(request(json!({"title": "t", "type": "radar", "data": {}}))).unwrap_err();
        assert!(err.message().contains("radar"));

        let err = new_chart(request(json!({"title": "t", "type": "bar", "data": [1, 2]}))).unwrap_err();
        assert!(err.message().contains("object"));

        assert!(new_chart(request(json!({"title": "x".repeat(201), "type": "bar", "data": {}}))).is_err());
    }

    #[test]
    fn update_leaves_absent_fields_alone() {
        let update = chart_update(request(json!({"isPublic": true}))).unwrap();
        assert_eq!(update.is_public, Some(true));
        assert!(update.title.is_none());
        assert!(update.chart_type.is_none());
        assert!(update.tags.is_none());

        assert!(chart_update(request(json!({"title": "   "}))).is_err());
    }
}
