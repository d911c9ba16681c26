use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartType {
    #[serde(rename = "bar")]
    Bar,
    #[serde(rename = "line")]
    Line,
    #[serde(rename = "pie")]
    Pie,
    #[serde(rename = "3d-bar")]
    Bar3d,
    #[serde(rename = "3d-line")]
    Line3d,
    #[serde(rename = "3d-surface")]
    Surface3d,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Bar3d => "3d-bar",
            ChartType::Line3d => "3d-line",
            ChartType::Surface3d => "3d-surface",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bar" => Some(ChartType::Bar),
            "line" => Some(ChartType::Line),
            "pie" => Some(ChartType::Pie),
            "3d-bar" => Some(ChartType::Bar3d),
            "3d-line" => Some(ChartType::Line3d),
            "3d-surface" => Some(ChartType::Surface3d),
            _ => None,
        }
    }
}

/// `charts` row
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub chart_type: String,
    pub data: Value,
    pub configuration: Value,
    pub source_file: Option<Value>,
    pub metadata: Option<Value>,
    pub owner_id: Uuid,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub views: i64,
    pub downloads: i64,
    #[serde(rename = "lastViewed")]
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new chart
#[derive(Debug, Clone)]
pub struct NewChart {
    pub title: String,
    pub chart_type: ChartType,
    pub data: Value,
    pub configuration: Value,
    pub source_file: Option<Value>,
    pub metadata: Option<Value>,
    pub is_public: bool,
    pub tags: Vec<String>,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct ChartUpdate {
    pub title: Option<String>,
    pub chart_type: Option<ChartType>,
    pub data: Option<Value>,
    pub configuration: Option<Value>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
}

/// Whitelisted sort columns for chart listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Views,
}

impl ChartSort {
    /// Unknown keys fall back to creation time
    pub fn from_query(key: Option<&str>) -> Self {
        match key {
            Some("updatedAt") => ChartSort::UpdatedAt,
            Some("title") => ChartSort::Title,
            Some("views") => ChartSort::Views,
            _ => ChartSort::CreatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            ChartSort::CreatedAt => "created_at",
            ChartSort::UpdatedAt => "updated_at",
            ChartSort::Title => "title",
            ChartSort::Views => "views",
        }
    }
}

/// Trim, lower-case and drop empty tags
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
