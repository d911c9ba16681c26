use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config;
use crate::database::DatabaseManager;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::storage::LocalStorage;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub storage: LocalStorage,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            started_at: Instant::now(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth_routes())
        .merge(file_routes())
        .merge(chart_routes())
        .merge(user_routes())
        .merge(analytics_routes())
        .route_layer(middleware::from_fn(jwt_auth_middleware));

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected)
        .layer(cors_layer());

    if config::config().api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(public::auth::register))
        .route("/api/auth/login", post(public::auth::login))
}

fn auth_routes() -> Router<AppState> {
    Router::new().route("/api/auth/me", get(protected::auth::me))
}

fn file_routes() -> Router<AppState> {
    use protected::files;

    let upload_limit = config::config().api.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route(
            "/api/files/upload",
            post(files::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/files/history/:user_id", get(files::history))
        .route("/api/files/:id", get(files::get).delete(files::delete))
}

fn chart_routes() -> Router<AppState> {
    use protected::charts;

    Router::new()
        .route("/api/charts", post(charts::create))
        .route("/api/charts/user", get(charts::list))
        .route(
            "/api/charts/:id",
            get(charts::get).put(charts::update).delete(charts::delete),
        )
}

fn user_routes() -> Router<AppState> {
    use protected::users;

    Router::new()
        .route("/api/users", get(users::list))
        .route(
            "/api/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/api/users/:id/role", patch(users::set_role))
        .route("/api/users/:id/status", patch(users::set_status))
        .route("/api/users/:id/analytics", get(users::analytics))
}

fn analytics_routes() -> Router<AppState> {
    use protected::analytics;

    Router::new()
        .route("/api/analytics/overview", get(analytics::overview))
        .route("/api/analytics/user-activity", get(analytics::user_activity))
        .route("/api/analytics/charts", get(analytics::charts))
        .route("/api/analytics/health", get(analytics::health))
}

/// Configured origins, or any origin when `*` is listed
fn cors_layer() -> CorsLayer {
    let origins = &config::config().security.cors_origins;
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(parsed))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Sheet Analytics API",
            "version": version,
            "description": "Spreadsheet upload, chart and analytics API",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/api/auth/register, /api/auth/login (public - token acquisition)",
                "auth": "/api/auth/me (protected)",
                "files": "/api/files/upload, /api/files/history/:userId, /api/files/:id (protected)",
                "charts": "/api/charts, /api/charts/user, /api/charts/:id (protected)",
                "users": "/api/users[/:id[/role|/status|/analytics]] (protected)",
                "analytics": "/api/analytics/overview|user-activity|charts|health (protected, admin)",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
