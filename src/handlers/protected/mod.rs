// Protected handlers (JWT authentication required)
//
// Route prefix: /api/*. The router wraps these in `jwt_auth_middleware`,
// which injects `AuthUser` as a request extension.

pub mod analytics;
pub mod auth;
pub mod charts;
pub mod files;
pub mod users;
