use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{generate_jwt, hash_password, verify_password, Claims};
use crate::database::models::User;
use crate::database::UserRepository;
use crate::error::ApiError;
use crate::handlers::db_pool;
use crate::middleware::{ApiResponse, ApiResult};

pub const MAX_NAME_LENGTH: usize = 100;
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

/// POST /api/auth/register
pub async fn register(Json(body): Json<RegisterRequest>) -> ApiResult<AuthPayload> {
    let name = validate_name(body.name.as_deref())?;
    let email = validate_email(body.email.as_deref())?;
    let password = body.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::invalid_field(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }

    let password_hash = hash_password(&password).await?;
    let users = UserRepository::new(db_pool().await?);
    let user = users.create(&name, &email, &password_hash).await?;
    let token = generate_jwt(&Claims::for_user(&user))?;

    info!("Registered user {}", user.id);
    Ok(ApiResponse::created(AuthPayload { token, user }))
}

/// POST /api/auth/login
pub async fn login(Json(body): Json<LoginRequest>) -> ApiResult<AuthPayload> {
    let email = validate_email(body.email.as_deref())?;
    let password = body.password.unwrap_or_default();

    let users = UserRepository::new(db_pool().await?);
    let user = match users.find_by_email(&email).await? {
        Some(user) => user,
        None => return Err(ApiError::unauthorized("Invalid credentials")),
    };
    if !verify_password(&password, &user.password_hash).await {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !user.is_active() {
        return Err(ApiError::forbidden("Account is not active"));
    }

    users.touch_login(user.id).await?;
    let token = generate_jwt(&Claims::for_user(&user))?;

    info!("User {} logged in", user.id);
    Ok(ApiResponse::success(AuthPayload { token, user }))
}

/// Trimmed name of 1..=100 characters
pub fn validate_name(name: Option<&str>) -> Result<String, ApiError> {
    let name = name.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::invalid_field("name", "Name is required"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::invalid_field(
            "name",
            format!("Name cannot be more than {} characters", MAX_NAME_LENGTH),
        ));
    }
    Ok(name.to_string())
}

/// Lower-cased `local@domain.tld`
pub fn validate_email(email: Option<&str>) -> Result<String, ApiError> {
    let email = email.map(str::trim).unwrap_or_default().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
                && domain
                    .rsplit_once('.')
                    .map(|(host, tld)| !host.is_empty() && tld.len() >= 2)
                    .unwrap_or(false)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(ApiError::invalid_field("email", "Please enter a valid email"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized_and_checked() {
        assert_eq!(validate_email(Some(" Ada@Example.COM ")).unwrap(), "ada@example.com");
        for bad in ["", "ada", "ada@", "@example.com", "ada@example", "a@b@c.io", "a b@c.io"] {
            assert!(validate_email(Some(bad)).is_err(), "{bad}");
        }
        assert!(validate_email(None).is_err());
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(validate_name(Some("  Ada ")).unwrap(), "Ada");
        assert!(validate_name(Some("   ")).is_err());
        assert!(validate_name(Some(&"x".repeat(101))).is_err());
        assert!(validate_name(Some(&"x".repeat(100))).is_ok());
    }
}
