mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn register_validates_before_touching_database() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/auth/register"))
        .json(&json!({"name": "Ada", "email": "not-an-email", "password": "secret-pass"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["fieldErrors"]["email"].is_string(), "{}", body);

    let res = client
        .post(server.url("/api/auth/register"))
        .json(&json!({"name": "Ada", "email": "ada@example.com", "password": "123"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn me_requires_token() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/api/auth/me")).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn registered_user_can_log_in() -> Result<()> {
    let server = common::ensure_server().await?;
    let Some((_, user)) = common::register_user(server).await? else {
        // No database configured
        return Ok(());
    };
    assert!(user.get("passwordHash").is_none());

    let res = reqwest::Client::new()
        .post(server.url("/api/auth/login"))
        .json(&json!({"email": user["email"], "password": "secret-pass"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = reqwest::Client::new()
        .post(server.url("/api/auth/login"))
        .json(&json!({"email": user["email"], "password": "wrong-pass"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn analytics_is_admin_only() -> Result<()> {
    let server = common::ensure_server().await?;
    let token = common::mint_token("user")?;

    let res = reqwest::Client::new()
        .get(server.url("/api/analytics/overview"))
        .bearer_auth(token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn admin_token_needs_a_stored_admin_account() -> Result<()> {
    let server = common::ensure_server().await?;
    // Signed with an admin role, but no such account exists
    let token = common::mint_token("admin")?;

    let res = reqwest::Client::new()
        .get(server.url("/api/users"))
        .bearer_auth(token)
        .send()
        .await?;

    // UNAUTHORIZED with a database, SERVICE_UNAVAILABLE without one
    assert!(
        res.status() == StatusCode::UNAUTHORIZED || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        res.status()
    );
    Ok(())
}
