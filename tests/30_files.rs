mod common;

use anyhow::Result;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;

fn csv_form(body: &'static str) -> Result<Form> {
    let part = Part::bytes(body.as_bytes()).file_name("sales.csv").mime_str("text/csv")?;
    Ok(Form::new().part("file", part))
}

#[tokio::test]
async fn upload_requires_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/files/upload"))
        .multipart(csv_form("Month,Sales\nJan,100\n")?)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(server.url("/api/files/upload"))
        .bearer_auth("not.a.token")
        .multipart(csv_form("Month,Sales\nJan,100\n")?)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() -> Result<()> {
    let server = common::ensure_server().await?;
    let token = common::mint_token("user")?;

    let res = reqwest::Client::new()
        .post(server.url("/api/files/upload"))
        .bearer_auth(token)
        .multipart(Form::new().text("note", "no file here"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<Value>().await?;
    assert_eq!(body["message"], "No file uploaded");
    Ok(())
}

#[tokio::test]
async fn csv_upload_returns_projection() -> Result<()> {
    let server = common::ensure_server().await?;
    let Some((token, user)) = common::register_user(server).await? else {
        // Without a database the upload cannot be recorded
        let res = reqwest::Client::new()
            .post(server.url("/api/files/upload"))
            .bearer_auth(common::mint_token("user")?)
            .multipart(csv_form("Month,Sales\nJan,100\nFeb,200\n")?)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        return Ok(());
    };
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/files/upload"))
        .bearer_auth(&token)
        .multipart(csv_form("Month,Sales\nJan,100\nFeb,200\n")?)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["labels"], serde_json::json!(["Jan", "Feb"]));
    assert_eq!(body["data"]["dataset"]["label"], "Sales");
    assert_eq!(body["metadata"]["totalRows"], 3);

    let file_id = body["fileId"].as_str().unwrap_or_default().to_string();
    let res = client
        .get(server.url(&format!("/api/files/{}", file_id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let record = res.json::<Value>().await?;
    assert_eq!(record["data"]["status"], "completed");
    assert!(record["data"]["processingError"].is_null());

    let res = client
        .get(server.url(&format!("/api/files/history/{}", user["id"].as_str().unwrap_or_default())))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let history = res.json::<Value>().await?;
    assert_eq!(history["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn unsupported_type_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let Some((token, _)) = common::register_user(server).await? else {
        return Ok(());
    };

    let part = Part::bytes(b"\x89PNG".to_vec()).file_name("chart.png").mime_str("image/png")?;
    let res = reqwest::Client::new()
        .post(server.url("/api/files/upload"))
        .bearer_auth(&token)
        .multipart(Form::new().part("file", part))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    Ok(())
}
