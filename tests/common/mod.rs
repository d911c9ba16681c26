#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Secret the spawned server signs tokens with
pub const JWT_SECRET: &str = "integration-test-secret";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    _upload_dir: TempDir,
    _child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let upload_dir = TempDir::new().context("failed to create upload dir")?;

        // Spawn the already-built binary to keep start fast during tests
        // Assumes debug profile; adjust if you run tests with --release
        let mut cmd = Command::new("target/debug/sheet-analytics-api");
        cmd.env("SHEETS_API_PORT", port.to_string())
            .env("UPLOAD_DIR", upload_dir.path())
            .env("JWT_SECRET", JWT_SECRET)
            .env("APP_ENV", "development")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // DATABASE_URL is inherited; without it the server runs degraded
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            _upload_dir: upload_dir,
            _child: child,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Token for a user that need not exist in the database
pub fn mint_token(role: &str) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "sub": uuid::Uuid::new_v4(),
        "email": format!("{}@example.com", role),
        "role": role,
        "iat": now,
        "exp": now + 3600,
    });
    let key = jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes());
    Ok(jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &key)?)
}

/// Register a fresh account when a database is reachable.
/// Returns None when the server answers 503.
pub async fn register_user(server: &TestServer) -> Result<Option<(String, Value)>> {
    let email = format!("user-{}@example.com", uuid::Uuid::new_v4());
    let res = reqwest::Client::new()
        .post(server.url("/api/auth/register"))
        .json(&json!({"name": "Integration", "email": email, "password": "secret-pass"}))
        .send()
        .await?;

    match res.status() {
        StatusCode::CREATED => {
            let body = res.json::<Value>().await?;
            let token = body["data"]["token"].as_str().context("token missing")?.to_string();
            Ok(Some((token, body["data"]["user"].clone())))
        }
        StatusCode::SERVICE_UNAVAILABLE => Ok(None),
        other => anyhow::bail!("unexpected register status {}: {}", other, res.text().await?),
    }
}
