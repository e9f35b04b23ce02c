#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;

pub const ADMIN_EMAIL: &str = "admin@visa-portal.test";
pub const ADMIN_PASSWORD: &str = "admin-password";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    upload_root: TempDir,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let upload_root = tempfile::tempdir().context("failed to create upload root")?;

        // Memory store, seeded catalog and a known admin so tests need no database
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_visa-portal"));
        cmd.env("VISA_API_PORT", port.to_string())
            .env("VISA_STORE", "memory")
            .env_remove("DATABASE_URL")
            .env("APP_ENV", "development")
            .env("JWT_SECRET", "integration-test-secret")
            .env("UPLOAD_ROOT", upload_root.path())
            .env("ADMIN_EMAIL", ADMIN_EMAIL)
            .env("ADMIN_PASSWORD", ADMIN_PASSWORD)
            .env("SEED_CATALOG", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, upload_root, child })
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
                if resp.status() == StatusCode::OK {
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

    pub fn upload_root(&self) -> &std::path::Path {
        self.upload_root.path()
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}

/// Register a fresh account and return (email, token, user id)
pub async fn register(client: &reqwest::Client, server: &TestServer, prefix: &str) -> Result<(String, String, String)> {
    let email = unique_email(prefix);
    let res = client
        .post(server.url("/auth/register"))
        .json(&json!({ "name": "Test User", "email": email, "password": "secret1" }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "register failed: {}", res.status());
    let body: Value = res.json().await?;
    let token = body["data"]["token"].as_str().context("token missing")?.to_string();
    let id = body["data"]["user"]["id"].as_str().context("id missing")?.to_string();
    Ok((email, token, id))
}

pub async fn admin_token(client: &reqwest::Client, server: &TestServer) -> Result<String> {
    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "admin login failed: {}", res.status());
    let body: Value = res.json().await?;
    Ok(body["data"]["token"].as_str().context("token missing")?.to_string())
}

/// Promote an account through the admin console
pub async fn set_role(client: &reqwest::Client, server: &TestServer, user_id: &str, role: &str) -> Result<()> {
    let admin = admin_token(client, server).await?;
    let res = client
        .put(server.url(&format!("/admin/users/{}", user_id)))
        .bearer_auth(admin)
        .json(&json!({ "role": role }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "role change failed: {}", res.status());
    Ok(())
}

/// Id of the first seeded visa type matching `category`
pub async fn visa_type_id(client: &reqwest::Client, server: &TestServer, category: &str) -> Result<String> {
    let res = client
        .get(server.url(&format!("/visa/search?category={}", category)))
        .send()
        .await?;
    let body: Value = res.json().await?;
    Ok(body["data"][0]["id"].as_str().context("no visa type for category")?.to_string())
}

pub fn application_body(visa_type_id: &str) -> Value {
    json!({
        "visa_type_id": visa_type_id,
        "personal_info": {
            "first_name": "Alice",
            "last_name": "Martin",
            "date_of_birth": "1990-04-12",
            "nationality": "Canadian",
            "passport_number": "AB123456",
            "passport_expiry": "2031-01-01",
            "email": "alice@example.com"
        },
        "travel_info": {
            "purpose": "Holiday",
            "arrival_date": "2027-06-01",
            "departure_date": "2027-06-20"
        }
    })
}
