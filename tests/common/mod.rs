#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

use lms_api::auth::password::hash_password;
use lms_api::auth::DirectoryService;
use lms_api::client::ApiClient;
use lms_api::config::AppConfig;
use lms_api::database::models::{Profile, User};
use lms_api::state::AppState;
use lms_api::types::Role;

pub const PASSWORD: &str = "correct horse";
pub const DIRECTORY_PASSWORD: &str = "directory secret";

/// Directory service that knows a fixed set of uid/password pairs
pub struct FakeDirectory {
    accounts: HashMap<String, String>,
}

#[async_trait]
impl DirectoryService for FakeDirectory {
    async fn authenticate(&self, uid: &str, password: &str) -> bool {
        !password.is_empty() && self.accounts.get(uid).is_some_and(|p| p == password)
    }
}

/// Seeded accounts, one per role plus a directory-only account
pub struct Accounts {
    pub admin: User,
    pub teacher: User,
    pub tutor: User,
    pub student: User,
    pub directory_only: User,
}

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub accounts: Accounts,
    _uploads: TempDir,
}

fn seed(email: &str, role: Role, uid: Option<&str>, first: &str, last: &str, password: &str) -> Result<User> {
    let profile = Profile {
        first_name: first.to_string(),
        last_name: last.to_string(),
        picture: None,
    };
    let mut user = User::new(email, hash_password(password, 4)?, role, profile);
    user.uid = uid.map(str::to_string);
    Ok(user)
}

impl TestServer {
    /// Starts the router in-process on a free port with a fresh memory store.
    pub async fn start() -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
            .with_test_writer()
            .try_init();

        let uploads = tempfile::tempdir()?;
        let mut config = AppConfig::development();
        config.uploads.dir = uploads.path().to_path_buf();
        config.security.bcrypt_cost = 4;
        config.security.enable_cors = false;

        let directory = FakeDirectory {
            accounts: HashMap::from([
                ("jdoe".to_string(), DIRECTORY_PASSWORD.to_string()),
                ("stud1".to_string(), DIRECTORY_PASSWORD.to_string()),
            ]),
        };
        let state = AppState::in_memory(config, Arc::new(directory));
        state.uploads.ensure_dirs().await?;

        let accounts = Accounts {
            admin: seed("admin@uni.edu", Role::Admin, Some("admin"), "Ada", "Admin", PASSWORD)?,
            teacher: seed("teacher@uni.edu", Role::Teacher, Some("tmiller"), "Tom", "Miller", PASSWORD)?,
            tutor: seed("tutor@uni.edu", Role::Tutor, Some("tutor1"), "Tess", "Turner", PASSWORD)?,
            student: seed("student@uni.edu", Role::Student, Some("stud1"), "Sam", "Student", PASSWORD)?,
            directory_only: seed("jdoe@uni.edu", Role::Student, Some("jdoe"), "Jane", "Doe", &Uuid::new_v4().to_string())?,
        };
        for user in [
            &accounts.admin,
            &accounts.teacher,
            &accounts.tutor,
            &accounts.student,
            &accounts.directory_only,
        ] {
            state.users.insert(user).await?;
        }

        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let app = lms_api::app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url,
            state,
            accounts,
            _uploads: uploads,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Logged-in client for the given account
    pub async fn client_for(&self, user: &User) -> Result<ApiClient> {
        let mut client = ApiClient::new(&self.base_url)?;
        client.login(&user.email, PASSWORD).await?;
        Ok(client)
    }

    pub async fn token_for(&self, user: &User) -> Result<String> {
        let client = self.client_for(user).await?;
        Ok(client.token().context("login returned no token")?.to_string())
    }

    /// Raw request with a bearer token, returning status and JSON body
    pub async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut request = reqwest::Client::new().request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }
}
