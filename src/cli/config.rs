use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::ApiClient;
use crate::database::models::Directory;

pub const DEFAULT_SERVER: &str = "http://localhost:3000";

/// Persisted login and media position, stored as `session.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub server: String,
    pub token: Option<String>,
    pub login: Option<String>,
    pub logged_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub media: MediaPosition,
}

/// Where `lms media` commands operate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaPosition {
    pub course: Option<String>,
    pub directory: Option<Uuid>,
    /// Directories above `directory`, starting at the course root
    #[serde(default)]
    pub trail: Vec<Directory>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            token: None,
            login: None,
            logged_in_at: None,
            media: MediaPosition::default(),
        }
    }
}

impl SessionConfig {
    pub fn clear_login(&mut self) {
        self.token = None;
        self.login = None;
        self.logged_in_at = None;
        self.media = MediaPosition::default();
    }

    /// Client carrying the stored token; fails when not logged in.
    pub fn authenticated_client(&self) -> anyhow::Result<ApiClient> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not logged in. Run 'lms auth login <login>' first"))?;
        Ok(ApiClient::new(&self.server)?.with_token(token))
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("LMS_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("lms").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_session() -> anyhow::Result<SessionConfig> {
    let session_file = get_config_dir()?.join("session.json");

    if !session_file.exists() {
        return Ok(SessionConfig::default());
    }

    let content = fs::read_to_string(session_file)?;
    let config: SessionConfig = serde_json::from_str(&content)?;
    Ok(config)
}

pub fn save_session(config: &SessionConfig) -> anyhow::Result<()> {
    let session_file = get_config_dir()?.join("session.json");

    let content = serde_json::to_string_pretty(config)?;
    fs::write(session_file, content)?;
    Ok(())
}
