use std::sync::Arc;

use crate::auth::{DirectoryService, LdapDirectory, NoDirectory};
use crate::config::AppConfig;
use crate::database::{DatabaseError, DatabaseManager, MediaStore, MemoryStore, PgStore, UserStore};
use crate::uploads::Uploads;

/// Shared handles injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub media: Arc<dyn MediaStore>,
    pub directory: Arc<dyn DirectoryService>,
    pub uploads: Arc<Uploads>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        media: Arc<dyn MediaStore>,
        directory: Arc<dyn DirectoryService>,
    ) -> Self {
        let uploads = Arc::new(Uploads::new(config.uploads.dir.clone()));
        Self {
            config: Arc::new(config),
            users,
            media,
            directory,
            uploads,
        }
    }

    /// State backed by a fresh in-memory store.
    pub fn in_memory(config: AppConfig, directory: Arc<dyn DirectoryService>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store, directory)
    }

    /// Postgres when a database URL is configured, memory otherwise; LDAP when a directory URL is configured.
    pub async fn from_config(config: AppConfig) -> Result<Self, DatabaseError> {
        let directory: Arc<dyn DirectoryService> = match LdapDirectory::from_config(&config.ldap) {
            Some(ldap) => Arc::new(ldap),
            None => Arc::new(NoDirectory),
        };

        if config.database.url.is_none() {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            return Ok(Self::in_memory(config, directory));
        }

        let pool = DatabaseManager::connect(&config.database).await?;
        let store = Arc::new(PgStore::new(pool));
        Ok(Self::new(config, store.clone(), store, directory))
    }
}
