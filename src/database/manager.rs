use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds the Postgres pool and bootstraps the tables the stores rely on
pub struct DatabaseManager;

impl DatabaseManager {
    const SCHEMA: &'static [&'static str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            uid TEXT UNIQUE,
            email TEXT NOT NULL,
            password TEXT NOT NULL,
            role TEXT NOT NULL,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            picture JSONB,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
        "CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (lower(email))",
        r#"
        CREATE TABLE IF NOT EXISTS directories (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            parent UUID REFERENCES directories (id) ON DELETE CASCADE,
            course_id TEXT,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
        "CREATE UNIQUE INDEX IF NOT EXISTS directories_course_root_key ON directories (course_id) WHERE parent IS NULL",
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            link TEXT NOT NULL,
            size BIGINT NOT NULL,
            mime_type TEXT,
            directory UUID NOT NULL REFERENCES directories (id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    ];

    /// Connect using the configured URL and make sure the schema exists
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        url::Url::parse(url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        Self::bootstrap(&pool).await?;
        info!("Created database pool ({} max connections)", config.max_connections);
        Ok(pool)
    }

    async fn bootstrap(pool: &PgPool) -> Result<(), DatabaseError> {
        for statement in Self::SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_url_is_reported() {
        let config = DatabaseConfig {
            url: None,
            max_connections: 1,
            connection_timeout: 1,
        };
        assert!(matches!(
            DatabaseManager::connect(&config).await,
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        ));
    }

    #[tokio::test]
    async fn malformed_url_is_rejected_before_connecting() {
        let config = DatabaseConfig {
            url: Some("not a url".to_string()),
            max_connections: 1,
            connection_timeout: 1,
        };
        assert!(matches!(
            DatabaseManager::connect(&config).await,
            Err(DatabaseError::InvalidDatabaseUrl)
        ));
    }
}
