//! Connection settings and pool setup.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use thiserror::Error;

/// Shared connection pool handle.
pub type DbPool = DatabaseConnection;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL missing")]
    MissingUrl,
    #[error("invalid DB_MAX_CONNECTIONS value: {0}")]
    InvalidPoolSize(String),
    #[error("database connection failed: {0}")]
    Connect(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub log_statements: bool,
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(8),
            log_statements: false,
        }
    }

    /// Reads `DATABASE_URL`, `DB_MAX_CONNECTIONS` and `DB_LOG_STATEMENTS`.
    pub fn from_env() -> DbResult<Self> {
        let url = std::env::var("DATABASE_URL").map_err(|_| DbError::MissingUrl)?;
        let mut settings = Self::new(url);
        if let Ok(raw) = std::env::var("DB_MAX_CONNECTIONS") {
            settings.max_connections = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(DbError::InvalidPoolSize(raw))?;
        }
        settings.log_statements = std::env::var("DB_LOG_STATEMENTS")
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(settings)
    }

    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new(self.url.clone());
        // An in-memory SQLite database lives and dies with its one connection.
        let max = if self.url.contains(":memory:") {
            1
        } else {
            self.max_connections
        };
        options
            .max_connections(max)
            .min_connections(1)
            .connect_timeout(self.connect_timeout)
            .sqlx_logging(self.log_statements);
        options
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let pool = Database::connect(settings.connect_options()).await?;
    tracing::info!(
        max_connections = settings.max_connections,
        sqlite = settings.is_sqlite(),
        "database pool ready"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

    #[tokio::test]
    async fn connects_to_in_memory_sqlite() {
        let settings = DatabaseSettings::new("sqlite::memory:");
        assert!(settings.is_sqlite());
        let pool = connect(&settings).await.unwrap();
        let row = pool
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT 1 AS one".to_string(),
            ))
            .await
            .unwrap();
        assert!(row.is_some());
    }
}
