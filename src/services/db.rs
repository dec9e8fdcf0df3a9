// src/services/db.rs
use crate::models::ServiceError;
use log::{error, info};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        fname TEXT NOT NULL,
        lname TEXT NOT NULL,
        picture TEXT,
        password_hash TEXT,
        two_factor_enabled BOOLEAN NOT NULL DEFAULT 0,
        notifications TEXT NOT NULL DEFAULT 'all',
        is_admin BOOLEAN NOT NULL DEFAULT 0,
        oauth_provider TEXT,
        oauth_id TEXT,
        verified BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS teams (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL,
        picture TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS memberships (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        team_id TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        joined_at TEXT NOT NULL,
        PRIMARY KEY (user_id, team_id)
    )",
    "CREATE TABLE IF NOT EXISTS invites (
        id TEXT PRIMARY KEY,
        team_id TEXT NOT NULL,
        sender TEXT NOT NULL,
        recipient TEXT NOT NULL,
        token TEXT NOT NULL UNIQUE,
        expires_at TEXT NOT NULL,
        seen BOOLEAN NOT NULL DEFAULT 0,
        resolution TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS invites_team_recipient ON invites (team_id, recipient)",
    "CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        sender TEXT NOT NULL,
        recipient TEXT NOT NULL,
        type TEXT NOT NULL,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        category TEXT NOT NULL,
        subcategory TEXT NOT NULL,
        resolution TEXT NOT NULL DEFAULT 'pending',
        seen BOOLEAN NOT NULL DEFAULT 0,
        data TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS notifications_recipient ON notifications (recipient, created_at)",
    "CREATE TABLE IF NOT EXISTS token_blacklist (
        digest TEXT PRIMARY KEY,
        revoked_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS contact_messages (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
];

/// Handle to the SQLite database holding both the user/team graph and the
/// invite, notification and blacklist documents.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self, ServiceError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        info!("🗄️ Connected to database at {}", url);
        Ok(Self { pool })
    }

    // A single connection that never idles out, so the in-memory database lives as long as the pool
    pub async fn connect_in_memory() -> Result<Self, ServiceError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), ServiceError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("✅ Database schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("🗄️ Database connection closed");
    }
}

/// Pings the database on a fixed interval, logging only when connectivity changes.
pub async fn monitor_health(db: Database, every: Duration) {
    let mut interval = tokio::time::interval(every);
    let mut healthy = true;

    loop {
        interval.tick().await;
        if db.pool.is_closed() {
            break;
        }

        match db.ping().await {
            Ok(()) if !healthy => {
                info!("✅ Database connection restored");
                healthy = true;
            }
            Ok(()) => {}
            Err(e) if healthy => {
                error!("❌ Database connection lost: {}", e);
                healthy = false;
            }
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn migrations_are_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
        db.ping().await.unwrap();
    }
}
