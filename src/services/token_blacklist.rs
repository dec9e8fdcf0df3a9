// src/services/token_blacklist.rs
use crate::models::ServiceError;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

// Tokens are stored by digest only
fn digest(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub async fn blacklist_token(pool: &SqlitePool, token: &str) -> Result<(), ServiceError> {
    sqlx::query("INSERT INTO token_blacklist (digest, revoked_at) VALUES (?, ?) ON CONFLICT (digest) DO NOTHING")
        .bind(digest(token))
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn is_blacklisted(pool: &SqlitePool, token: &str) -> Result<bool, ServiceError> {
    let hit: Option<(String,)> = sqlx::query_as("SELECT digest FROM token_blacklist WHERE digest = ?")
        .bind(digest(token))
        .fetch_optional(pool)
        .await?;
    Ok(hit.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::db::Database;

    #[actix_rt::test]
    async fn blacklisting_is_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();

        assert!(!is_blacklisted(db.pool(), "abc").await.unwrap());
        blacklist_token(db.pool(), "abc").await.unwrap();
        blacklist_token(db.pool(), "abc").await.unwrap();
        assert!(is_blacklisted(db.pool(), "abc").await.unwrap());
        assert!(!is_blacklisted(db.pool(), "abd").await.unwrap());
    }

    #[test]
    fn digests_are_hex_sha256() {
        let d = digest("token");
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
