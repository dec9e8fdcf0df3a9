// src/services/contact_store.rs
use crate::models::{ContactMessage, ServiceError};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn save(pool: &SqlitePool, name: &str, email: &str, message: &str) -> Result<ContactMessage, ServiceError> {
    let contact = ContactMessage {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        message: message.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query("INSERT INTO contact_messages (id, name, email, message, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&contact.id)
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.message)
        .bind(contact.created_at)
        .execute(pool)
        .await?;
    Ok(contact)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<ContactMessage>, ServiceError> {
    let messages = sqlx::query_as::<_, ContactMessage>(
        "SELECT id, name, email, message, created_at FROM contact_messages ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(messages)
}
