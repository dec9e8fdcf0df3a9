// src/services/invite_store.rs
use crate::models::{Invite, InviteResolution, ServiceError, TeamRole, INVITE_TTL_DAYS};
use crate::services::team_directory;
use chrono::{Duration, Utc};
use log::info;
use sqlx::SqlitePool;
use uuid::Uuid;

const INVITE_COLUMNS: &str = "id, team_id, sender, recipient, token, expires_at, seen, resolution, created_at";

/// Returns a pending invite for `recipient`, creating one or refreshing the
/// existing pending invite with a new token and expiry.
pub async fn create_or_refresh(
    pool: &SqlitePool,
    team_id: &str,
    sender: &str,
    recipient: &str,
) -> Result<Invite, ServiceError> {
    let pending = sqlx::query_as::<_, Invite>(&format!(
        "SELECT {} FROM invites WHERE team_id = ? AND recipient = ? AND resolution IS NULL",
        INVITE_COLUMNS
    ))
    .bind(team_id)
    .bind(recipient)
    .fetch_optional(pool)
    .await?;

    if let Some(mut invite) = pending {
        invite.token = Uuid::new_v4().to_string();
        invite.expires_at = Utc::now() + Duration::days(INVITE_TTL_DAYS);
        invite.sender = sender.to_string();
        invite.seen = false;

        sqlx::query("UPDATE invites SET token = ?, expires_at = ?, sender = ?, seen = 0 WHERE id = ?")
            .bind(&invite.token)
            .bind(invite.expires_at)
            .bind(&invite.sender)
            .bind(&invite.id)
            .execute(pool)
            .await?;

        info!("🔁 Refreshed pending invite {} for {}", invite.id, recipient);
        return Ok(invite);
    }

    let invite = Invite::new(team_id.to_string(), sender.to_string(), recipient.to_string());
    sqlx::query(&format!(
        "INSERT INTO invites ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        INVITE_COLUMNS
    ))
    .bind(&invite.id)
    .bind(&invite.team_id)
    .bind(&invite.sender)
    .bind(&invite.recipient)
    .bind(&invite.token)
    .bind(invite.expires_at)
    .bind(invite.seen)
    .bind(invite.resolution)
    .bind(invite.created_at)
    .execute(pool)
    .await?;

    info!("✅ Saved invite {} for {}", invite.id, recipient);
    Ok(invite)
}

// Invites are only ever looked up by the addressee holding the token
pub async fn find_for_recipient(
    pool: &SqlitePool,
    team_id: &str,
    recipient: &str,
    token: &str,
) -> Result<Option<Invite>, ServiceError> {
    let invite = sqlx::query_as::<_, Invite>(&format!(
        "SELECT {} FROM invites WHERE team_id = ? AND recipient = ? AND token = ?",
        INVITE_COLUMNS
    ))
    .bind(team_id)
    .bind(recipient)
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(invite)
}

/// Marks the invite accepted and merges the recipient's viewer edge in one
/// transaction. A second call fails with `AlreadyResolved` and changes nothing.
pub async fn accept(pool: &SqlitePool, invite: &Invite) -> Result<bool, ServiceError> {
    let mut tx = pool.begin().await?;

    let claimed = sqlx::query("UPDATE invites SET resolution = ?, seen = 1 WHERE id = ? AND resolution IS NULL")
        .bind(InviteResolution::Accept)
        .bind(&invite.id)
        .execute(&mut *tx)
        .await?;
    if claimed.rows_affected() == 0 {
        return Err(ServiceError::AlreadyResolved);
    }

    let joined =
        team_directory::merge_membership(&mut *tx, &invite.team_id, &invite.recipient, TeamRole::Viewer).await?;

    tx.commit().await?;
    Ok(joined)
}

pub async fn decline(pool: &SqlitePool, invite: &Invite) -> Result<(), ServiceError> {
    let result = sqlx::query("UPDATE invites SET resolution = ?, seen = 1 WHERE id = ? AND resolution IS NULL")
        .bind(InviteResolution::Decline)
        .bind(&invite.id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::AlreadyResolved);
    }
    Ok(())
}
