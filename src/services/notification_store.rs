// src/services/notification_store.rs
use crate::models::{
    Notification, NotificationCategory, NotificationResolution, NotificationSubcategory, NotificationType,
    ServiceError, TeamRole,
};
use crate::services::team_directory;
use chrono::{DateTime, Utc};
use log::{info, warn};
use sqlx::SqlitePool;

const NOTIFICATION_COLUMNS: &str =
    "id, sender, recipient, type, title, message, category, subcategory, resolution, seen, data, created_at";

// `data` is stored as JSON text
#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    sender: String,
    recipient: String,
    #[sqlx(rename = "type")]
    kind: NotificationType,
    title: String,
    message: String,
    category: NotificationCategory,
    subcategory: NotificationSubcategory,
    resolution: NotificationResolution,
    seen: bool,
    data: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = ServiceError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            sender: row.sender,
            recipient: row.recipient,
            kind: row.kind,
            title: row.title,
            message: row.message,
            category: row.category,
            subcategory: row.subcategory,
            resolution: row.resolution,
            seen: row.seen,
            data: serde_json::from_str(&row.data)?,
            created_at: row.created_at,
        })
    }
}

pub async fn create(pool: &SqlitePool, notification: &Notification) -> Result<(), ServiceError> {
    sqlx::query(&format!(
        "INSERT INTO notifications ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        NOTIFICATION_COLUMNS
    ))
    .bind(&notification.id)
    .bind(&notification.sender)
    .bind(&notification.recipient)
    .bind(notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.category)
    .bind(notification.subcategory)
    .bind(notification.resolution)
    .bind(notification.seen)
    .bind(serde_json::to_string(&notification.data)?)
    .bind(notification.created_at)
    .execute(pool)
    .await?;

    info!("🔔 Notification {} sent to {}", notification.id, notification.recipient);
    Ok(())
}

// Newest first, soft-deleted entries hidden
pub async fn list_for_recipient(pool: &SqlitePool, recipient: &str) -> Result<Vec<Notification>, ServiceError> {
    let rows = sqlx::query_as::<_, NotificationRow>(&format!(
        "SELECT {} FROM notifications WHERE recipient = ? AND resolution != 'deleted' ORDER BY created_at DESC",
        NOTIFICATION_COLUMNS
    ))
    .bind(recipient)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Notification::try_from).collect()
}

pub async fn find_for_recipient(
    pool: &SqlitePool,
    id: &str,
    recipient: &str,
) -> Result<Option<Notification>, ServiceError> {
    let row = sqlx::query_as::<_, NotificationRow>(&format!(
        "SELECT {} FROM notifications WHERE id = ? AND recipient = ?",
        NOTIFICATION_COLUMNS
    ))
    .bind(id)
    .bind(recipient)
    .fetch_optional(pool)
    .await?;

    row.map(Notification::try_from).transpose()
}

pub async fn mark_seen(pool: &SqlitePool, id: &str, recipient: &str, seen: bool) -> Result<(), ServiceError> {
    let result = sqlx::query("UPDATE notifications SET seen = ? WHERE id = ? AND recipient = ?")
        .bind(seen)
        .bind(id)
        .bind(recipient)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound("Notification not found".to_string()));
    }
    Ok(())
}

/// Records the recipient's resolution and marks the notification seen.
///
/// Approving a team access request merges the requester's viewer edge in the same
/// transaction; repeating the approval leaves the single edge in place. Returns the
/// updated notification and whether a new edge was created.
pub async fn resolve(
    pool: &SqlitePool,
    id: &str,
    recipient: &str,
    resolution: NotificationResolution,
) -> Result<(Notification, bool), ServiceError> {
    let mut tx = pool.begin().await?;

    // The update must be the first statement so the transaction holds the write lock throughout
    let row = sqlx::query_as::<_, NotificationRow>(&format!(
        "UPDATE notifications SET resolution = ?, seen = 1 WHERE id = ? AND recipient = ? RETURNING {}",
        NOTIFICATION_COLUMNS
    ))
    .bind(resolution)
    .bind(id)
    .bind(recipient)
    .fetch_optional(&mut *tx)
    .await?;

    let notification = match row {
        Some(row) => Notification::try_from(row)?,
        None => return Err(ServiceError::NotFound("Notification not found".to_string())),
    };

    let mut joined = false;
    if notification.kind == NotificationType::TeamAccessRequest && resolution == NotificationResolution::Approved {
        match notification.team_id() {
            Some(team_id) => {
                joined = team_directory::merge_membership(&mut *tx, team_id, &notification.sender, TeamRole::Viewer)
                    .await?;
            }
            None => warn!("⚠️ Access request {} carries no team id", id),
        }
    }

    tx.commit().await?;
    Ok((notification, joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::db::Database;

    async fn pool() -> SqlitePool {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.pool().clone()
    }

    #[actix_rt::test]
    async fn deleted_notifications_are_hidden() {
        let pool = pool().await;
        let keep = Notification::team_access_request("b@x.com", "a@x.com", "t1");
        let hidden = Notification::team_access_request("c@x.com", "a@x.com", "t1");
        create(&pool, &keep).await.unwrap();
        create(&pool, &hidden).await.unwrap();

        resolve(&pool, &hidden.id, "a@x.com", NotificationResolution::Deleted).await.unwrap();

        let listed = list_for_recipient(&pool, "a@x.com").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep.id);
        assert_eq!(listed[0].team_id(), Some("t1"));
    }

    #[actix_rt::test]
    async fn only_the_recipient_can_resolve() {
        let pool = pool().await;
        let notification = Notification::team_access_request("b@x.com", "a@x.com", "t1");
        create(&pool, &notification).await.unwrap();

        let err = resolve(&pool, &notification.id, "b@x.com", NotificationResolution::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_rt::test]
    async fn concurrent_approvals_merge_one_edge() {
        use crate::models::{NewUser, TeamData};
        use crate::services::user_directory;

        let path = std::env::temp_dir().join(format!("statroom-resolve-{}.db", uuid::Uuid::new_v4()));
        let db = Database::connect(&format!("sqlite://{}", path.display())).await.unwrap();
        db.migrate().await.unwrap();
        let pool = db.pool().clone();

        for email in ["a@x.com", "b@x.com"] {
            user_directory::create_user(
                &pool,
                NewUser {
                    email: email.to_string(),
                    fname: "Test".to_string(),
                    lname: "User".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        let team = team_directory::create_team(
            &pool,
            "a@x.com",
            &TeamData {
                name: "Rovers".to_string(),
                description: "Weekend league".to_string(),
                picture: None,
            },
        )
        .await
        .unwrap();

        for _ in 0..5 {
            let notification = Notification::team_access_request("b@x.com", "a@x.com", &team.id);
            create(&pool, &notification).await.unwrap();

            let approvals = (0..4).map(|_| resolve(&pool, &notification.id, "a@x.com", NotificationResolution::Approved));
            let results = futures::future::join_all(approvals).await;

            let joined = results
                .into_iter()
                .map(|r| r.expect("every approval succeeds").1)
                .filter(|joined| *joined)
                .count();
            assert!(joined <= 1);
            assert_eq!(team_directory::list_members(&pool, &team.id).await.unwrap().len(), 2);
        }

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[actix_rt::test]
    async fn mark_seen_toggles() {
        let pool = pool().await;
        let notification = Notification::team_access_request("b@x.com", "a@x.com", "t1");
        create(&pool, &notification).await.unwrap();

        mark_seen(&pool, &notification.id, "a@x.com", true).await.unwrap();
        let found = find_for_recipient(&pool, &notification.id, "a@x.com").await.unwrap().unwrap();
        assert!(found.seen);
    }
}
