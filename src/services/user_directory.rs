// src/services/user_directory.rs
use crate::models::{AccountUpdate, NewUser, NotificationPref, ServiceError, User};
use chrono::Utc;
use log::{error, info};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, fname, lname, picture, password_hash, two_factor_enabled, \
     notifications, is_admin, oauth_provider, oauth_id, verified, created_at";

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, ServiceError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, ServiceError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

// Like find_by_email, but absence is an error
pub async fn get_by_email(pool: &SqlitePool, email: &str) -> Result<User, ServiceError> {
    find_by_email(pool, email)
        .await?
        .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
}

async fn insert(pool: &SqlitePool, user: &NewUser, on_conflict_ignore: bool) -> Result<u64, sqlx::Error> {
    let sql = format!(
        "INSERT INTO users (id, email, fname, lname, picture, password_hash, two_factor_enabled, \
         notifications, is_admin, oauth_provider, oauth_id, verified, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?){}",
        if on_conflict_ignore { " ON CONFLICT (email) DO NOTHING" } else { "" }
    );

    let result = sqlx::query(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(&user.email)
        .bind(&user.fname)
        .bind(&user.lname)
        .bind(&user.picture)
        .bind(&user.password_hash)
        .bind(user.two_factor_enabled)
        .bind(NotificationPref::default())
        .bind(&user.oauth_provider)
        .bind(&user.oauth_id)
        .bind(user.verified)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Inserts a new user, failing with `Conflict` when the email is taken.
pub async fn create_user(pool: &SqlitePool, user: NewUser) -> Result<User, ServiceError> {
    match insert(pool, &user, false).await {
        Ok(_) => {
            info!("👤 Created user {}", user.email);
            get_by_email(pool, &user.email).await
        }
        Err(e) if is_unique_violation(&e) => {
            error!("❌ User already exists: {}", user.email);
            Err(ServiceError::Conflict("User already exists".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Returns the user for `user.email`, inserting it first if absent.
///
/// The insert is a no-op on an existing email, so concurrent callers converge on
/// the same row instead of racing a read-then-write.
pub async fn create_or_fetch(pool: &SqlitePool, user: NewUser) -> Result<(User, bool), ServiceError> {
    let created = insert(pool, &user, true).await? > 0;
    if created {
        info!("👤 Created user {}", user.email);
    }
    Ok((get_by_email(pool, &user.email).await?, created))
}

// Attach an OAuth identity to an account that has none yet
pub async fn link_oauth(
    pool: &SqlitePool,
    email: &str,
    provider: &str,
    oauth_id: &str,
) -> Result<(), ServiceError> {
    sqlx::query("UPDATE users SET oauth_provider = ?, oauth_id = ? WHERE email = ? AND oauth_id IS NULL")
        .bind(provider)
        .bind(oauth_id)
        .bind(email)
        .execute(pool)
        .await?;
    Ok(())
}

// Runs a single-row update keyed by email and returns the fresh row
async fn update_one<'q>(
    pool: &SqlitePool,
    email: &str,
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
) -> Result<User, ServiceError> {
    let result = query.execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound("User not found".to_string()));
    }
    get_by_email(pool, email).await
}

pub async fn update_profile(pool: &SqlitePool, email: &str, update: &AccountUpdate) -> Result<User, ServiceError> {
    let query = sqlx::query("UPDATE users SET fname = ?, lname = ?, picture = COALESCE(?, picture) WHERE email = ?")
        .bind(&update.fname)
        .bind(&update.lname)
        .bind(&update.picture)
        .bind(email);
    update_one(pool, email, query).await
}

pub async fn set_two_factor(pool: &SqlitePool, email: &str, enabled: bool) -> Result<User, ServiceError> {
    let query = sqlx::query("UPDATE users SET two_factor_enabled = ? WHERE email = ?")
        .bind(enabled)
        .bind(email);
    update_one(pool, email, query).await
}

pub async fn set_notification_pref(
    pool: &SqlitePool,
    email: &str,
    pref: NotificationPref,
) -> Result<User, ServiceError> {
    let query = sqlx::query("UPDATE users SET notifications = ? WHERE email = ?")
        .bind(pref)
        .bind(email);
    update_one(pool, email, query).await
}

pub async fn set_password(pool: &SqlitePool, email: &str, password_hash: &str) -> Result<User, ServiceError> {
    let query = sqlx::query("UPDATE users SET password_hash = ? WHERE email = ?")
        .bind(password_hash)
        .bind(email);
    update_one(pool, email, query).await
}

/// Moves an account to a new email address.
///
/// Membership edges follow the user id; invites and notifications addressed to or
/// from the old address are re-keyed in the same transaction.
pub async fn set_email(pool: &SqlitePool, old_email: &str, new_email: &str) -> Result<User, ServiceError> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE users SET email = ? WHERE email = ?")
        .bind(new_email)
        .bind(old_email)
        .execute(&mut *tx)
        .await;

    match updated {
        Ok(result) if result.rows_affected() == 0 => {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(ServiceError::Conflict("Email already in use".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    for statement in [
        "UPDATE invites SET recipient = ? WHERE recipient = ?",
        "UPDATE invites SET sender = ? WHERE sender = ?",
        "UPDATE notifications SET recipient = ? WHERE recipient = ?",
        "UPDATE notifications SET sender = ? WHERE sender = ?",
    ] {
        sqlx::query(statement)
            .bind(new_email)
            .bind(old_email)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    info!("✉️ Email changed from {} to {}", old_email, new_email);
    get_by_email(pool, new_email).await
}

pub async fn count(pool: &SqlitePool) -> Result<i64, ServiceError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
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

    fn alice() -> NewUser {
        NewUser {
            email: "alice@x.com".to_string(),
            fname: "Alice".to_string(),
            lname: "Smith".to_string(),
            password_hash: Some("hash".to_string()),
            verified: true,
            ..Default::default()
        }
    }

    #[actix_rt::test]
    async fn duplicate_emails_conflict() {
        let pool = pool().await;
        create_user(&pool, alice()).await.unwrap();
        let err = create_user(&pool, alice()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(count(&pool).await.unwrap(), 1);
    }

    #[actix_rt::test]
    async fn create_or_fetch_converges_on_one_row() {
        let pool = pool().await;
        let (first, created) = create_or_fetch(&pool, alice()).await.unwrap();
        let (second, created_again) = create_or_fetch(&pool, alice()).await.unwrap();
        assert!(created);
        assert!(!created_again);
        assert_eq!(first.id, second.id);
        assert_eq!(count(&pool).await.unwrap(), 1);
    }

    #[actix_rt::test]
    async fn profile_update_keeps_picture_when_absent() {
        let pool = pool().await;
        let mut user = alice();
        user.picture = Some("pic.png".to_string());
        create_user(&pool, user).await.unwrap();

        let update = AccountUpdate {
            fname: "Alicia".to_string(),
            lname: "Smith".to_string(),
            picture: None,
        };
        let updated = update_profile(&pool, "alice@x.com", &update).await.unwrap();
        assert_eq!(updated.fname, "Alicia");
        assert_eq!(updated.picture.as_deref(), Some("pic.png"));
    }

    #[actix_rt::test]
    async fn email_change_rejects_taken_addresses() {
        let pool = pool().await;
        create_user(&pool, alice()).await.unwrap();
        let mut bob = alice();
        bob.email = "bob@x.com".to_string();
        create_user(&pool, bob).await.unwrap();

        let err = set_email(&pool, "alice@x.com", "bob@x.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let moved = set_email(&pool, "alice@x.com", "alice@y.com").await.unwrap();
        assert_eq!(moved.email, "alice@y.com");
        assert!(find_by_email(&pool, "alice@x.com").await.unwrap().is_none());
    }
}
