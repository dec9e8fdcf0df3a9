// src/services/team_directory.rs
use crate::models::{ServiceError, Team, TeamData, TeamDetail, TeamListing, TeamMember, TeamRole, TeamSummary};
use crate::services::user_directory::is_unique_violation;
use chrono::Utc;
use log::{error, info};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

const SUMMARY_SELECT: &str = "SELECT t.id, t.name, t.description, t.picture, \
     (SELECT ou.email FROM memberships om JOIN users ou ON ou.id = om.user_id \
      WHERE om.team_id = t.id AND om.role = 'owner') AS owner, \
     t.created_at, \
     (SELECT COUNT(*) FROM memberships mc WHERE mc.team_id = t.id) AS members \
     FROM teams t";

/// Creates a team and the creator's owner edge in one transaction.
pub async fn create_team(pool: &SqlitePool, owner_email: &str, data: &TeamData) -> Result<Team, ServiceError> {
    let now = Utc::now();
    let team = Team {
        id: Uuid::new_v4().to_string(),
        name: data.name.clone(),
        description: data.description.clone(),
        picture: data.picture.clone().unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO teams (id, name, description, picture, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&team.id)
    .bind(&team.name)
    .bind(&team.description)
    .bind(&team.picture)
    .bind(team.created_at)
    .bind(team.updated_at)
    .execute(&mut *tx)
    .await;

    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            error!("❌ Team name already taken: {}", team.name);
            return Err(ServiceError::Conflict("Team already exists".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    if !merge_membership(&mut *tx, &team.id, owner_email, TeamRole::Owner).await? {
        return Err(ServiceError::NotFound("User not found".to_string()));
    }

    tx.commit().await?;
    info!("✅ Team created: {} ({})", team.name, team.id);
    Ok(team)
}

pub async fn find_team(pool: &SqlitePool, team_id: &str) -> Result<Option<Team>, ServiceError> {
    let team = sqlx::query_as::<_, Team>(
        "SELECT id, name, description, picture, created_at, updated_at FROM teams WHERE id = ?",
    )
    .bind(team_id)
    .fetch_optional(pool)
    .await?;
    Ok(team)
}

pub async fn get_team(pool: &SqlitePool, team_id: &str) -> Result<Team, ServiceError> {
    find_team(pool, team_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Team not found".to_string()))
}

// Team summary regardless of membership
pub async fn get_team_public(pool: &SqlitePool, team_id: &str) -> Result<TeamSummary, ServiceError> {
    sqlx::query_as::<_, TeamSummary>(&format!("{} WHERE t.id = ?", SUMMARY_SELECT))
        .bind(team_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Team not found".to_string()))
}

pub async fn get_team_detail(pool: &SqlitePool, team_id: &str) -> Result<TeamDetail, ServiceError> {
    let team = get_team(pool, team_id).await?;
    let members = list_members(pool, team_id).await?;
    let owner = members
        .iter()
        .find(|m| m.role == TeamRole::Owner)
        .map(|m| m.email.clone());

    Ok(TeamDetail { team, owner, members })
}

/// Teams the user owns and teams the user merely belongs to, optionally filtered by
/// a case-insensitive name fragment and capped per group.
pub async fn list_teams(
    pool: &SqlitePool,
    email: &str,
    name: Option<&str>,
    limit: Option<i64>,
) -> Result<TeamListing, ServiceError> {
    let limit = limit.filter(|l| *l > 0).unwrap_or(-1);

    let by_role = |role_clause: &str| {
        format!(
            "{} JOIN memberships m ON m.team_id = t.id JOIN users u ON u.id = m.user_id \
             WHERE u.email = ? AND {} AND (? IS NULL OR instr(lower(t.name), lower(?)) > 0) \
             ORDER BY t.created_at DESC LIMIT ?",
            SUMMARY_SELECT, role_clause
        )
    };
    let owned_sql = by_role("m.role = 'owner'");
    let member_sql = by_role("m.role != 'owner'");

    let my_teams = sqlx::query_as::<_, TeamSummary>(&owned_sql)
        .bind(email)
        .bind(name)
        .bind(name)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let other_teams = sqlx::query_as::<_, TeamSummary>(&member_sql)
        .bind(email)
        .bind(name)
        .bind(name)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(TeamListing { my_teams, other_teams })
}

pub async fn update_team(pool: &SqlitePool, team_id: &str, data: &TeamData) -> Result<Team, ServiceError> {
    let updated = sqlx::query(
        "UPDATE teams SET name = ?, description = ?, picture = COALESCE(?, picture), updated_at = ? WHERE id = ?",
    )
    .bind(&data.name)
    .bind(&data.description)
    .bind(&data.picture)
    .bind(Utc::now())
    .bind(team_id)
    .execute(pool)
    .await;

    match updated {
        Ok(result) if result.rows_affected() == 0 => {
            return Err(ServiceError::NotFound("Team not found".to_string()))
        }
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(ServiceError::Conflict("Team already exists".to_string()))
        }
        Err(e) => return Err(e.into()),
    }

    get_team(pool, team_id).await
}

// Removes the team with its edges and invites
pub async fn delete_team(pool: &SqlitePool, team_id: &str) -> Result<(), ServiceError> {
    let mut tx = pool.begin().await?;
    for statement in [
        "DELETE FROM invites WHERE team_id = ?",
        "DELETE FROM memberships WHERE team_id = ?",
        "DELETE FROM teams WHERE id = ?",
    ] {
        sqlx::query(statement).bind(team_id).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!("🗑️ Team deleted: {}", team_id);
    Ok(())
}

/// Creates the (user, team) edge unless one already exists.
///
/// Returns `false` when nothing was inserted: the edge already existed, or the
/// user or team is missing. Takes a connection so callers can run it inside the
/// transaction that resolves the invite or notification.
pub async fn merge_membership(
    conn: &mut SqliteConnection,
    team_id: &str,
    email: &str,
    role: TeamRole,
) -> Result<bool, ServiceError> {
    let result = sqlx::query(
        "INSERT INTO memberships (user_id, team_id, role, joined_at) \
         SELECT u.id, t.id, ?, ? FROM users u, teams t WHERE u.email = ? AND t.id = ? \
         ON CONFLICT (user_id, team_id) DO NOTHING",
    )
    .bind(role)
    .bind(Utc::now())
    .bind(email)
    .bind(team_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn member_role(pool: &SqlitePool, team_id: &str, email: &str) -> Result<Option<TeamRole>, ServiceError> {
    let role: Option<(TeamRole,)> = sqlx::query_as(
        "SELECT m.role FROM memberships m JOIN users u ON u.id = m.user_id WHERE m.team_id = ? AND u.email = ?",
    )
    .bind(team_id)
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(role.map(|(role,)| role))
}

pub async fn owner_email(pool: &SqlitePool, team_id: &str) -> Result<Option<String>, ServiceError> {
    let owner: Option<(String,)> = sqlx::query_as(
        "SELECT u.email FROM memberships m JOIN users u ON u.id = m.user_id WHERE m.team_id = ? AND m.role = 'owner'",
    )
    .bind(team_id)
    .fetch_optional(pool)
    .await?;
    Ok(owner.map(|(email,)| email))
}

pub async fn list_members(pool: &SqlitePool, team_id: &str) -> Result<Vec<TeamMember>, ServiceError> {
    let members = sqlx::query_as::<_, TeamMember>(
        "SELECT u.email, u.fname, u.lname, u.picture, m.role, m.joined_at \
         FROM memberships m JOIN users u ON u.id = m.user_id WHERE m.team_id = ? ORDER BY m.joined_at",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;
    Ok(members)
}

// Owner edges are never rewritten here
pub async fn set_member_role(
    pool: &SqlitePool,
    team_id: &str,
    email: &str,
    role: TeamRole,
) -> Result<bool, ServiceError> {
    let result = sqlx::query(
        "UPDATE memberships SET role = ? WHERE team_id = ? AND role != 'owner' \
         AND user_id = (SELECT id FROM users WHERE email = ?)",
    )
    .bind(role)
    .bind(team_id)
    .bind(email)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove_member(pool: &SqlitePool, team_id: &str, email: &str) -> Result<bool, ServiceError> {
    let result = sqlx::query(
        "DELETE FROM memberships WHERE team_id = ? AND role != 'owner' \
         AND user_id = (SELECT id FROM users WHERE email = ?)",
    )
    .bind(team_id)
    .bind(email)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
