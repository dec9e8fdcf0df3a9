// src/services/membership.rs
use crate::models::{
    Invite, InviteResolution, Notification, NotificationResolution, ServiceError, Team, TeamData, TeamDetail,
    TeamListing, TeamMember, TeamRole, TeamSummary,
};
use crate::services::mailer::EmailMessage;
use crate::services::{invite_store, notification_store, team_directory, user_directory};
use crate::state::AppState;
use crate::utils::validation::Validator;
use log::{error, info};

fn validate_team_data(data: &TeamData) -> Result<(), ServiceError> {
    let mut v = Validator::new();
    v.min_len("name", &data.name, 2, "Name must be at least 2 characters long");
    v.min_len("description", &data.description, 2, "Description must be at least 2 characters long");
    v.finish()
}

/// Fails with `NotFound` for a missing team and `Forbidden` when `email` holds
/// less than `minimum` on it. Returns the caller's role.
async fn require_role(
    state: &AppState,
    team_id: &str,
    email: &str,
    minimum: TeamRole,
) -> Result<TeamRole, ServiceError> {
    team_directory::get_team(state.db.pool(), team_id).await?;
    match team_directory::member_role(state.db.pool(), team_id, email).await? {
        Some(role) if role >= minimum => Ok(role),
        _ => {
            error!("❌ {} lacks {} access to team {}", email, minimum, team_id);
            Err(ServiceError::Forbidden)
        }
    }
}

pub async fn create_team(state: &AppState, owner: &str, data: &TeamData) -> Result<Team, ServiceError> {
    validate_team_data(data)?;
    let data = TeamData {
        name: data.name.trim().to_string(),
        description: data.description.trim().to_string(),
        picture: data.picture.clone(),
    };
    team_directory::create_team(state.db.pool(), owner, &data).await
}

pub async fn list_teams(
    state: &AppState,
    email: &str,
    name: Option<&str>,
    limit: Option<i64>,
) -> Result<TeamListing, ServiceError> {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    team_directory::list_teams(state.db.pool(), email, name, limit).await
}

// Members only; outsiders see the team as missing
pub async fn get_team(state: &AppState, team_id: &str, email: &str) -> Result<TeamDetail, ServiceError> {
    if team_directory::member_role(state.db.pool(), team_id, email).await?.is_none() {
        return Err(ServiceError::NotFound("Team not found".to_string()));
    }
    team_directory::get_team_detail(state.db.pool(), team_id).await
}

pub async fn get_team_public(state: &AppState, team_id: &str) -> Result<TeamSummary, ServiceError> {
    team_directory::get_team_public(state.db.pool(), team_id).await
}

pub async fn update_team(state: &AppState, team_id: &str, email: &str, data: &TeamData) -> Result<Team, ServiceError> {
    validate_team_data(data)?;
    require_role(state, team_id, email, TeamRole::Owner).await?;
    team_directory::update_team(state.db.pool(), team_id, data).await
}

pub async fn delete_team(state: &AppState, team_id: &str, email: &str) -> Result<(), ServiceError> {
    require_role(state, team_id, email, TeamRole::Owner).await?;
    team_directory::delete_team(state.db.pool(), team_id).await
}

/// Invites `recipient` to the team and mails the invite link.
///
/// A pending invite for the same recipient is refreshed rather than duplicated.
pub async fn invite_member(state: &AppState, team_id: &str, sender: &str, recipient: &str) -> Result<Invite, ServiceError> {
    let mut v = Validator::new();
    let recipient = v.email("email", recipient);
    v.finish()?;

    require_role(state, team_id, sender, TeamRole::Owner).await?;

    if recipient == sender {
        return Err(ServiceError::BadRequest("You cannot invite yourself".to_string()));
    }
    if team_directory::member_role(state.db.pool(), team_id, &recipient).await?.is_some() {
        return Err(ServiceError::Conflict("User is already a member of the team".to_string()));
    }

    let team = team_directory::get_team(state.db.pool(), team_id).await?;
    let invite = invite_store::create_or_refresh(state.db.pool(), team_id, sender, &recipient).await?;

    let link = format!(
        "{}/teams/invites/{}?token={}",
        state.config.frontend_url.trim_end_matches('/'),
        team_id,
        invite.token
    );
    state
        .mailer
        .send(EmailMessage::team_invite(&recipient, sender, &team.name, &link))
        .await?;

    info!("📧 Invite to team {} sent to {}", team_id, recipient);
    Ok(invite)
}

pub async fn check_invite(
    state: &AppState,
    team_id: &str,
    recipient: &str,
    token: Option<&str>,
) -> Result<Invite, ServiceError> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServiceError::BadRequest("Invalid request".to_string()))?;

    let invite = invite_store::find_for_recipient(state.db.pool(), team_id, recipient, token)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Invalid invite".to_string()))?;

    if invite.is_expired() {
        return Err(ServiceError::Expired("Invite expired".to_string()));
    }
    Ok(invite)
}

/// Accepts or declines an invite addressed to `recipient`.
///
/// Acceptance marks the invite and merges a viewer edge in one transaction, then
/// tells the sender. Returns the resolved invite.
pub async fn resolve_team_invitation(
    state: &AppState,
    team_id: &str,
    token: &str,
    recipient: &str,
    decision: InviteResolution,
) -> Result<Invite, ServiceError> {
    let mut invite = invite_store::find_for_recipient(state.db.pool(), team_id, recipient, token)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Invalid invite".to_string()))?;

    if invite.is_resolved() {
        return Err(ServiceError::AlreadyResolved);
    }
    if invite.is_expired() {
        return Err(ServiceError::Expired("Invite expired".to_string()));
    }

    match decision {
        InviteResolution::Accept => {
            let joined = invite_store::accept(state.db.pool(), &invite).await?;
            if joined {
                let notification = Notification::team_access_response(recipient, &invite.sender, team_id);
                notification_store::create(state.db.pool(), &notification).await?;
            }
            info!("✅ {} joined team {}", recipient, team_id);
        }
        InviteResolution::Decline => {
            invite_store::decline(state.db.pool(), &invite).await?;
            info!("🚫 {} declined invite to team {}", recipient, team_id);
        }
    }

    invite.resolution = Some(decision);
    invite.seen = true;
    Ok(invite)
}

// Sends a pending access request to the team owner
pub async fn request_team_access(state: &AppState, team_id: &str, requester: &str) -> Result<Notification, ServiceError> {
    let owner = team_directory::owner_email(state.db.pool(), team_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Team not found".to_string()))?;

    if team_directory::member_role(state.db.pool(), team_id, requester).await?.is_some() {
        return Err(ServiceError::Conflict("User is already a member of the team".to_string()));
    }

    let notification = Notification::team_access_request(requester, &owner, team_id);
    notification_store::create(state.db.pool(), &notification).await?;

    info!("🙋 {} requested access to team {}", requester, team_id);
    Ok(notification)
}

pub async fn resolve_action(
    state: &AppState,
    notification_id: &str,
    recipient: &str,
    resolution: NotificationResolution,
) -> Result<Notification, ServiceError> {
    let (notification, joined) =
        notification_store::resolve(state.db.pool(), notification_id, recipient, resolution).await?;
    if joined {
        info!("✅ {} was granted access to team {:?}", notification.sender, notification.team_id());
    }
    Ok(notification)
}

pub async fn mark_seen(state: &AppState, notification_id: &str, recipient: &str, seen: bool) -> Result<(), ServiceError> {
    notification_store::mark_seen(state.db.pool(), notification_id, recipient, seen).await
}

pub async fn list_activity(state: &AppState, recipient: &str) -> Result<Vec<Notification>, ServiceError> {
    notification_store::list_for_recipient(state.db.pool(), recipient).await
}

/// Adds an existing user as a viewer. Returns `false` if they were already a member.
pub async fn add_member(state: &AppState, team_id: &str, actor: &str, email: &str) -> Result<bool, ServiceError> {
    let mut v = Validator::new();
    let email = v.email("email", email);
    v.finish()?;

    require_role(state, team_id, actor, TeamRole::Editor).await?;
    user_directory::get_by_email(state.db.pool(), &email).await?;

    let mut conn = state.db.pool().acquire().await?;
    team_directory::merge_membership(&mut conn, team_id, &email, TeamRole::Viewer).await
}

pub async fn update_member_role(
    state: &AppState,
    team_id: &str,
    owner: &str,
    email: &str,
    role: TeamRole,
) -> Result<(), ServiceError> {
    if role == TeamRole::Owner {
        return Err(ServiceError::BadRequest("Role must be editor or viewer".to_string()));
    }
    require_role(state, team_id, owner, TeamRole::Owner).await?;

    let email = email.trim().to_lowercase();
    if !team_directory::set_member_role(state.db.pool(), team_id, &email, role).await? {
        return Err(ServiceError::NotFound("Member not found".to_string()));
    }

    let notification = Notification::member_role_updated(owner, &email, team_id, role.as_str());
    notification_store::create(state.db.pool(), &notification).await?;

    info!("🔄 {} is now {} in team {}", email, role, team_id);
    Ok(())
}

// Owners remove anyone but themselves; members may remove themselves
pub async fn remove_member(state: &AppState, team_id: &str, actor: &str, email: &str) -> Result<(), ServiceError> {
    let email = email.trim().to_lowercase();
    if email != actor {
        require_role(state, team_id, actor, TeamRole::Owner).await?;
    }

    match team_directory::member_role(state.db.pool(), team_id, &email).await? {
        Some(TeamRole::Owner) => {
            return Err(ServiceError::BadRequest("The team owner cannot be removed".to_string()))
        }
        Some(_) => {}
        None => return Err(ServiceError::NotFound("Member not found".to_string())),
    }

    team_directory::remove_member(state.db.pool(), team_id, &email).await?;
    info!("🗑️ {} removed from team {}", email, team_id);
    Ok(())
}

pub async fn list_members(state: &AppState, team_id: &str, actor: &str) -> Result<Vec<TeamMember>, ServiceError> {
    require_role(state, team_id, actor, TeamRole::Viewer).await?;
    team_directory::list_members(state.db.pool(), team_id).await
}

// Membership lookups are for people already on the team
pub async fn is_member(state: &AppState, team_id: &str, actor: &str, email: &str) -> Result<bool, ServiceError> {
    require_role(state, team_id, actor, TeamRole::Viewer).await?;
    let email = email.trim().to_lowercase();
    Ok(team_directory::member_role(state.db.pool(), team_id, &email).await?.is_some())
}
