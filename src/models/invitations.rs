// src/models/invitations.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// Invites expire after 7 days
pub const INVITE_TTL_DAYS: i64 = 7;

// Terminal decision on a team invite; `None` while pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum InviteResolution {
    Accept,
    Decline,
}

// Team invite document
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub id: String,
    pub team_id: String,
    pub sender: String,
    pub recipient: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub seen: bool,
    pub resolution: Option<InviteResolution>,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    // Build a pending invite with a fresh token
    pub fn new(team_id: String, sender: String, recipient: String) -> Self {
        let now = Utc::now();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            team_id,
            sender,
            recipient,
            token: uuid::Uuid::new_v4().to_string(),
            expires_at: now + Duration::days(INVITE_TTL_DAYS),
            seen: false,
            resolution: None,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

// Request to invite someone to a team
#[derive(Serialize, Deserialize, Debug)]
pub struct CreateInvitationRequest {
    pub email: String,
}

// Body of POST /teams/{id}/invites/{token}; `resolution` is accepted as an alias
#[derive(Serialize, Deserialize, Debug)]
pub struct InvitationDecision {
    #[serde(alias = "resolution")]
    pub decision: InviteResolution,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct InviteTokenQuery {
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_invites_are_pending_and_unexpired() {
        let invite = Invite::new("team".into(), "a@x.com".into(), "b@x.com".into());
        assert!(!invite.is_expired());
        assert!(!invite.is_resolved());
        assert_ne!(invite.id, invite.token);
    }

    #[test]
    fn decision_accepts_the_legacy_field_name() {
        let decision: InvitationDecision = serde_json::from_str(r#"{"resolution":"decline"}"#).unwrap();
        assert_eq!(decision.decision, InviteResolution::Decline);
    }
}
