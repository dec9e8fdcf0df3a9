use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationType {
    TeamAccessRequest,
    TeamAccessResponse,
    UpdateTeamMemberRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationCategory {
    Team,
    Billing,
    Notifications,
    Integrations,
    Preferences,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationSubcategory {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationResolution {
    Pending,
    Approved,
    Rejected,
    Deleted,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub subcategory: NotificationSubcategory,
    pub resolution: NotificationResolution,
    pub seen: bool,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn new(
        sender: &str,
        recipient: &str,
        kind: NotificationType,
        title: &str,
        message: String,
        data: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            kind,
            title: title.to_string(),
            message,
            category: NotificationCategory::Team,
            subcategory: NotificationSubcategory::Info,
            resolution: NotificationResolution::Pending,
            seen: false,
            data,
            created_at: Utc::now(),
        }
    }

    pub fn team_access_request(requester: &str, owner: &str, team_id: &str) -> Self {
        Self::new(
            requester,
            owner,
            NotificationType::TeamAccessRequest,
            "Team Access Request",
            format!("{} has requested to join your team", requester),
            json!({ "teamId": team_id }),
        )
    }

    pub fn team_access_response(member: &str, inviter: &str, team_id: &str) -> Self {
        Self::new(
            member,
            inviter,
            NotificationType::TeamAccessResponse,
            "Team Access Response",
            format!("{} has accepted your team invite", member),
            json!({ "teamId": team_id }),
        )
    }

    pub fn member_role_updated(owner: &str, member: &str, team_id: &str, role: &str) -> Self {
        Self::new(
            owner,
            member,
            NotificationType::UpdateTeamMemberRole,
            "Team Role Updated",
            format!("{} changed your team role to {}", owner, role),
            json!({ "teamId": team_id, "role": role }),
        )
    }

    // Team id carried in the payload of team notifications
    pub fn team_id(&self) -> Option<&str> {
        self.data.get("teamId").and_then(Value::as_str)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ResolveActionRequest {
    pub resolution: NotificationResolution,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SeenRequest {
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_requests_start_pending_and_carry_the_team() {
        let notification = Notification::team_access_request("b@x.com", "a@x.com", "t1");
        assert_eq!(notification.resolution, NotificationResolution::Pending);
        assert_eq!(notification.team_id(), Some("t1"));
        assert!(!notification.seen);

        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "team_access_request");
        assert_eq!(value["category"], "team");
    }
}
