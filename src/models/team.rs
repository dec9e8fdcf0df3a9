use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    pub description: String,
    pub picture: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Declaration order is rank order: `role >= TeamRole::Editor` means "at least editor"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TeamRole {
    Viewer,
    Editor,
    Owner,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Viewer => "viewer",
            TeamRole::Editor => "editor",
            TeamRole::Owner => "owner",
        }
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// A membership edge joined with the member's public profile
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub email: String,
    pub fname: String,
    pub lname: String,
    pub picture: Option<String>,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

// Team listing entry with owner and member count
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub picture: String,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub members: i64,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TeamListing {
    pub my_teams: Vec<TeamSummary>,
    pub other_teams: Vec<TeamSummary>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: Team,
    pub owner: Option<String>,
    pub members: Vec<TeamMember>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TeamData {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TeamListQuery {
    pub name: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MemberRoleRequest {
    pub email: String,
    pub role: TeamRole,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MemberQuery {
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ranked() {
        assert!(TeamRole::Owner > TeamRole::Editor);
        assert!(TeamRole::Editor > TeamRole::Viewer);
    }

    #[test]
    fn unknown_roles_are_rejected() {
        assert!(serde_json::from_str::<TeamRole>(r#""admin""#).is_err());
        assert_eq!(serde_json::from_str::<TeamRole>(r#""editor""#).unwrap(), TeamRole::Editor);
    }
}
