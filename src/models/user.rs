// src/models/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationPref {
    All,
    None,
    Important,
}

impl NotificationPref {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPref::All => "all",
            NotificationPref::None => "none",
            NotificationPref::Important => "important",
        }
    }
}

impl Default for NotificationPref {
    fn default() -> Self {
        NotificationPref::All
    }
}

impl fmt::Display for NotificationPref {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// A user node as stored in the directory
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub fname: String,
    pub lname: String,
    pub picture: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub two_factor_enabled: bool,
    pub notifications: NotificationPref,
    pub is_admin: bool,
    pub oauth_provider: Option<String>,
    #[serde(skip_serializing, default)]
    pub oauth_id: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

// Fields accepted when inserting a new user node
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub fname: String,
    pub lname: String,
    pub picture: Option<String>,
    pub password_hash: Option<String>,
    pub two_factor_enabled: bool,
    pub verified: bool,
    pub oauth_provider: Option<String>,
    pub oauth_id: Option<String>,
}

// The user subset signed into access and refresh tokens
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUser {
    pub id: String,
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub picture: Option<String>,
    pub two_factor_enabled: bool,
    pub is_admin: bool,
    pub notifications: NotificationPref,
}

impl From<&User> for TokenUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            fname: user.fname.clone(),
            lname: user.lname.clone(),
            email: user.email.clone(),
            picture: user.picture.clone(),
            two_factor_enabled: user.two_factor_enabled,
            is_admin: user.is_admin,
            notifications: user.notifications,
        }
    }
}

// Registration waiting for its OTP, kept in the key-value store
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PendingRegistration {
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub password_hash: String,
    pub otp: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    Login,
    Verify,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct OtpRequest {
    pub email: String,
    pub otp: String,
    #[serde(rename = "type", default)]
    pub purpose: Option<OtpPurpose>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub old_password: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordAnonRequest {
    pub email: String,
    pub otp: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Signup,
    Login,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OAuthRequest {
    pub auth_type: Option<AuthType>,
    pub code: Option<String>,
    #[serde(rename = "access_token")]
    pub access_token: Option<String>,
}

// Allow-listed account fields; nothing else can be written through PATCH /account
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccountUpdate {
    pub fname: String,
    pub lname: String,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorRequest {
    pub two_factor_enabled: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct NotificationSettingsRequest {
    pub notifications: NotificationPref,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_never_serializes() {
        let user = User {
            id: "u1".to_string(),
            email: "alice@x.com".to_string(),
            fname: "Alice".to_string(),
            lname: "Smith".to_string(),
            picture: None,
            password_hash: Some("$2b$12$secret".to_string()),
            two_factor_enabled: false,
            notifications: NotificationPref::All,
            is_admin: false,
            oauth_provider: None,
            oauth_id: None,
            verified: true,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert_eq!(value["twoFactorEnabled"], false);
    }

    #[test]
    fn notification_pref_rejects_unknown_values() {
        let parsed: NotificationSettingsRequest =
            serde_json::from_str(r#"{"notifications":"important"}"#).unwrap();
        assert_eq!(parsed.notifications, NotificationPref::Important);
        assert!(serde_json::from_str::<NotificationSettingsRequest>(r#"{"notifications":"loud"}"#).is_err());
    }
}
