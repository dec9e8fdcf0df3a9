// src/services/oauth.rs
use crate::config::Config;
use crate::models::ServiceError;
use log::{error, info};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo?alt=json";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

impl FromStr for OAuthProvider {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            _ => Err(ServiceError::BadRequest("Invalid provider".to_string())),
        }
    }
}

/// Body of a provider's code-for-token exchange.
///
/// Providers answer 200 with either shape, so the variant decides the outcome,
/// not the status code.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OAuthTokenResponse {
    Failure {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
    Success {
        access_token: String,
        #[serde(default)]
        token_type: Option<String>,
        #[serde(default)]
        scope: Option<String>,
    },
}

impl OAuthTokenResponse {
    pub fn parse(body: Value) -> Result<Self, ServiceError> {
        serde_json::from_value(body).map_err(|e| {
            error!("❌ Unrecognised token response from provider: {}", e);
            ServiceError::Upstream("oauth provider".to_string())
        })
    }

    pub fn into_access_token(self) -> Result<String, ServiceError> {
        match self {
            OAuthTokenResponse::Success { access_token, .. } => Ok(access_token),
            OAuthTokenResponse::Failure { error, error_description } => {
                error!("❌ Provider rejected the code: {} {:?}", error, error_description);
                Err(ServiceError::BadRequest(error))
            }
        }
    }
}

// Identity reported by a provider, normalised across providers
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProfile {
    pub provider: OAuthProvider,
    pub provider_id: String,
    pub email: String,
    pub fname: String,
    pub lname: String,
    pub picture: Option<String>,
}

#[derive(Deserialize)]
struct GoogleUser {
    id: String,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

#[derive(Deserialize)]
struct GithubUser {
    id: u64,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
}

// "Ada Lovelace King" -> ("Ada", "Lovelace King")
fn split_name(name: Option<&str>) -> (String, String) {
    let name = name.unwrap_or("").trim();
    match name.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

fn missing_email() -> ServiceError {
    ServiceError::BadRequest("Provider did not return an email address".to_string())
}

#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    github_client_id: String,
    github_client_secret: String,
}

impl OAuthClient {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("statroom-service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            github_client_id: config.github_client_id.clone(),
            github_client_secret: config.github_client_secret.clone(),
        })
    }

    pub async fn google_profile(&self, access_token: &str) -> Result<OAuthProfile, ServiceError> {
        let user: GoogleUser = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!("🔑 Google identity resolved: {}", user.id);
        Ok(OAuthProfile {
            provider: OAuthProvider::Google,
            provider_id: user.id,
            email: user.email.ok_or_else(missing_email)?,
            fname: user.given_name.unwrap_or_default(),
            lname: user.family_name.unwrap_or_default(),
            picture: user.picture,
        })
    }

    /// Exchanges a GitHub authorization code, then reads the user and, when the
    /// profile email is private, the primary address from the emails endpoint.
    pub async fn github_profile(&self, code: &str) -> Result<OAuthProfile, ServiceError> {
        let body: Value = self
            .http
            .post(GITHUB_TOKEN_URL)
            .header(ACCEPT, "application/json")
            .query(&[
                ("client_id", self.github_client_id.as_str()),
                ("client_secret", self.github_client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await?
            .json()
            .await?;
        let access_token = OAuthTokenResponse::parse(body)?.into_access_token()?;

        let user: GithubUser = self
            .http
            .get(GITHUB_USER_URL)
            .header(ACCEPT, "application/json")
            .header("Authorization", format!("token {}", access_token))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let email = match user.email {
            Some(email) => email,
            None => {
                let emails: Vec<GithubEmail> = self
                    .http
                    .get(GITHUB_EMAILS_URL)
                    .header(ACCEPT, "application/json")
                    .header("Authorization", format!("token {}", access_token))
                    .header("X-GitHub-Api-Version", "2022-11-28")
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                emails
                    .into_iter()
                    .find(|e| e.primary)
                    .map(|e| e.email)
                    .ok_or_else(missing_email)?
            }
        };

        let (fname, lname) = split_name(user.name.as_deref());
        info!("🔑 GitHub identity resolved: {}", user.id);
        Ok(OAuthProfile {
            provider: OAuthProvider::Github,
            provider_id: user.id.to_string(),
            email,
            fname,
            lname,
            picture: user.avatar_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_responses_decode_by_shape() {
        let ok = OAuthTokenResponse::parse(json!({"access_token": "gho_1", "token_type": "bearer"})).unwrap();
        assert_eq!(ok.into_access_token().unwrap(), "gho_1");

        let rejected = OAuthTokenResponse::parse(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }))
        .unwrap();
        assert!(matches!(rejected.into_access_token(), Err(ServiceError::BadRequest(_))));

        let unknown = OAuthTokenResponse::parse(json!({"unexpected": true}));
        assert!(matches!(unknown, Err(ServiceError::Upstream(_))));
    }

    #[test]
    fn names_split_on_first_space() {
        assert_eq!(split_name(Some("Ada Lovelace King")), ("Ada".to_string(), "Lovelace King".to_string()));
        assert_eq!(split_name(Some("Ada")), ("Ada".to_string(), String::new()));
        assert_eq!(split_name(None), (String::new(), String::new()));
    }

    #[test]
    fn only_known_providers_parse() {
        assert_eq!("github".parse::<OAuthProvider>().unwrap(), OAuthProvider::Github);
        assert!("facebook".parse::<OAuthProvider>().is_err());
    }
}
