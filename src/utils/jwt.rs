// src/utils/jwt.rs
use crate::models::{ServiceError, TokenUser};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const ACCESS_TOKEN_TTL_DAYS: i64 = 1;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;
const XSRF_NONCE_LEN: usize = 16;

// Claims carried by access, refresh and xsrf tokens.
// xsrf tokens carry no user, only the nonce shared with the session tokens.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<TokenUser>,
    pub xsrf_token: String,
    pub exp: usize,
    pub iat: usize,
}

// Why a token was rejected; lets clients choose between refresh and re-login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Invalid,
    Expired,
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => ServiceError::InvalidToken,
            TokenError::Expired => ServiceError::TokenExpired,
        }
    }
}

// Everything handed to the client after a successful authentication
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub token: String,
    pub refresh_token: String,
    pub xsrf_token: String,
}

/// Signs and verifies the three token kinds used by the session flow.
///
/// Access and xsrf tokens share the access secret; refresh tokens use their own
/// secret so a leaked refresh token cannot be replayed as an access token.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        Self::with_ttls(
            access_secret,
            refresh_secret,
            Duration::days(ACCESS_TOKEN_TTL_DAYS),
            Duration::days(REFRESH_TOKEN_TTL_DAYS),
        )
    }

    pub fn with_ttls(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn new_nonce() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(XSRF_NONCE_LEN)
            .map(char::from)
            .collect()
    }

    pub fn issue_access_token(&self, user: &TokenUser, nonce: &str) -> Result<String, ServiceError> {
        sign(Some(user.clone()), nonce, self.access_ttl, &self.access_encoding)
    }

    pub fn issue_refresh_token(&self, user: &TokenUser, nonce: &str) -> Result<String, ServiceError> {
        sign(Some(user.clone()), nonce, self.refresh_ttl, &self.refresh_encoding)
    }

    pub fn issue_xsrf_token(&self, nonce: &str) -> Result<String, ServiceError> {
        sign(None, nonce, self.access_ttl, &self.access_encoding)
    }

    // Fresh nonce plus the access, refresh and xsrf tokens bound to it
    pub fn issue_session(&self, user: &TokenUser) -> Result<IssuedTokens, ServiceError> {
        let nonce = Self::new_nonce();
        Ok(IssuedTokens {
            token: self.issue_access_token(user, &nonce)?,
            refresh_token: self.issue_refresh_token(user, &nonce)?,
            xsrf_token: self.issue_xsrf_token(&nonce)?,
        })
    }

    pub fn decode_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.access_decoding)
    }

    pub fn decode_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.refresh_decoding)
    }

    pub fn decode_xsrf_token(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.access_decoding)
    }
}

fn sign(
    user: Option<TokenUser>,
    nonce: &str,
    ttl: Duration,
    key: &EncodingKey,
) -> Result<String, ServiceError> {
    let now = Utc::now();
    let claims = Claims {
        user,
        xsrf_token: nonce.to_string(),
        exp: (now + ttl).timestamp().max(0) as usize,
        iat: now.timestamp() as usize,
    };

    encode(&Header::default(), &claims, key).map_err(|e| {
        error!("❌ Failed to sign token: {:?}", e);
        ServiceError::InternalServerError
    })
}

fn verify(token: &str, key: &DecodingKey) -> Result<Claims, TokenError> {
    decode::<Claims>(token, key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            other => {
                debug!("Token rejected: {:?}", other);
                TokenError::Invalid
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationPref;

    fn alice() -> TokenUser {
        TokenUser {
            id: "3b8c7a52-5d0e-4a8f-9f0b-6f1f2c1d9e10".to_string(),
            fname: "Alice".to_string(),
            lname: "Smith".to_string(),
            email: "alice@x.com".to_string(),
            picture: None,
            two_factor_enabled: false,
            is_admin: false,
            notifications: NotificationPref::All,
        }
    }

    #[test]
    fn session_tokens_share_one_nonce() {
        let tokens = TokenService::new("access", "refresh");
        let issued = tokens.issue_session(&alice()).unwrap();

        let access = tokens.decode_access_token(&issued.token).unwrap();
        let refresh = tokens.decode_refresh_token(&issued.refresh_token).unwrap();
        let xsrf = tokens.decode_xsrf_token(&issued.xsrf_token).unwrap();

        assert_eq!(access.xsrf_token, refresh.xsrf_token);
        assert_eq!(access.xsrf_token, xsrf.xsrf_token);
        assert_eq!(access.user, Some(alice()));
        assert!(xsrf.user.is_none());
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn refresh_tokens_are_not_access_tokens() {
        let tokens = TokenService::new("access", "refresh");
        let issued = tokens.issue_session(&alice()).unwrap();
        assert_eq!(
            tokens.decode_access_token(&issued.refresh_token).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn expiry_is_distinguished_from_invalidity() {
        // Past the default 60s validation leeway
        let tokens = TokenService::with_ttls(
            "access",
            "refresh",
            Duration::seconds(-300),
            Duration::seconds(-300),
        );
        let issued = tokens.issue_session(&alice()).unwrap();
        assert_eq!(
            tokens.decode_access_token(&issued.token).unwrap_err(),
            TokenError::Expired
        );
        assert_eq!(
            tokens.decode_access_token("not.a.jwt").unwrap_err(),
            TokenError::Invalid
        );
    }
}
