// src/models/mod.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use derive_more::Display;
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub mod user;
pub use user::*;

pub mod team;
pub use team::*;

pub mod invitations;
pub use invitations::*;

pub mod notification;
pub use notification::*;

// Contact form submissions, readable by admins
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

// A single field-level validation failure
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

// Custom error types
#[derive(Debug, Display)]
pub enum ServiceError {
    #[display(fmt = "Internal Server Error")]
    InternalServerError,
    #[display(fmt = "Upstream failure: {}", _0)]
    Upstream(String),
    #[display(fmt = "BadRequest: {}", _0)]
    BadRequest(String),
    #[display(fmt = "Validation failed")]
    Validation(Vec<FieldError>),
    #[display(fmt = "Invalid credentials")]
    InvalidCredentials,
    #[display(fmt = "Unauthorized")]
    Unauthorized,
    #[display(fmt = "Invalid token")]
    InvalidToken,
    #[display(fmt = "Token expired")]
    TokenExpired,
    #[display(fmt = "Forbidden")]
    Forbidden,
    #[display(fmt = "Not Found: {}", _0)]
    NotFound(String),
    #[display(fmt = "Conflict: {}", _0)]
    Conflict(String),
    #[display(fmt = "Already resolved")]
    AlreadyResolved,
    #[display(fmt = "Expired: {}", _0)]
    Expired(String),
    #[display(fmt = "Too many requests")]
    TooManyRequests,
}

impl std::error::Error for ServiceError {}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::BadRequest(_)
            | ServiceError::Validation(_)
            | ServiceError::Expired(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidCredentials
            | ServiceError::Unauthorized
            | ServiceError::InvalidToken
            | ServiceError::TokenExpired => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) | ServiceError::AlreadyResolved => StatusCode::CONFLICT,
            ServiceError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ServiceError::InternalServerError => json!({ "error": "Internal server error" }),
            ServiceError::Upstream(_) => json!({ "error": "Upstream service unavailable" }),
            ServiceError::BadRequest(message) => json!({ "error": message }),
            ServiceError::Validation(fields) => json!({ "error": "Validation failed", "fields": fields }),
            ServiceError::InvalidCredentials => json!({ "error": "Invalid credentials" }),
            ServiceError::Unauthorized | ServiceError::InvalidToken => json!({ "error": "Invalid token" }),
            ServiceError::TokenExpired => json!({ "error": "Token expired" }),
            ServiceError::Forbidden => {
                json!({ "error": "Forbidden: You don't have permission to access this resource" })
            }
            ServiceError::NotFound(message) => json!({ "error": message }),
            ServiceError::Conflict(message) => json!({ "error": message }),
            ServiceError::AlreadyResolved => json!({ "error": "Already resolved" }),
            ServiceError::Expired(message) => json!({ "error": message }),
            ServiceError::TooManyRequests => json!({ "error": "Too many requests. Try again later." }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        error!("❌ Database error: {:?}", err);
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                ServiceError::Upstream("database".to_string())
            }
            _ => ServiceError::InternalServerError,
        }
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(err: redis::RedisError) -> Self {
        error!("❌ Key-value store error: {:?}", err);
        ServiceError::Upstream("key-value store".to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        error!("❌ OAuth provider request failed: {:?}", err);
        ServiceError::Upstream("oauth provider".to_string())
    }
}

impl From<bcrypt::BcryptError> for ServiceError {
    fn from(err: bcrypt::BcryptError) -> Self {
        error!("❌ Password hashing failed: {:?}", err);
        ServiceError::InternalServerError
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        error!("❌ JSON (de)serialization failed: {:?}", err);
        ServiceError::InternalServerError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_error_taxonomy() {
        assert_eq!(ServiceError::Validation(vec![]).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ServiceError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ServiceError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ServiceError::AlreadyResolved.status_code(), StatusCode::CONFLICT);
        assert_eq!(ServiceError::TooManyRequests.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ServiceError::Upstream("mail".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn pool_timeouts_surface_as_upstream() {
        let err: ServiceError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ServiceError::Upstream(_)));
    }
}
