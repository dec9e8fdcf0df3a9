// src/routes/mod.rs
use crate::models::{FieldError, ServiceError};
use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{web, HttpRequest};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

pub mod account_routes;
pub mod activity_routes;
pub mod auth_routes;
pub mod base_routes;
pub mod invitation_routes;
pub mod team_routes;

lazy_static! {
    // serde names the offending field as "missing field `x`" or "unknown field `x`"
    static ref SERDE_FIELD: Regex = Regex::new(r"field `(\w+)`").expect("field regex compiles");
}

// Undecodable bodies and query strings answer with the same JSON shape as validation failures
fn payload_error(detail: String) -> ServiceError {
    warn!("⚠️ Rejected request payload: {}", detail);
    let field = SERDE_FIELD
        .captures(&detail)
        .and_then(|c| c.get(1))
        .map_or("body", |m| m.as_str());
    ServiceError::Validation(vec![FieldError::new(field, &detail)])
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        JsonPayloadError::Deserialize(e) => payload_error(e.to_string()).into(),
        other => ServiceError::BadRequest(other.to_string()).into(),
    }
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        QueryPayloadError::Deserialize(e) => payload_error(e.to_string()).into(),
        other => ServiceError::BadRequest(other.to_string()).into(),
    }
}

// Every route of the service, as mounted by main and the test apps
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error));

    base_routes::init_routes(cfg);
    auth_routes::init_routes(cfg);
    account_routes::init_routes(cfg);
    activity_routes::init_routes(cfg);
    invitation_routes::init_routes(cfg);
    team_routes::init_routes(cfg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_messages_name_the_field() {
        match payload_error("missing field `confirmPassword` at line 1 column 66".to_string()) {
            ServiceError::Validation(fields) => assert_eq!(fields[0].field, "confirmPassword"),
            other => panic!("unexpected: {:?}", other),
        }
        match payload_error("invalid type: integer `3`, expected a string".to_string()) {
            ServiceError::Validation(fields) => assert_eq!(fields[0].field, "body"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
