use crate::models::{ContactRequest, ServiceError};
use crate::services::{contact_store, user_directory};
use crate::state::AppState;
use crate::utils::validation::{Validator, MAX_CONTACT_MESSAGE_LENGTH};
use crate::utils::{get_session_from_request, require_admin, require_local_service, Authentication, RateLimit};
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use log::{error, info};
use serde_json::json;

// Liveness; reports the database without failing the check
#[get("/api/health")]
async fn health(state: web::Data<AppState>) -> HttpResponse {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    HttpResponse::Ok().json(json!({ "status": "ok", "database": database }))
}

#[post("/api/contact", wrap = "RateLimit")]
async fn contact(state: web::Data<AppState>, request: web::Json<ContactRequest>) -> Result<HttpResponse, ServiceError> {
    let mut v = Validator::new();
    let email = v.email("email", &request.email);
    v.required("name", request.name.trim(), "Name is required");
    v.required("message", request.message.trim(), "Message is required");
    v.max_len(
        "message",
        &request.message,
        MAX_CONTACT_MESSAGE_LENGTH,
        "Message must be at most 500 characters long",
    );
    v.finish()?;

    let message = contact_store::save(state.db.pool(), request.name.trim(), &email, request.message.trim()).await?;

    info!("📨 Contact message received from {}", message.email);
    Ok(HttpResponse::Ok().json(json!({ "message": "Message received" })))
}

#[get("/admin/contact-messages", wrap = "Authentication")]
async fn contact_messages(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    if let Err(e) = require_admin(&session) {
        error!("❌ Non-admin {} asked for contact messages", session.user.email);
        return Err(e);
    }

    let messages = contact_store::list(state.db.pool()).await?;
    Ok(HttpResponse::Ok().json(messages))
}

// User lookup for sibling services holding LOCAL_SERVICE_KEY
#[get("/internal/users/{email}")]
async fn internal_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    require_local_service(&req, &state.config)?;

    let email = path.into_inner().trim().to_lowercase();
    let user = user_directory::get_by_email(state.db.pool(), &email).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(contact)
        .service(contact_messages)
        .service(internal_user);
}
