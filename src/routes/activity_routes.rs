use crate::models::{ResolveActionRequest, SeenRequest, ServiceError};
use crate::services::membership;
use crate::state::AppState;
use crate::utils::{get_session_from_request, Authentication};
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use log::info;
use serde_json::json;

#[get("/activity", wrap = "Authentication")]
async fn list_activity(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;

    let notifications = membership::list_activity(&state, &session.user.email).await?;

    info!("📋 {} notifications for {}", notifications.len(), session.user.email);
    Ok(HttpResponse::Ok().json(notifications))
}

#[post("/activity/{notification_id}/resolve", wrap = "Authentication")]
async fn resolve_action(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<ResolveActionRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let notification_id = path.into_inner();

    info!("📝 {} resolving notification {} as {:?}", session.user.email, notification_id, request.resolution);

    let notification =
        membership::resolve_action(&state, &notification_id, &session.user.email, request.resolution).await?;

    Ok(HttpResponse::Ok().json(notification))
}

#[post("/activity/{notification_id}/read", wrap = "Authentication")]
async fn mark_read(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<SeenRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let notification_id = path.into_inner();

    membership::mark_seen(&state, &notification_id, &session.user.email, request.read).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Notification updated" })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_activity).service(resolve_action).service(mark_read);
}
