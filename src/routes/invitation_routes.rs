use crate::models::{CreateInvitationRequest, InvitationDecision, InviteTokenQuery, ServiceError};
use crate::services::membership;
use crate::state::AppState;
use crate::utils::{get_session_from_request, Authentication};
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use log::info;
use serde_json::json;

// Invite someone to a team by email
#[post("/teams/{team_id}/invites", wrap = "Authentication")]
async fn create_invitation(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    data: web::Json<CreateInvitationRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let team_id = path.into_inner();

    info!("📧 Creating invitation to team: {} for email: {}", team_id, data.email);

    let invite = membership::invite_member(&state, &team_id, &session.user.email, &data.email).await?;

    info!("✅ Invitation created: {}", invite.id);
    Ok(HttpResponse::Ok().json(invite))
}

// Validates an invite link before the recipient decides
#[get("/teams/{team_id}/invites", wrap = "Authentication")]
async fn check_invitation(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<InviteTokenQuery>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let team_id = path.into_inner();

    let invite = membership::check_invite(&state, &team_id, &session.user.email, query.token.as_deref()).await?;
    let team = membership::get_team_public(&state, &team_id).await?;

    Ok(HttpResponse::Ok().json(json!({ "invite": invite, "team": team })))
}

#[post("/teams/{team_id}/invites/request-access", wrap = "Authentication")]
async fn request_access(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let team_id = path.into_inner();

    let notification = membership::request_team_access(&state, &team_id, &session.user.email).await?;

    Ok(HttpResponse::Ok().json(notification))
}

#[post("/teams/{team_id}/invites/{token}", wrap = "Authentication")]
async fn resolve_invitation(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
    data: web::Json<InvitationDecision>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let (team_id, token) = path.into_inner();

    info!("📝 {} resolving invite to team {}", session.user.email, team_id);

    let invite =
        membership::resolve_team_invitation(&state, &team_id, &token, &session.user.email, data.decision).await?;

    Ok(HttpResponse::Ok().json(invite))
}

// request-access is registered ahead of the {token} route it would otherwise match
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_invitation)
        .service(check_invitation)
        .service(request_access)
        .service(resolve_invitation);
}
