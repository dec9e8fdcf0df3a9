use crate::models::{EmailRequest, MemberQuery, MemberRoleRequest, ServiceError, TeamData, TeamListQuery};
use crate::services::membership;
use crate::state::AppState;
use crate::utils::{get_session_from_request, Authentication};
use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse};
use log::info;
use serde_json::json;

// Create a new team
#[post("/teams", wrap = "Authentication")]
async fn create_team(
    state: web::Data<AppState>,
    req: HttpRequest,
    team_data: web::Json<TeamData>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;

    info!("📝 Creating new team: {} for user: {}", team_data.name, session.user.email);

    let team = membership::create_team(&state, &session.user.email, &team_data).await?;

    info!("✅ Team created successfully: {}", team.id);
    Ok(HttpResponse::Ok().json(team))
}

// Teams the user belongs to, split by ownership
#[get("/teams", wrap = "Authentication")]
async fn list_teams(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<TeamListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;

    info!("📋 Fetching teams for user: {}", session.user.email);

    let listing = membership::list_teams(&state, &session.user.email, query.name.as_deref(), query.limit).await?;

    info!(
        "✅ Found {} owned and {} joined teams for user: {}",
        listing.my_teams.len(),
        listing.other_teams.len(),
        session.user.email
    );
    Ok(HttpResponse::Ok().json(listing))
}

#[get("/teams/{team_id}", wrap = "Authentication")]
async fn get_team(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let team_id = path.into_inner();

    info!("🔍 Fetching team: {} for user: {}", team_id, session.user.email);

    let team = membership::get_team(&state, &team_id, &session.user.email).await?;
    Ok(HttpResponse::Ok().json(team))
}

// Enough for an outsider to decide whether to request access
#[get("/teams/{team_id}/public", wrap = "Authentication")]
async fn get_team_public(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ServiceError> {
    let team = membership::get_team_public(&state, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(team))
}

#[patch("/teams/{team_id}", wrap = "Authentication")]
async fn update_team(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    team_data: web::Json<TeamData>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let team_id = path.into_inner();

    let team = membership::update_team(&state, &team_id, &session.user.email, &team_data).await?;

    info!("✅ Team updated: {}", team.id);
    Ok(HttpResponse::Ok().json(team))
}

#[delete("/teams/{team_id}", wrap = "Authentication")]
async fn delete_team(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let team_id = path.into_inner();

    info!("🗑️ Deleting team: {} by user: {}", team_id, session.user.email);

    membership::delete_team(&state, &team_id, &session.user.email).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Team deleted" })))
}

// Add an existing user to a team as a viewer
#[post("/teams/{team_id}/members", wrap = "Authentication")]
async fn add_member(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<EmailRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let team_id = path.into_inner();

    let added = membership::add_member(&state, &team_id, &session.user.email, &request.email).await?;

    info!("✅ Member {} added to team {}: {}", request.email, team_id, added);
    Ok(HttpResponse::Ok().json(json!({ "added": added })))
}

#[get("/teams/{team_id}/members", wrap = "Authentication")]
async fn list_members(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let members = membership::list_members(&state, &path.into_inner(), &session.user.email).await?;
    Ok(HttpResponse::Ok().json(members))
}

#[patch("/teams/{team_id}/members", wrap = "Authentication")]
async fn update_member_role(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<MemberRoleRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let team_id = path.into_inner();

    membership::update_member_role(&state, &team_id, &session.user.email, &request.email, request.role).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Member role updated" })))
}

#[delete("/teams/{team_id}/members", wrap = "Authentication")]
async fn remove_member(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<MemberQuery>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let team_id = path.into_inner();

    membership::remove_member(&state, &team_id, &session.user.email, &query.email).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Member removed" })))
}

#[get("/teams/{team_id}/members/{email}", wrap = "Authentication")]
async fn get_member(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let (team_id, email) = path.into_inner();
    let is_member = membership::is_member(&state, &team_id, &session.user.email, &email).await?;
    Ok(HttpResponse::Ok().json(json!({ "isMember": is_member })))
}

// Register all team routes
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_team)
        .service(list_teams)
        .service(get_team_public)
        .service(get_team)
        .service(update_team)
        .service(delete_team)
        .service(add_member)
        .service(list_members)
        .service(update_member_role)
        .service(remove_member)
        .service(get_member);
}
