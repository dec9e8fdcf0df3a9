use crate::models::{AccountUpdate, NotificationSettingsRequest, OtpRequest, ServiceError, TwoFactorRequest};
use crate::routes::auth_routes::signed_in;
use crate::services::{session, user_directory};
use crate::state::AppState;
use crate::utils::cookies::REFRESH_COOKIE;
use crate::utils::validation::Validator;
use crate::utils::{get_session_from_request, Authentication};
use actix_web::{patch, web, HttpRequest, HttpResponse};
use log::info;
use serde_json::json;

// Profile fields only; the email always comes from the verified token
#[patch("/account", wrap = "Authentication")]
async fn update_account(
    state: web::Data<AppState>,
    req: HttpRequest,
    update: web::Json<AccountUpdate>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;

    let mut v = Validator::new();
    let update = AccountUpdate {
        fname: v.name("fname", &update.fname),
        lname: v.name("lname", &update.lname),
        picture: update.picture.clone(),
    };
    v.finish()?;

    let user = user_directory::update_profile(state.db.pool(), &session.user.email, &update).await?;

    info!("✅ Account updated: {}", user.email);
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

#[patch("/account/update-email", wrap = "Authentication")]
async fn update_email(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<OtpRequest>,
) -> Result<HttpResponse, ServiceError> {
    let current = get_session_from_request(&req)?;
    info!("📧 Email change requested by {} to {}", current.user.email, request.email);

    let refresh_token = req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string());
    let session = session::update_email(
        &state,
        &current.user.email,
        &current.token,
        refresh_token.as_deref(),
        &request.email,
        &request.otp,
    )
    .await?;

    info!("✅ Email changed to {}", session.user.email);
    Ok(signed_in(&state.config, &session))
}

#[patch("/account/manage-2fa", wrap = "Authentication")]
async fn manage_two_factor(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<TwoFactorRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let user =
        user_directory::set_two_factor(state.db.pool(), &session.user.email, request.two_factor_enabled).await?;

    info!("🔐 Two-factor {} for {}", if user.two_factor_enabled { "enabled" } else { "disabled" }, user.email);
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

#[patch("/account/notification-settings", wrap = "Authentication")]
async fn notification_settings(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<NotificationSettingsRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let user =
        user_directory::set_notification_pref(state.db.pool(), &session.user.email, request.notifications).await?;

    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(update_account)
        .service(update_email)
        .service(manage_two_factor)
        .service(notification_settings);
}
