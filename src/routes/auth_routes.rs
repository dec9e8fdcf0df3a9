use crate::config::Config;
use crate::models::{
    EmailRequest, OAuthRequest, OtpRequest, RegisterRequest, ResetPasswordAnonRequest, ResetPasswordRequest,
    ServiceError, UserCredentials,
};
use crate::services::session::{self, LoginOutcome, Session};
use crate::services::user_directory;
use crate::state::AppState;
use crate::utils::cookies::{removal_cookie, session_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::utils::{get_session_from_request, Authentication, RateLimit};
use actix_web::{get, patch, post, web, HttpRequest, HttpResponse};
use log::{error, info};
use serde_json::json;

// Sets both session cookies and hands the anti-forgery token to the client
pub(crate) fn signed_in(config: &Config, session: &Session) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(session_cookie(ACCESS_COOKIE, session.tokens.token.clone(), config.cookie_secure))
        .cookie(session_cookie(REFRESH_COOKIE, session.tokens.refresh_token.clone(), config.cookie_secure))
        .json(json!({
            "xsrfToken": session.tokens.xsrf_token,
            "user": session.user
        }))
}

#[post("/auth/login", wrap = "RateLimit")]
async fn login(state: web::Data<AppState>, credentials: web::Json<UserCredentials>) -> Result<HttpResponse, ServiceError> {
    info!("🔑 Login request for email: {}", credentials.email);

    match session::login(&state, &credentials.email, &credentials.password).await? {
        LoginOutcome::Authenticated(session) => Ok(signed_in(&state.config, &session)),
        LoginOutcome::TwoFactorRequired => Ok(HttpResponse::Ok().json(json!({ "twofa": true }))),
    }
}

#[post("/auth/register", wrap = "RateLimit")]
async fn register(state: web::Data<AppState>, request: web::Json<RegisterRequest>) -> Result<HttpResponse, ServiceError> {
    info!("📝 Register request for email: {}", request.email);

    session::register(&state, &request).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Verification email sent" })))
}

#[post("/auth/verify-user", wrap = "RateLimit")]
async fn verify_user(state: web::Data<AppState>, request: web::Json<OtpRequest>) -> Result<HttpResponse, ServiceError> {
    info!("📬 Verifying registration for: {}", request.email);

    let session = session::verify_user(&state, &request.email, &request.otp).await?;

    info!("✅ User registered successfully: {}", session.user.id);
    Ok(signed_in(&state.config, &session))
}

#[post("/auth/verify-otp", wrap = "RateLimit")]
async fn verify_otp(state: web::Data<AppState>, request: web::Json<OtpRequest>) -> Result<HttpResponse, ServiceError> {
    info!("🔢 OTP check for: {}", request.email);

    match session::verify_otp(&state, &request.email, &request.otp, request.purpose).await? {
        Some(session) => Ok(signed_in(&state.config, &session)),
        None => Ok(HttpResponse::Ok().json(json!({ "message": "OTP verified" }))),
    }
}

#[post("/auth/send-otp-2fa", wrap = "RateLimit")]
async fn send_otp_2fa(state: web::Data<AppState>, request: web::Json<EmailRequest>) -> Result<HttpResponse, ServiceError> {
    session::send_otp(&state, &request.email, true).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "OTP sent" })))
}

#[get("/auth/refresh-token", wrap = "RateLimit")]
async fn refresh_token(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    let cookie = req.cookie(REFRESH_COOKIE);
    let refreshed = session::refresh(&state, cookie.as_ref().map(|c| c.value())).await?;

    info!("🔄 Access token refreshed for: {}", refreshed.user.email);

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(ACCESS_COOKIE, refreshed.token.clone(), state.config.cookie_secure))
        .json(json!({
            "token": refreshed.token,
            "xsrfToken": refreshed.xsrf_token
        })))
}

#[patch("/auth/reset-password-anon", wrap = "RateLimit")]
async fn reset_password_anon(
    state: web::Data<AppState>,
    request: web::Json<ResetPasswordAnonRequest>,
) -> Result<HttpResponse, ServiceError> {
    info!("🔑 Anonymous password reset for: {}", request.email);

    session::reset_password_anonymous(&state, &request).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated" })))
}

#[post("/auth/oauth/{provider}", wrap = "RateLimit")]
async fn oauth(
    state: web::Data<AppState>,
    path: web::Path<String>,
    request: web::Json<OAuthRequest>,
) -> Result<HttpResponse, ServiceError> {
    let provider = path.into_inner();
    info!("🌐 OAuth request via {}", provider);

    let (session, _created) = session::handle_oauth(&state, &provider, &request).await?;
    Ok(signed_in(&state.config, &session))
}

// Get current user info (requires authentication)
#[get("/auth/me", wrap = "Authentication")]
async fn me(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;

    match user_directory::find_by_email(state.db.pool(), &session.user.email).await? {
        Some(user) => Ok(HttpResponse::Ok().json(json!({ "user": user }))),
        None => {
            error!("❌ Token for a missing user: {}", session.user.email);
            Err(ServiceError::Unauthorized)
        }
    }
}

// OTP for an address the signed-in user wants to move to
#[post("/auth/send-otp", wrap = "Authentication")]
async fn send_otp(state: web::Data<AppState>, request: web::Json<EmailRequest>) -> Result<HttpResponse, ServiceError> {
    session::send_otp(&state, &request.email, false).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "OTP sent" })))
}

#[patch("/auth/reset-password", wrap = "Authentication")]
async fn reset_password(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    session::reset_password(&state, &session.user.email, &request).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated" })))
}

#[post("/auth/logout", wrap = "Authentication")]
async fn logout(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    let session = get_session_from_request(&req)?;
    let refresh = req.cookie(REFRESH_COOKIE);

    session::logout(&state, &session.token, refresh.as_ref().map(|c| c.value())).await?;

    info!("👋 Logged out: {}", session.user.email);
    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_COOKIE))
        .cookie(removal_cookie(REFRESH_COOKIE))
        .json(json!({ "message": "Logged out" })))
}

// Register all auth routes
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(login)
        .service(register)
        .service(verify_user)
        .service(verify_otp)
        .service(send_otp_2fa)
        .service(refresh_token)
        .service(reset_password_anon)
        .service(oauth)
        .service(me)
        .service(send_otp)
        .service(reset_password)
        .service(logout);
}
