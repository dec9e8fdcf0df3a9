// src/services/session.rs
use crate::models::{
    AuthType, NewUser, OAuthRequest, OtpPurpose, PendingRegistration, RegisterRequest, ResetPasswordAnonRequest,
    ResetPasswordRequest, ServiceError, TokenUser, User,
};
use crate::services::mailer::EmailMessage;
use crate::services::oauth::OAuthProvider;
use crate::services::{token_blacklist, user_directory};
use crate::state::AppState;
use crate::utils::jwt::IssuedTokens;
use crate::utils::otp::{generate_otp, verify_otp as otp_matches};
use crate::utils::password::{hash_password, verify_password};
use crate::utils::validation::Validator;
use log::{error, info, warn};
use std::time::Duration;

pub const OTP_TTL: Duration = Duration::from_secs(10 * 60);
pub const OTP_MAX_ATTEMPTS: u64 = 5;

fn otp_key(email: &str) -> String {
    format!("otp:{}", email)
}

fn pending_key(email: &str) -> String {
    format!("user-to-verify:{}", email)
}

fn attempts_key(email: &str) -> String {
    format!("otp-attempts:{}", email)
}

// An authenticated user with freshly issued tokens
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub tokens: IssuedTokens,
}

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(Session),
    TwoFactorRequired,
}

// Result of a refresh: a new access token bound to the existing anti-forgery nonce
#[derive(Debug)]
pub struct Refreshed {
    pub token: String,
    pub xsrf_token: String,
    pub user: TokenUser,
}

fn start_session(state: &AppState, user: User) -> Result<Session, ServiceError> {
    let tokens = state.tokens.issue_session(&TokenUser::from(&user))?;
    Ok(Session { user, tokens })
}

/// Counts a failed OTP attempt; after too many, the codes under `keys` are dropped.
async fn record_failed_attempt(state: &AppState, email: &str, keys: &[String]) -> Result<(), ServiceError> {
    let attempts = state.kv.incr_window(&attempts_key(email), OTP_TTL).await?;
    if attempts >= OTP_MAX_ATTEMPTS {
        warn!("⚠️ Too many OTP attempts for {}, discarding pending codes", email);
        for key in keys {
            state.kv.del(key).await?;
        }
        state.kv.del(&attempts_key(email)).await?;
    }
    Ok(())
}

async fn dispatch_otp(state: &AppState, email: &str, otp: &str) -> Result<(), ServiceError> {
    state.mailer.send(EmailMessage::otp(email, otp)).await
}

// Checks a supplied OTP against `otp:{email}` and consumes it on success
async fn consume_otp(state: &AppState, email: &str, supplied: &str) -> Result<(), ServiceError> {
    let key = otp_key(email);
    let expected = match state.kv.get(&key).await? {
        Some(expected) => expected,
        None => return Err(ServiceError::BadRequest("Invalid or expired OTP".to_string())),
    };

    if !otp_matches(&expected, supplied) {
        record_failed_attempt(state, email, &[key]).await?;
        return Err(ServiceError::BadRequest("Invalid OTP".to_string()));
    }

    // A concurrent request may have consumed it between the read and here
    if state.kv.take(&key).await?.is_none() {
        return Err(ServiceError::BadRequest("Invalid or expired OTP".to_string()));
    }
    state.kv.del(&attempts_key(email)).await?;
    Ok(())
}

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
    let mut v = Validator::new();
    let email = v.email("email", email);
    v.required("password", password, "Password is required");
    v.finish()?;

    let user = user_directory::get_by_email(state.db.pool(), &email).await?;

    let hash = match &user.password_hash {
        Some(hash) => hash,
        None => {
            error!("❌ Password login attempted on an OAuth-only account: {}", email);
            return Err(ServiceError::BadRequest("Invalid credentials".to_string()));
        }
    };

    if !verify_password(password, hash)? {
        error!("❌ Invalid password for user: {}", email);
        return Err(ServiceError::InvalidCredentials);
    }

    if user.two_factor_enabled {
        send_otp(state, &email, true).await?;
        info!("🔐 Second factor required for {}", email);
        return Ok(LoginOutcome::TwoFactorRequired);
    }

    info!("✅ Login successful for user: {}", email);
    Ok(LoginOutcome::Authenticated(start_session(state, user)?))
}

/// Validates a sign-up and parks it in the key-value store until the emailed OTP
/// is confirmed through [`verify_user`].
pub async fn register(state: &AppState, request: &RegisterRequest) -> Result<(), ServiceError> {
    let mut v = Validator::new();
    let fname = v.name("fname", &request.fname);
    let lname = v.name("lname", &request.lname);
    let email = v.email("email", &request.email);
    v.new_password(&request.password, &request.confirm_password);
    v.finish()?;

    if user_directory::find_by_email(state.db.pool(), &email).await?.is_some() {
        error!("❌ User already exists: {}", email);
        return Err(ServiceError::Conflict("User already exists".to_string()));
    }

    let otp = generate_otp();
    let pending = PendingRegistration {
        fname,
        lname,
        email: email.clone(),
        password_hash: hash_password(&request.password)?,
        otp: otp.clone(),
    };

    state
        .kv
        .set_ex(&pending_key(&email), &serde_json::to_string(&pending)?, OTP_TTL)
        .await?;
    state.kv.del(&attempts_key(&email)).await?;
    dispatch_otp(state, &email, &otp).await?;

    info!("📝 Registration pending verification: {}", email);
    Ok(())
}

/// Completes a pending registration. The user is created through the directory's
/// insert-or-fetch, so replays and concurrent verifications yield one account.
pub async fn verify_user(state: &AppState, email: &str, otp: &str) -> Result<Session, ServiceError> {
    let mut v = Validator::new();
    let email = v.email("email", email);
    v.otp("otp", otp);
    v.finish()?;

    let key = pending_key(&email);
    let pending: PendingRegistration = match state.kv.get(&key).await? {
        Some(raw) => serde_json::from_str(&raw)?,
        None => return Err(ServiceError::NotFound("No pending registration for this email".to_string())),
    };

    if !otp_matches(&pending.otp, otp) {
        record_failed_attempt(state, &email, &[key]).await?;
        return Err(ServiceError::BadRequest("Invalid OTP".to_string()));
    }

    state.kv.take(&key).await?;
    state.kv.del(&attempts_key(&email)).await?;

    let (user, created) = user_directory::create_or_fetch(
        state.db.pool(),
        NewUser {
            email: pending.email,
            fname: pending.fname,
            lname: pending.lname,
            password_hash: Some(pending.password_hash),
            two_factor_enabled: true,
            verified: true,
            ..Default::default()
        },
    )
    .await?;

    if created {
        info!("✅ User verified and created: {}", email);
    }
    start_session(state, user)
}

// `require_existing` is set on the 2FA path, where the code is useless without an account
pub async fn send_otp(state: &AppState, email: &str, require_existing: bool) -> Result<(), ServiceError> {
    let mut v = Validator::new();
    let email = v.email("email", email);
    v.finish()?;

    if require_existing {
        user_directory::get_by_email(state.db.pool(), &email).await?;
    }

    let otp = generate_otp();
    state.kv.set_ex(&otp_key(&email), &otp, OTP_TTL).await?;
    state.kv.del(&attempts_key(&email)).await?;
    dispatch_otp(state, &email, &otp).await?;

    info!("📨 OTP sent to {}", email);
    Ok(())
}

/// Checks an OTP for `email`. The `login` purpose completes a two-factor login and
/// returns a session; other purposes only confirm the code.
pub async fn verify_otp(
    state: &AppState,
    email: &str,
    otp: &str,
    purpose: Option<OtpPurpose>,
) -> Result<Option<Session>, ServiceError> {
    let mut v = Validator::new();
    let email = v.email("email", email);
    v.otp("otp", otp);
    v.finish()?;

    consume_otp(state, &email, otp).await?;

    match purpose {
        Some(OtpPurpose::Login) => {
            let user = user_directory::get_by_email(state.db.pool(), &email).await?;
            info!("✅ Two-factor login completed for {}", email);
            Ok(Some(start_session(state, user)?))
        }
        _ => Ok(None),
    }
}

pub async fn refresh(state: &AppState, refresh_token: Option<&str>) -> Result<Refreshed, ServiceError> {
    let refresh_token = refresh_token.ok_or(ServiceError::InvalidToken)?;

    if token_blacklist::is_blacklisted(state.db.pool(), refresh_token).await? {
        error!("❌ Blacklisted refresh token presented");
        return Err(ServiceError::InvalidToken);
    }

    let claims = state.tokens.decode_refresh_token(refresh_token)?;
    let claimed = claims.user.ok_or(ServiceError::InvalidToken)?;

    // The id is stable; an address the account has since left no longer matches
    let user = user_directory::find_by_id(state.db.pool(), &claimed.id)
        .await?
        .ok_or(ServiceError::InvalidToken)?;
    if user.email != claimed.email {
        error!("❌ Refresh token for {} outlived an email change", claimed.email);
        return Err(ServiceError::InvalidToken);
    }
    let token_user = TokenUser::from(&user);

    Ok(Refreshed {
        token: state.tokens.issue_access_token(&token_user, &claims.xsrf_token)?,
        xsrf_token: state.tokens.issue_xsrf_token(&claims.xsrf_token)?,
        user: token_user,
    })
}

pub async fn logout(state: &AppState, access_token: &str, refresh_token: Option<&str>) -> Result<(), ServiceError> {
    token_blacklist::blacklist_token(state.db.pool(), access_token).await?;
    if let Some(refresh_token) = refresh_token {
        token_blacklist::blacklist_token(state.db.pool(), refresh_token).await?;
    }
    info!("👋 Session revoked");
    Ok(())
}

pub async fn reset_password(state: &AppState, email: &str, request: &ResetPasswordRequest) -> Result<(), ServiceError> {
    let mut v = Validator::new();
    v.required("oldPassword", &request.old_password, "Old password is required");
    v.new_password(&request.password, &request.confirm_password);
    v.finish()?;

    let user = user_directory::get_by_email(state.db.pool(), email).await?;
    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| ServiceError::BadRequest("Account has no password".to_string()))?;

    if !verify_password(&request.old_password, hash)? {
        return Err(ServiceError::InvalidCredentials);
    }
    if verify_password(&request.password, hash)? {
        return Err(ServiceError::BadRequest(
            "New password cannot be the same as old password".to_string(),
        ));
    }

    user_directory::set_password(state.db.pool(), email, &hash_password(&request.password)?).await?;
    info!("🔑 Password changed for {}", email);
    Ok(())
}

// Forgotten-password reset, gated by an OTP sent through /auth/send-otp-2fa
pub async fn reset_password_anonymous(state: &AppState, request: &ResetPasswordAnonRequest) -> Result<(), ServiceError> {
    let mut v = Validator::new();
    let email = v.email("email", &request.email);
    v.otp("otp", &request.otp);
    v.new_password(&request.password, &request.confirm_password);
    v.finish()?;

    user_directory::get_by_email(state.db.pool(), &email).await?;
    consume_otp(state, &email, &request.otp).await?;

    user_directory::set_password(state.db.pool(), &email, &hash_password(&request.password)?).await?;
    info!("🔑 Password reset for {}", email);
    Ok(())
}

/// Signs a user in (or up) with a third-party identity.
///
/// Returns the session and whether a new account was created. An existing
/// account with the same email is linked, never duplicated.
pub async fn handle_oauth(
    state: &AppState,
    provider: &str,
    request: &OAuthRequest,
) -> Result<(Session, bool), ServiceError> {
    let auth_type = request
        .auth_type
        .ok_or_else(|| ServiceError::BadRequest("Auth type is required".to_string()))?;
    let provider: OAuthProvider = provider.parse()?;

    let profile = match provider {
        OAuthProvider::Google => {
            let access_token = request
                .access_token
                .as_deref()
                .ok_or_else(|| ServiceError::BadRequest("Access token is required".to_string()))?;
            state.oauth.google_profile(access_token).await?
        }
        OAuthProvider::Github => {
            let code = request
                .code
                .as_deref()
                .ok_or_else(|| ServiceError::BadRequest("Code is required".to_string()))?;
            state.oauth.github_profile(code).await?
        }
    };

    let email = profile.email.trim().to_lowercase();
    let pool = state.db.pool();

    let (user, created) = match auth_type {
        AuthType::Login => {
            let user = user_directory::get_by_email(pool, &email).await?;
            (user, false)
        }
        AuthType::Signup => {
            user_directory::create_or_fetch(
                pool,
                NewUser {
                    email: email.clone(),
                    fname: profile.fname.clone(),
                    lname: profile.lname.clone(),
                    picture: profile.picture.clone(),
                    verified: true,
                    oauth_provider: Some(provider.as_str().to_string()),
                    oauth_id: Some(profile.provider_id.clone()),
                    ..Default::default()
                },
            )
            .await?
        }
    };

    let user = if created {
        user
    } else {
        user_directory::link_oauth(pool, &email, provider.as_str(), &profile.provider_id).await?;
        user_directory::get_by_email(pool, &email).await?
    };

    info!("🔑 OAuth {} via {} for {}", if created { "sign-up" } else { "login" }, provider.as_str(), email);
    Ok((start_session(state, user)?, created))
}

/// Moves the signed-in account to a new, OTP-verified address and re-issues the
/// session. The access and refresh tokens bound to the old address are revoked.
pub async fn update_email(
    state: &AppState,
    current_email: &str,
    current_token: &str,
    current_refresh_token: Option<&str>,
    new_email: &str,
    otp: &str,
) -> Result<Session, ServiceError> {
    let mut v = Validator::new();
    let new_email = v.email("email", new_email);
    v.otp("otp", otp);
    v.finish()?;

    if user_directory::find_by_email(state.db.pool(), &new_email).await?.is_some() {
        return Err(ServiceError::Conflict("Email already taken".to_string()));
    }

    consume_otp(state, &new_email, otp).await?;

    let user = user_directory::set_email(state.db.pool(), current_email, &new_email).await?;
    logout(state, current_token, current_refresh_token).await?;

    start_session(state, user)
}
