// Shared fixtures for the HTTP-level tests
use crate::config::Config;
use crate::models::RegisterRequest;
use crate::services::mailer::OutboxMailClient;
use crate::services::session::{self, Session};
use crate::state::AppState;
use crate::utils::auth_middleware::XSRF_HEADER;
use crate::utils::cookies::ACCESS_COOKIE;
use crate::utils::jwt::IssuedTokens;
use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{test, web};
use regex::Regex;
use std::sync::Arc;

pub const PASSWORD: &str = "P@ssw0rd!";

// Every route mounted over the context's in-memory state
macro_rules! test_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.state.clone())
                .configure(crate::routes::init_routes),
        )
        .await
    };
}

mod base_tests;
mod team_tests;

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub outbox: Arc<OutboxMailClient>,
}

pub async fn test_context() -> TestContext {
    let outbox = Arc::new(OutboxMailClient::default());
    let state = AppState::in_memory(Config::for_tests(), outbox.clone())
        .await
        .expect("in-memory state");
    TestContext {
        state: web::Data::new(state),
        outbox,
    }
}

pub fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        fname: "Test".to_string(),
        lname: "User".to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        confirm_password: PASSWORD.to_string(),
    }
}

// Most recent verification code mailed to `email`
pub fn latest_otp(ctx: &TestContext, email: &str) -> String {
    let message = ctx
        .outbox
        .messages()
        .into_iter()
        .rev()
        .find(|m| m.to == email && m.subject.contains("verification code"))
        .expect("an OTP mail");
    let otp = Regex::new(r"\d{6}").unwrap();
    otp.find(&message.body).expect("six digits").as_str().to_string()
}

// Registers and verifies a user without going through HTTP
pub async fn signed_up(ctx: &TestContext, email: &str) -> Session {
    session::register(&ctx.state, &register_request(email)).await.unwrap();
    let otp = latest_otp(ctx, email);
    session::verify_user(&ctx.state, email, &otp).await.unwrap()
}

pub fn authed(req: test::TestRequest, tokens: &IssuedTokens) -> test::TestRequest {
    req.cookie(Cookie::new(ACCESS_COOKIE, tokens.token.clone()))
        .insert_header((XSRF_HEADER, tokens.xsrf_token.clone()))
}

// Middleware rejections surface as errors rather than responses
pub fn status_of<B>(result: Result<ServiceResponse<B>, actix_web::Error>) -> StatusCode {
    match result {
        Ok(res) => res.status(),
        Err(e) => e.as_response_error().status_code(),
    }
}
