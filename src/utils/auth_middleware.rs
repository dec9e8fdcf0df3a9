// src/utils/auth_middleware.rs
use crate::models::ServiceError;
use crate::services::token_blacklist;
use crate::state::AppState;
use crate::utils::cookies::ACCESS_COOKIE;
use crate::utils::SessionContext;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{web, Error, HttpMessage};
use futures::future::{ok, Ready};
use log::{debug, error};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use subtle::ConstantTimeEq;

pub const XSRF_HEADER: &str = "X-XSRF-Token";

/// Verifies the access token cookie against the `X-XSRF-Token` header and the
/// blacklist, then attaches a [`SessionContext`] to the request.
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthenticationMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct AuthenticationMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let session = authenticate(&req).await?;
            req.extensions_mut().insert(session);
            service.call(req).await
        })
    }
}

// Access token from the cookie, falling back to a bearer header for non-browser clients
fn access_token(req: &ServiceRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

async fn authenticate(req: &ServiceRequest) -> Result<SessionContext, ServiceError> {
    let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        error!("❌ AppState missing from application data");
        ServiceError::InternalServerError
    })?;

    let token = access_token(req).ok_or_else(|| {
        debug!("No access token on request to {}", req.path());
        ServiceError::InvalidToken
    })?;
    let xsrf = req
        .headers()
        .get(XSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            debug!("No xsrf token on request to {}", req.path());
            ServiceError::InvalidToken
        })?;

    if token_blacklist::is_blacklisted(state.db.pool(), &token).await? {
        error!("❌ Blacklisted token presented to {}", req.path());
        return Err(ServiceError::InvalidToken);
    }

    let xsrf_claims = state.tokens.decode_xsrf_token(xsrf)?;
    let claims = state.tokens.decode_access_token(&token)?;

    let nonce_matches: bool = claims
        .xsrf_token
        .as_bytes()
        .ct_eq(xsrf_claims.xsrf_token.as_bytes())
        .into();
    if !nonce_matches {
        error!("❌ Anti-forgery token does not match the session");
        return Err(ServiceError::InvalidToken);
    }

    let user = claims.user.ok_or(ServiceError::InvalidToken)?;
    Ok(SessionContext { user, token })
}
