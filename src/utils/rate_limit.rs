// src/utils/rate_limit.rs
use crate::models::ServiceError;
use crate::state::AppState;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error};
use futures::future::{ok, Ready};
use log::{error, warn};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Duration;

/// Fixed-window, per-path and per-client-IP request limit backed by the key-value store.
///
/// Window length and budget come from `AppState::config`.
pub struct RateLimit;

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
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
            check(&req).await?;
            service.call(req).await
        })
    }
}

pub fn rate_limit_key(path: &str, ip: Option<&str>) -> String {
    format!("rate-limit:{}:{}", path, ip.unwrap_or("unknown"))
}

async fn check(req: &ServiceRequest) -> Result<(), ServiceError> {
    let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        error!("❌ AppState missing from application data");
        ServiceError::InternalServerError
    })?;

    let ip = req.connection_info().realip_remote_addr().map(str::to_string);
    let key = rate_limit_key(req.path(), ip.as_deref());
    let window = Duration::from_secs(state.config.rate_limit_window_secs);

    let count = state.kv.incr_window(&key, window).await?;
    if count > state.config.rate_limit_max_requests {
        warn!("⚠️ Rate limit exceeded for {}", key);
        return Err(ServiceError::TooManyRequests);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ip_gets_its_own_bucket() {
        assert_eq!(rate_limit_key("/auth/login", Some("10.0.0.1")), "rate-limit:/auth/login:10.0.0.1");
        assert_eq!(rate_limit_key("/auth/login", None), "rate-limit:/auth/login:unknown");
    }
}
