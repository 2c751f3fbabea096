//! Actix-web middleware for rate limiting.
//!
//! Provides middleware for integrating rate limiting into Actix-web applications.
//!
//! # Example
//!
//! ```ignore
//! use actix_web::{web, App, HttpServer};
//! use skp_ratelimit::{
//!     middleware::actix::RateLimiter,
//!     TokenBucket, Quota, MemoryStorage,
//! };
//!
//! #[actix_web::main]
//! async fn main() {
//!     let storage = MemoryStorage::new();
//!
//!     HttpServer::new(move || {
//!         App::new()
//!             .wrap(RateLimiter::new(storage.clone(), TokenBucket::new(), Quota::per_second(10)))
//!             .route("/api/data", web::get().to(handler))
//!     })
//!     .bind("127.0.0.1:8080")?
//!     .run()
//!     .await
//! }
//! ```

use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_service::{Service, Transform};
use actix_web::{
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::StatusCode,
    Error, HttpResponse,
};

use crate::algorithm::Algorithm;
use crate::decision::Decision;
use crate::error::FailMode;
use crate::extensions::RateLimitErrorBody;
use crate::quota::Quota;
use crate::storage::Storage;

/// Rate limiter middleware for Actix-web.
pub struct RateLimiter<S, A> {
    storage: Arc<S>,
    algorithm: A,
    quota: Quota,
    fail_mode: FailMode,
}

impl<S, A> RateLimiter<S, A>
where
    S: Storage + Clone,
    A: Algorithm + Clone,
{
    /// Create a new rate limiter middleware. Defaults to [`FailMode::Open`]
    /// on storage errors; use [`Self::with_fail_mode`] to opt into
    /// fail-closed.
    pub fn new(storage: S, algorithm: A, quota: Quota) -> Self {
        Self {
            storage: Arc::new(storage),
            algorithm,
            quota,
            fail_mode: FailMode::Open,
        }
    }

    /// Set how this middleware responds to storage backend failures.
    pub fn with_fail_mode(mut self, fail_mode: FailMode) -> Self {
        self.fail_mode = fail_mode;
        self
    }
}

impl<S, A> Clone for RateLimiter<S, A>
where
    A: Clone,
{
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            algorithm: self.algorithm.clone(),
            quota: self.quota.clone(),
            fail_mode: self.fail_mode,
        }
    }
}

impl<S, A, Svc, B> Transform<Svc, ServiceRequest> for RateLimiter<S, A>
where
    S: Storage + Send + Sync + 'static,
    A: Algorithm + Clone + Send + Sync + 'static,
    Svc: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    Svc::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S, A, Svc>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: Svc) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            storage: self.storage.clone(),
            algorithm: self.algorithm.clone(),
            quota: self.quota.clone(),
            fail_mode: self.fail_mode,
        }))
    }
}

/// The actual middleware service.
pub struct RateLimiterMiddleware<S, A, Svc> {
    service: Svc,
    storage: Arc<S>,
    algorithm: A,
    quota: Quota,
    fail_mode: FailMode,
}

impl<S, A, Svc, B> Service<ServiceRequest> for RateLimiterMiddleware<S, A, Svc>
where
    S: Storage + Send + Sync + 'static,
    A: Algorithm + Clone + Send + Sync + 'static,
    Svc: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    Svc::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let storage = self.storage.clone();
        let algorithm = self.algorithm.clone();
        let quota = self.quota.clone();
        let fail_mode = self.fail_mode;

        // Extract key from request
        let key = extract_key(&req);

        // We need to capture the service call
        let fut = self.service.call(req);

        Box::pin(async move {
            // Check rate limit
            let decision = match algorithm.check_and_record(&*storage, &key, &quota).await {
                Ok(decision) => decision,
                Err(err) => storage_failure_decision(fail_mode, &quota, &key, &err),
            };

            if decision.is_denied() {
                let info = decision.info();
                let now = crate::storage::current_timestamp_ms();
                let retry_after = info.retry_after_seconds();
                let body = serde_json::to_string(&RateLimitErrorBody::from_decision(&decision, now))
                    .unwrap_or_default();

                let response = HttpResponse::build(StatusCode::TOO_MANY_REQUESTS)
                    .insert_header(("Content-Type", "application/json"))
                    .insert_header(("X-RateLimit-Limit", info.limit.to_string()))
                    .insert_header(("X-RateLimit-Remaining", info.remaining.to_string()))
                    .insert_header(("X-RateLimit-Reset", info.reset_epoch_s().to_string()))
                    .insert_header(("Retry-After", retry_after.to_string()))
                    .body(body);

                // Re-construct the request to get the ServiceResponse
                // This is a workaround since we've already consumed the request
                return Err(actix_web::error::InternalError::from_response(
                    "Rate limited",
                    response,
                )
                .into());
            }

            // Proceed with the request and add headers
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Decide how to respond to a storage backend failure, per the configured
/// [`FailMode`]: admit with the full quota reported (`Open`), or deny with a
/// one-second retry (`Closed`).
fn storage_failure_decision(
    fail_mode: FailMode,
    quota: &Quota,
    key: &str,
    err: &crate::error::RateLimitError,
) -> Decision {
    let now = crate::storage::current_timestamp_ms();
    let reset = now + quota.window().as_millis() as u64;

    match fail_mode {
        FailMode::Open => {
            tracing::warn!(error = %err, key = %key, "rate limit storage error, failing open");
            Decision::allowed(crate::decision::RateLimitInfo::new(
                quota.max_requests(),
                quota.max_requests(),
                reset,
                now,
            ))
        }
        FailMode::Closed => {
            tracing::warn!(error = %err, key = %key, "rate limit storage error, failing closed");
            Decision::denied(
                crate::decision::RateLimitInfo::new(quota.max_requests(), 0, now + 1000, now)
                    .with_retry_after_s(1),
            )
        }
    }
}

/// Extract a rate limiting key from the request.
fn extract_key(req: &ServiceRequest) -> String {
    // Try to get client IP from various headers
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(ip) = value.split(',').next() {
                return format!("ip:{}", ip.trim());
            }
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return format!("ip:{}", value);
        }
    }

    // Fall back to connection info
    if let Some(peer) = req.connection_info().peer_addr() {
        return format!("ip:{}", peer);
    }

    // Ultimate fallback
    format!("path:{}", req.path())
}
