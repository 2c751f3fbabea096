//! Tower layer for rate limiting in Axum.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
};
use tower::{Layer, Service};

use crate::algorithm::Algorithm;
use crate::decision::Decision;
use crate::error::FailMode;
use crate::extensions::RateLimitErrorBody;
use crate::key::{HasHeaders, HasIpAddr, HasMethod, HasPath, Key};
use crate::quota::Quota;
use crate::storage::Storage;

/// Tower layer for rate limiting.
// derive(Clone) removed to allow S to be ?Clone

pub struct RateLimitLayer<S, A, K> {
    storage: Arc<S>,
    algorithm: A,
    quota: Quota,
    key_extractor: K,
    fail_mode: FailMode,
}

impl<S, A, K> RateLimitLayer<S, A, K> {
    /// Create a new rate limit layer. Defaults to [`FailMode::Open`] on
    /// storage errors; use [`Self::with_fail_mode`] to opt into fail-closed.
    pub fn new(storage: S, algorithm: A, quota: Quota, key_extractor: K) -> Self {
        Self {
            storage: Arc::new(storage),
            algorithm,
            quota,
            key_extractor,
            fail_mode: FailMode::Open,
        }
    }

    /// Set how this layer responds to storage backend failures.
    pub fn with_fail_mode(mut self, fail_mode: FailMode) -> Self {
        self.fail_mode = fail_mode;
        self
    }
}

impl<S, A, K> Clone for RateLimitLayer<S, A, K>
where
    A: Clone,
    K: Clone,
{
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            algorithm: self.algorithm.clone(),
            quota: self.quota.clone(),
            key_extractor: self.key_extractor.clone(),
            fail_mode: self.fail_mode,
        }
    }
}

impl<S, A, K, Inner> Layer<Inner> for RateLimitLayer<S, A, K>
where
    A: Clone,
    K: Clone,
{
    type Service = RateLimitService<S, A, K, Inner>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RateLimitService {
            inner,
            storage: self.storage.clone(),
            algorithm: self.algorithm.clone(),
            quota: self.quota.clone(),
            key_extractor: self.key_extractor.clone(),
            fail_mode: self.fail_mode,
        }
    }
}

/// The rate limiting service.
// derive(Clone) removed to allow S to be ?Clone

pub struct RateLimitService<S, A, K, Inner> {
    inner: Inner,
    storage: Arc<S>,
    algorithm: A,
    quota: Quota,
    key_extractor: K,
    fail_mode: FailMode,
}

impl<S, A, K, Inner> Clone for RateLimitService<S, A, K, Inner>
where
    A: Clone,
    K: Clone,
    Inner: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            storage: self.storage.clone(),
            algorithm: self.algorithm.clone(),
            quota: self.quota.clone(),
            key_extractor: self.key_extractor.clone(),
            fail_mode: self.fail_mode,
        }
    }
}

/// Wrapper around Axum request for key extraction.
pub struct AxumRequest<'a> {
    request: &'a Request<Body>,
}

impl<'a> AxumRequest<'a> {
    #[allow(dead_code)]
    fn new(request: &'a Request<Body>) -> Self {
        Self { request }
    }
}

impl HasPath for AxumRequest<'_> {
    fn path(&self) -> &str {
        self.request.uri().path()
    }
}

impl HasMethod for AxumRequest<'_> {
    fn method(&self) -> &str {
        self.request.method().as_str()
    }
}

impl HasHeaders for AxumRequest<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }
}

impl HasIpAddr for AxumRequest<'_> {
    #[allow(clippy::collapsible_if)]
    fn client_ip(&self) -> Option<std::net::IpAddr> {
        // Try to get from extensions (set by outer middleware)
        // For now, try parsing from X-Forwarded-For or X-Real-IP
        if let Some(forwarded) = self.header("x-forwarded-for") {
            if let Ok(ip) = forwarded.split(',').next()?.trim().parse() {
                return Some(ip);
            }
        }
        if let Some(real_ip) = self.header("x-real-ip") {
            if let Ok(ip) = real_ip.parse() {
                return Some(ip);
            }
        }
        None
    }
}

impl<S, A, K, Inner> Service<Request<Body>> for RateLimitService<S, A, K, Inner>
where
    S: Storage + Send + Sync + 'static,
    A: Algorithm + Clone + Send + Sync + 'static,
    K: Key<AxumRequest<'static>> + Clone + Send + Sync + 'static,
    Inner: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    Inner::Future: Send,
{
    type Response = Response<Body>;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let storage = self.storage.clone();
        let algorithm = self.algorithm.clone();
        let quota = self.quota.clone();
        let _key_extractor = self.key_extractor.clone();
        let fail_mode = self.fail_mode;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // Extract key - we need to be careful with lifetimes here
            // For safety, we use a static key extraction approach
            let key = {
                // This is a workaround for lifetime issues
                // In production, you'd want a better approach
                let path = request.uri().path().to_string();
                format!("axum:{}", path)
            };

            // Check rate limit
            let decision = match algorithm.check_and_record(&*storage, &key, &quota).await {
                Ok(decision) => decision,
                Err(err) => storage_failure_decision(fail_mode, &quota, &key, &err),
            };

            if decision.is_allowed() {
                // Add rate limit headers and proceed
                let response = inner.call(request).await?;
                Ok(add_rate_limit_headers(response, &decision))
            } else {
                // Return 429 Too Many Requests
                Ok(rate_limited_response(&decision))
            }
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

/// Add rate limit headers to a response.
fn add_rate_limit_headers(mut response: Response<Body>, decision: &Decision) -> Response<Body> {
    let headers = response.headers_mut();
    for (name, value) in decision.info().to_headers() {
        if let Ok(header_value) = value.parse() {
            headers.insert(name, header_value);
        }
    }
    response
}

/// Create a 429 Too Many Requests response.
fn rate_limited_response(decision: &Decision) -> Response<Body> {
    let info = decision.info();
    let now = crate::storage::current_timestamp_ms();
    let body = serde_json::to_string(&RateLimitErrorBody::from_decision(decision, now))
        .unwrap_or_default();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;

    let headers = response.headers_mut();
    headers.insert("content-type", "application/json".parse().unwrap());

    for (name, value) in info.to_headers() {
        if let Ok(header_value) = value.parse() {
            headers.insert(name, header_value);
        }
    }

    response
}
