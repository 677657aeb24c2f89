use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics::counter;
use tracing::warn;

use super::error::{ApiError, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};
use super::rate_limit::{
    METRIC_RATE_LIMIT_REJECTED, RateLimitClass, RateLimitOutcome, resolve_identifier,
    retry_after_secs,
};
use super::state::ApiState;

pub async fn api_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let class = RateLimitClass::for_request(request.method(), request.uri().path());
    let identifier = resolve_identifier(request.headers());
    let policy = state.rate_limiter.policy(class);

    match state.rate_limiter.check(class, &identifier).await {
        RateLimitOutcome::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(policy.limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        RateLimitOutcome::Rejected { retry_after } => {
            let retry_after = retry_after_secs(retry_after);
            counter!(METRIC_RATE_LIMIT_REJECTED, "class" => class.as_str()).increment(1);
            warn!(
                target: "bloghub::ratelimit",
                class = class.as_str(),
                identifier = %identifier,
                retry_after,
                "Rate limit exceeded"
            );
            ApiError::rate_limited(policy.limit, retry_after)
        }
    }
}
