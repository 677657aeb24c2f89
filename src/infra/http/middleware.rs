use std::time::{Duration, Instant};

use axum::{
    body::Body, extract::State, http::Request, middleware::Next, response::Response,
};
use metrics::histogram;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const METRIC_HTTP_REQUEST_MS: &str = "bloghub_http_request_ms";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Settings for [`log_responses`].
#[derive(Debug, Clone, Copy)]
pub struct ResponseLogConfig {
    pub slow_request: Duration,
}

impl Default for ResponseLogConfig {
    fn default() -> Self {
        Self {
            slow_request: Duration::from_millis(1000),
        }
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(
    State(config): State<ResponseLogConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed = start.elapsed();
    let elapsed_ms = elapsed.as_millis();

    histogram!(METRIC_HTTP_REQUEST_MS, "method" => method.to_string())
        .record(elapsed.as_secs_f64() * 1000.0);

    if elapsed > config.slow_request {
        warn!(
            target: "bloghub::http::slow",
            method = %method,
            path = %uri.path(),
            status = status.as_u16(),
            elapsed_ms = elapsed_ms,
            threshold_ms = config.slow_request.as_millis(),
            request_id = request_id,
            "slow request",
        );
    }

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target: "bloghub::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target: "bloghub::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}
