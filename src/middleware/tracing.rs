//! Request tracing middleware
//!
//! Every request runs inside a `request` span. The span carries the issue id taken from
//! `/move-in-issues/:id` paths, and the auth extractors fill in `user_id` and `role`, so
//! service logs emitted while handling the request are tied to the caller.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{field, Instrument};
use uuid::Uuid;

pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = client_ip(&request);
    let request_id = Uuid::new_v4();

    let span = tracing::info_span!(
        "request",
        %request_id,
        method = %method,
        path = %path,
        issue_id = field::Empty,
        user_id = field::Empty,
        role = field::Empty,
    );
    if let Some(issue_id) = issue_id_from_path(&path) {
        span.record("issue_id", field::display(issue_id));
    }

    async move {
        let start = Instant::now();
        tracing::info!(client_ip = ?client_ip, "Request received");

        let response = next.run(request).await;

        let status = response.status().as_u16();
        let duration_ms = start.elapsed().as_millis() as u64;

        if response.status().is_server_error() {
            tracing::error!(status, duration_ms, "Request completed with error");
        } else if response.status().is_client_error() {
            tracing::warn!(status, duration_ms, "Request completed with client error");
        } else {
            tracing::info!(status, duration_ms, "Request completed");
        }

        response
    }
    .instrument(span)
    .await
}

/// Issue id segment of `/move-in-issues/:id[/...]`
fn issue_id_from_path(path: &str) -> Option<Uuid> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some("move-in-issues"), Some(id)) => Uuid::parse_str(id).ok(),
        _ => None,
    }
}

/// First hop of x-forwarded-for, falling back to x-real-ip
fn client_ip(request: &Request) -> Option<String> {
    let headers = request.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}
