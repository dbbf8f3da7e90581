//! API Middleware
//!
//! Operation context extraction and request logging.

use std::net::IpAddr;

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::domain::{validate_email, Actor, DomainError, OperationContext};
use crate::error::AppError;

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";
pub const ACTOR_EMAIL_HEADER: &str = "X-Actor-Email";

// =========================================================================
// Operation context middleware
// =========================================================================

/// Build the `OperationContext` from gateway-supplied headers.
///
/// `X-Actor-Role: admin` marks an administrator; `X-Actor-Role: applicant`
/// (or `student`) must come with `X-Actor-Email`. No role header leaves the
/// actor empty, which is enough for the public endpoints.
pub async fn context_middleware(mut request: Request<Body>, next: Next) -> Response {
    let context = match context_from_headers(request.headers()) {
        Ok(context) => context,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

pub fn context_from_headers(headers: &HeaderMap) -> Result<OperationContext, AppError> {
    let correlation_id = header_str(headers, CORRELATION_ID_HEADER)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let mut context = OperationContext::new().with_correlation_id(correlation_id);

    if let Some(ip) = header_str(headers, "X-Forwarded-For")
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        context = context.with_client_ip(ip);
    }

    let role = match header_str(headers, ACTOR_ROLE_HEADER) {
        Some(role) => role.trim().to_ascii_lowercase(),
        None => return Ok(context),
    };

    let actor = match role.as_str() {
        "admin" => Actor::Admin,
        "applicant" | "student" => {
            let email = header_str(headers, ACTOR_EMAIL_HEADER)
                .ok_or_else(|| AppError::MissingHeader(ACTOR_EMAIL_HEADER.to_string()))?;
            Actor::Applicant {
                email: validate_email(email)?,
            }
        }
        other => {
            return Err(DomainError::invalid(format!("unknown actor role '{other}'")).into());
        }
    };

    Ok(context.with_actor(actor))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-actor-email"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let headers = mask_headers_for_logging(request.headers());

    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .and_then(|ctx| ctx.correlation_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
