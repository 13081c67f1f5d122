//! Bearer token extraction.
//!
//! The middleware only checks that a token is present; validation, live-role
//! lookup and rate limiting happen in `MonitorService::admit`.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::http::error::ApiError;
use crate::security::token::bearer_token;

/// Raw bearer token attached to authenticated requests.
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

pub async fn require_bearer(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = bearer_from_headers(request.headers()).ok_or(ApiError::MissingToken)?;
    request.extensions_mut().insert(BearerToken(token));
    Ok(next.run(request).await)
}

pub fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
}
