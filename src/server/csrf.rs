//! Double-submit CSRF check: the `csrftoken` cookie must match the
//! `X-CSRFToken` header.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use uuid::Uuid;

use super::errors::ApiError;

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "x-csrftoken";

#[inline]
pub fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[inline]
pub fn set_cookie_value(token: &str) -> String {
    format!("{CSRF_COOKIE}={token}; Path=/; SameSite=Lax")
}

/// Value of the `csrftoken` cookie across all `Cookie` headers
#[inline]
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CSRF_COOKIE)
        .map(|(_, value)| value.trim().to_string())
}

#[inline]
pub fn verify(headers: &HeaderMap) -> Result<(), ApiError> {
    let cookie = cookie_token(headers)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Forbidden("CSRF cookie not set".to_string()))?;
    let header = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Forbidden("CSRF header missing".to_string()))?;

    if tokens_match(cookie.as_bytes(), header.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("CSRF token mismatch".to_string()))
    }
}

fn tokens_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
