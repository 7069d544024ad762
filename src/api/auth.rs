//! Bearer key guard for the admin API
//!
//! Device endpoints stay open; only routes layered with [`require_api_key`]
//! need the operator key.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{ApiError, ApiState};

const CHALLENGE: &str = r#"Bearer realm="lora-relay""#;

/// Token from an `Authorization: Bearer <token>` header
///
/// The scheme is matched case-insensitively; an empty token counts as absent.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Compare keys without short-circuiting on the first differing byte
fn keys_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// 401 with a JSON body and a bearer challenge
fn reject() -> Response {
    let mut response = ApiError::unauthorized().into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
    response
}

/// Middleware requiring the configured admin key
///
/// With no key configured every request is let through with a warning.
pub async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        tracing::warn!(path = %req.uri().path(), "admin API key not configured");
        return next.run(req).await;
    };

    match bearer_token(req.headers()) {
        Some(token) if keys_match(token, expected) => next.run(req).await,
        Some(_) => {
            tracing::warn!(method = %req.method(), path = %req.uri().path(), "rejected admin key");
            reject()
        }
        None => {
            tracing::debug!(method = %req.method(), path = %req.uri().path(), "missing admin key");
            reject()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer   ")), None);
        assert_eq!(bearer_token(&headers("Bearer relay-key")), Some("relay-key"));
        assert_eq!(bearer_token(&headers("bearer relay-key")), Some("relay-key"));
        assert_eq!(bearer_token(&headers(" BEARER  relay-key ")), Some("relay-key"));
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("relay-key", "relay-key"));
        assert!(!keys_match("relay-kez", "relay-key"));
        assert!(!keys_match("relay", "relay-key"));
        assert!(!keys_match("", "relay-key"));
    }

    #[test]
    fn test_reject_carries_challenge() {
        let response = reject();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], CHALLENGE);
    }
}
