//! Context-token session middleware
//!
//! Plays the host platform's part. The token is read from the
//! `sw-context-token` header or cookie. Visitors without a valid one get a
//! fresh context and a `Set-Cookie` only when the request needs a cart: an
//! order link on the home page, or the cart pages. Plain page views stay
//! anonymous.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::link_order::query_value;
use crate::domain::{ContextToken, SessionResolver};

/// Header and cookie name carrying the context token
pub const CONTEXT_TOKEN_HEADER: &str = "sw-context-token";
pub const CONTEXT_TOKEN_COOKIE: &str = "sw-context-token";

#[derive(Clone)]
pub struct SessionState {
    pub sessions: Arc<dyn SessionResolver>,
    /// Order-code query parameter that makes a home-page hit need a context
    pub query_parameter: String,
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Token presented by the client, header first, then cookie
pub fn token_from_headers(headers: &HeaderMap) -> Option<ContextToken> {
    headers
        .get(CONTEXT_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ContextToken::new)
        .or_else(|| cookie_value(headers, CONTEXT_TOKEN_COOKIE).map(ContextToken::new))
}

/// Token attached by [`session_middleware`], falling back to the raw headers
pub fn token_from_request(request: &Request<Body>) -> Option<ContextToken> {
    request
        .extensions()
        .get::<ContextToken>()
        .cloned()
        .or_else(|| token_from_headers(request.headers()))
}

/// Whether a visitor without a valid token should be issued a context
fn needs_context(request: &Request<Body>, query_parameter: &str) -> bool {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return false;
    }
    request.uri().path() != "/"
        || query_value(request, query_parameter).is_some_and(|v| !v.is_empty())
}

pub async fn session_middleware(
    State(state): State<SessionState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let presented = token_from_headers(request.headers());

    let known = match &presented {
        Some(token) => match state.sessions.resolve(token).await {
            Ok(Some(context)) => Some(context.token),
            Ok(None) => None,
            Err(e) => {
                warn!("Session resolver failed: {}", e);
                None
            }
        },
        None => None,
    };

    let (token, issued) = match known {
        Some(token) => (Some(token), false),
        None if !needs_context(&request, &state.query_parameter) => (None, false),
        None => match state.sessions.open().await {
            Ok(context) => (Some(context.token), true),
            Err(e) => {
                warn!("Failed to open sales channel context: {}", e);
                (None, false)
            }
        },
    };

    if let Some(token) = &token {
        request.extensions_mut().insert(token.clone());
    }

    let mut response = next.run(request).await;

    if let (Some(token), true) = (token, issued) {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            CONTEXT_TOKEN_COOKIE, token
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sw-context-token=abc123; lang=en"),
        );
        assert_eq!(token_from_headers(&headers), Some(ContextToken::new("abc123")));
    }

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTEXT_TOKEN_HEADER, HeaderValue::from_static("from-header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("sw-context-token=from-cookie"));
        assert_eq!(token_from_headers(&headers), Some(ContextToken::new("from-header")));
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn contexts_only_for_order_links_and_cart_pages() {
        assert!(needs_context(&request("GET", "/?gArticle=XYZ"), "gArticle"));
        assert!(needs_context(&request("GET", "/checkout/cart"), "gArticle"));
        assert!(needs_context(&request("HEAD", "/api/cart"), "gArticle"));

        assert!(!needs_context(&request("GET", "/"), "gArticle"));
        assert!(!needs_context(&request("GET", "/?gArticle="), "gArticle"));
        assert!(!needs_context(&request("GET", "/?other=1"), "gArticle"));
        assert!(!needs_context(&request("POST", "/?gArticle=XYZ"), "gArticle"));
    }

    #[test]
    fn empty_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sw-context-token="));
        assert_eq!(token_from_headers(&headers), None);
    }
}
