//! Order-by-link middleware
//!
//! Wraps the storefront routes. A home-page hit carrying the order-code query
//! parameter is turned into a cart add plus `302` to checkout; a failed add
//! falls through to the page, which gets a console diagnostic when it is HTML.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use super::session::token_from_request;
use crate::application::{LinkOrderOutcome, LinkOrderService, StorefrontRequest};
use crate::domain::LinkOrderError;

/// Header browsers' XHR libraries set on background requests
pub const REQUESTED_WITH_HEADER: &str = "x-requested-with";

/// Largest page body that gets buffered for annotation
pub const ANNOTATION_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct LinkOrderState {
    pub service: Arc<LinkOrderService>,
}

fn is_xhr(headers: &HeaderMap) -> bool {
    headers
        .get(REQUESTED_WITH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false)
}

pub(crate) fn query_value(request: &Request<Body>, name: &str) -> Option<String> {
    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove(name))
}

/// Framework-independent view of `request`
pub fn storefront_request(request: &Request<Body>, query_parameter: &str) -> StorefrontRequest {
    StorefrontRequest {
        method: request.method().as_str().to_string(),
        path: request.uri().path().to_string(),
        xhr: is_xhr(request.headers()),
        article: query_value(request, query_parameter),
        token: token_from_request(request),
    }
}

pub async fn link_order_middleware(
    State(state): State<LinkOrderState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let settings = state.service.settings();
    let view = storefront_request(&request, &settings.query_parameter);

    let outcome = state.service.handle(&view).await;
    metrics::counter!("link_order_requests_total", "outcome" => outcome.label()).increment(1);

    match outcome {
        LinkOrderOutcome::PassThrough => next.run(request).await,
        LinkOrderOutcome::Redirect { location, .. } => redirect_response(&location),
        LinkOrderOutcome::Failed(error) => {
            metrics::counter!("link_order_failures_total", "kind" => error.kind()).increment(1);
            let response = next.run(request).await;
            if settings.annotate_errors {
                annotate_html_response(response, &error).await
            } else {
                response
            }
        }
    }
}

fn redirect_response(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            warn!(location, "Redirect target is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false)
}

/// `<script>` element that reports `error` to the browser console.
///
/// The message is emitted as a JSON string literal with `</` escaped so it
/// cannot close the script element.
pub fn console_error_script(error: &LinkOrderError) -> String {
    let message = format!("Error adding article to basket: {}", error);
    let literal = serde_json::to_string(&message)
        .unwrap_or_else(|_| "\"Error adding article to basket\"".to_string())
        .replace("</", "<\\/");
    format!("<script>console.error({});</script>", literal)
}

/// Prepend the console diagnostic to an HTML body. Other responses, and
/// bodies without a known size up to [`ANNOTATION_BODY_LIMIT`], are returned
/// untouched.
pub async fn annotate_html_response(response: Response, error: &LinkOrderError) -> Response {
    if !is_html(response.headers()) {
        return response;
    }

    let within_limit = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|len| len <= ANNOTATION_BODY_LIMIT as u64);
    if !within_limit {
        debug!("Page body too large or unsized; served without annotation");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let content = match axum::body::to_bytes(body, ANNOTATION_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read page body for annotation: {}", e);
            parts.headers.remove(header::CONTENT_LENGTH);
            parts.status = StatusCode::INTERNAL_SERVER_ERROR;
            return Response::from_parts(parts, Body::empty());
        }
    };

    let mut annotated = console_error_script(error).into_bytes();
    annotated.extend_from_slice(&content);

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(annotated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::Html;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn builds_storefront_view() {
        let view = storefront_request(&get("/?gArticle=XYZ&other=1"), "gArticle");
        assert_eq!(view.method, "GET");
        assert_eq!(view.path, "/");
        assert_eq!(view.article.as_deref(), Some("XYZ"));
        assert!(!view.xhr);
        assert!(view.token.is_none());
        assert!(view.is_candidate());
    }

    #[test]
    fn detects_xhr() {
        let request = Request::builder()
            .uri("/?gArticle=XYZ")
            .header(REQUESTED_WITH_HEADER, "XMLHttpRequest")
            .body(Body::empty())
            .unwrap();
        let view = storefront_request(&request, "gArticle");
        assert!(view.xhr);
        assert!(!view.is_candidate());
    }

    #[test]
    fn only_get_and_head_are_candidates() {
        for (method, candidate) in [("GET", true), ("HEAD", true), ("POST", false), ("DELETE", false)] {
            let request = Request::builder()
                .method(method)
                .uri("/?gArticle=XYZ")
                .body(Body::empty())
                .unwrap();
            let view = storefront_request(&request, "gArticle");
            assert_eq!(view.is_candidate(), candidate, "{method}");
        }
    }

    #[test]
    fn decodes_query_values() {
        let view = storefront_request(&get("/?gArticle=A%20B"), "gArticle");
        assert_eq!(view.article.as_deref(), Some("A B"));
        let view = storefront_request(&get("/?article=A"), "gArticle");
        assert!(view.article.is_none());
    }

    #[test]
    fn script_escapes_message() {
        let error = LinkOrderError::product_not_found("</script><b>\"x\"");
        let script = console_error_script(&error);
        assert!(script.starts_with("<script>console.error(\"Error adding article to basket: "));
        assert!(script.ends_with(");</script>"));
        assert_eq!(script.matches("</script>").count(), 1);
        assert!(script.contains("\\\"x\\\""));
    }

    #[tokio::test]
    async fn annotates_html_only() {
        let error = LinkOrderError::invalid_price("0");

        let html = Html("<h1>Home</h1>").into_response();
        let annotated = annotate_html_response(html, &error).await;
        let body = axum::body::to_bytes(annotated.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.starts_with("<script>console.error(\"Error adding article to basket: Invalid price: 0\");</script>"));
        assert!(body.ends_with("<h1>Home</h1>"));

        let text = "plain".into_response();
        let untouched = annotate_html_response(text, &error).await;
        let body = axum::body::to_bytes(untouched.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"plain");
    }

    #[tokio::test]
    async fn oversized_pages_are_not_buffered() {
        let error = LinkOrderError::invalid_price("0");
        let page = "x".repeat(ANNOTATION_BODY_LIMIT + 1);

        let response = annotate_html_response(Html(page).into_response(), &error).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.len(), ANNOTATION_BODY_LIMIT + 1);
        assert!(!body.starts_with(b"<script>"));
    }

    #[test]
    fn redirect_is_302_with_location() {
        let response = redirect_response("/checkout/cart");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/checkout/cart");
    }
}
