//! Admin API-key middleware for Axum

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::common::ApiResponse;

/// Header carrying the admin API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication error types
#[derive(Debug)]
pub enum AuthError {
    MissingApiKey,
    InvalidApiKey,
}

/// Hash of the configured admin key
#[derive(Clone)]
pub struct AdminAuthState {
    key_hash: Arc<str>,
}

impl AdminAuthState {
    pub fn new(api_key: &str) -> Self {
        Self {
            key_hash: hash_api_key(api_key).into(),
        }
    }

    pub fn verify(&self, presented: &str) -> bool {
        hash_api_key(presented) == *self.key_hash
    }
}

/// Lowercase hex SHA-256 of `key`
pub fn hash_api_key(key: &str) -> String {
    Sha256::digest(key.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Rejects requests without a valid `X-API-Key`
pub async fn admin_auth_middleware(
    State(auth): State<AdminAuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(presented) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
    else {
        return auth_error_response(AuthError::MissingApiKey);
    };

    if !auth.verify(presented) {
        warn!(path = %request.uri().path(), "Rejected admin request with invalid API key");
        return auth_error_response(AuthError::InvalidApiKey);
    }

    next.run(request).await
}

fn auth_error_response(error: AuthError) -> Response {
    let message = match error {
        AuthError::MissingApiKey => "Missing API key",
        AuthError::InvalidApiKey => "Invalid API key",
    };
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error(message)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_configured_key() {
        let auth = AdminAuthState::new("s3cret-admin-key");
        assert!(auth.verify("s3cret-admin-key"));
        assert!(!auth.verify("s3cret-admin-key "));
        assert!(!auth.verify(""));
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
