use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::common::OwnerId;
use crate::server::error::ApiError;

pub const OWNER_HEADER: &str = "x-owner-id";

/// Owner identity resolved for the request.
///
/// Session handling lives in front of this service; it forwards the signed-in
/// user as the `x-owner-id` header. EventSource can't send custom headers, so
/// `?owner=` is accepted as a fallback.
#[derive(Clone, Copy, Debug)]
pub struct AuthOwner(pub OwnerId);

/// Resolves [`AuthOwner`] and adds it to request extensions.
/// Requests without one continue; handlers that need an owner reject them.
pub async fn owner_middleware(
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    match extract_owner(&request) {
        Some(owner) => {
            request.extensions_mut().insert(owner);
        }
        None => debug!("No owner identity on request"),
    }
    next.run(request).await
}

fn extract_owner(request: &axum::http::Request<axum::body::Body>) -> Option<AuthOwner> {
    let from_header = request
        .headers()
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let from_query = || {
        request.uri().query().and_then(|query| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "owner")
                .map(|(_, value)| value.to_string())
        })
    };

    let raw = from_header.or_else(from_query)?;
    OwnerId::parse(raw.trim()).ok().map(AuthOwner)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthOwner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthOwner>()
            .copied()
            .ok_or(ApiError::Unauthorized)
    }
}
