use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth;
use crate::error::ApiError;
use crate::state::AppState;

/// Extractor that enforces the optional bearer token.
pub struct Authenticated;

impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let bearer = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(auth::bearer_token);

        let allowed = auth::validate_bearer(&state.config, bearer);

        async move {
            if allowed {
                Ok(Authenticated)
            } else {
                Err(ApiError::Unauthorized)
            }
        }
    }
}
