use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::database::models::User;
use crate::database::StoreError;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::Role;

/// The acting user, freshly loaded from the store
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Middleware that loads the user named by the JWT claims. Role changes made
/// after the token was issued take effect immediately.
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let user = match state.users.find_by_id(auth_user.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!("User validation failed: user {} no longer exists", auth_user.user_id);
            return Err(ApiError::unauthorized("User no longer exists"));
        }
        Err(StoreError::InvalidRecord(msg)) => {
            tracing::error!("User validation failed: {}", msg);
            return Err(ApiError::internal_server_error("Authenticated user has no recognized role"));
        }
        Err(e) => return Err(e.into()),
    };

    if user.role != auth_user.role {
        tracing::debug!("Role of user {} changed from {} to {} since login", user.id, auth_user.role, user.role);
    }

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// Fails with 403 unless the user holds one of the allowed roles
pub fn require_role(user: &User, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("Role '{}' may not access this resource", user.role)))
    }
}
