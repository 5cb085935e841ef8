use serde::{Deserialize, Serialize};

use crate::auth::generate_jwt;
use crate::auth::password::verify_password_async;
use crate::database::models::{User, UserView};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Email address or directory uid
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

/// Which check accepted the credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Local,
    Directory,
}

/// Local password first, then the directory service for users with a uid.
pub async fn authenticate(state: &AppState, login: &str, password: &str) -> Result<(User, AuthMethod), ApiError> {
    let invalid = || ApiError::unauthorized("Invalid credentials");

    let Some(user) = state.users.find_by_login(login.trim()).await? else {
        tracing::warn!("Login failed: no account for '{}'", login);
        return Err(invalid());
    };

    if verify_password_async(password, &user.password_hash).await {
        return Ok((user, AuthMethod::Local));
    }

    if let Some(uid) = user.uid.as_deref() {
        if state.directory.authenticate(uid, password).await {
            return Ok((user, AuthMethod::Directory));
        }
    }

    tracing::warn!("Login failed for user {}", user.id);
    Err(invalid())
}

pub async fn login(state: &AppState, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
    let (user, method) = authenticate(state, &request.login, &request.password).await?;

    let token = generate_jwt(&user, &state.config.security).map_err(|e| {
        tracing::error!("Token generation failed: {}", e);
        ApiError::internal_server_error("Failed to issue token")
    })?;

    tracing::info!("User {} logged in ({:?})", user.id, method);
    Ok(LoginResponse {
        token,
        user: UserView::own(&user),
    })
}
