// handlers/public/auth/login.rs - POST /api/auth/login handler

use axum::{extract::State, Json};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{self, LoginRequest, LoginResponse};
use crate::state::AppState;

/// POST /api/auth/login - Authenticate by email or uid and receive a JWT
///
/// The stored bcrypt hash is checked first; users with a uid fall back to
/// the LDAP directory when configured.
///
/// ```json
/// { "login": "jane@uni.edu", "password": "secret" }
/// ```
pub async fn login_post(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> ApiResult<LoginResponse> {
    let response = auth_service::login(&state, &request).await?;
    Ok(ApiResponse::success(response))
}
