// handlers/public/auth/register.rs - POST /api/auth/register handler

use axum::{extract::State, Json};

use crate::database::models::UserView;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::user_service::{RegisterRequest, UserService};
use crate::state::AppState;

/// POST /api/auth/register - Create a student account
pub async fn register_post(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> ApiResult<UserView> {
    let user = UserService::new(&state).register(request).await?;
    Ok(ApiResponse::created(user))
}
