use axum::{extract::State, Extension};

use crate::database::models::UserView;
use crate::middleware::{require_role, ApiResponse, ApiResult, CurrentUser};
use crate::services::user_service::UserService;
use crate::state::AppState;
use crate::types::Role;

/// GET /api/users - All users (teacher, admin)
pub async fn users_list(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
) -> ApiResult<Vec<UserView>> {
    require_role(&viewer, &[Role::Teacher, Role::Admin])?;
    let users = UserService::new(&state).list(&viewer).await?;
    Ok(ApiResponse::success(users))
}
