use axum::{
    extract::{Path, State},
    Extension,
};
use uuid::Uuid;

use crate::database::models::UserView;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::user_service::UserService;
use crate::state::AppState;

/// GET /api/users/:id
pub async fn user_get(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserView> {
    let user = UserService::new(&state).get(&viewer, id).await?;
    Ok(ApiResponse::success(user))
}
