use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::UserView;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::user_service::{UserService, UserUpdate};
use crate::state::AppState;

/// PUT /api/users/:id - Partial update, subject to the edit-level rules
///
/// ```json
/// { "email": "new@uni.edu", "profile": { "lastName": "Doe" },
///   "password": "next", "currentPassword": "previous" }
/// ```
pub async fn user_put(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<UserUpdate>,
) -> ApiResult<UserView> {
    let user = UserService::new(&state).update(&actor, id, update).await?;
    Ok(ApiResponse::success(user))
}
