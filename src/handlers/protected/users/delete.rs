use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::middleware::{require_role, ApiResponse, ApiResult, CurrentUser};
use crate::services::user_service::UserService;
use crate::state::AppState;
use crate::types::Role;

/// DELETE /api/users/:id - Admin only; the last admin cannot be removed
pub async fn user_delete(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    require_role(&actor, &[Role::Admin])?;
    UserService::new(&state).delete(&actor, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
