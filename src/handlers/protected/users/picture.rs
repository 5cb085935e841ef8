use axum::{
    extract::{Multipart, Path, State},
    Extension,
};
use uuid::Uuid;

use crate::database::models::UserView;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::user_service::UserService;
use crate::state::AppState;

/// POST /api/users/picture/:id - Replace a profile picture
///
/// Expects a single multipart field named `file`. Allowed for the user
/// themself, admins, and roles with a higher edit level than the target.
pub async fn picture_post(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<UserView> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        let user = UserService::new(&state)
            .set_picture(&actor, id, &original_name, bytes.to_vec())
            .await?;
        return Ok(ApiResponse::success(user));
    }

    Err(ApiError::bad_request_with_code("Missing multipart field 'file'", "MISSING_FILE"))
}
