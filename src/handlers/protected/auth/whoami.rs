// handlers/protected/auth/whoami.rs - GET /api/auth/whoami handler

use axum::Extension;

use crate::database::models::UserView;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};

/// GET /api/auth/whoami - The authenticated user as currently stored
pub async fn whoami_get(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResult<UserView> {
    Ok(ApiResponse::success(UserView::own(&user)))
}
