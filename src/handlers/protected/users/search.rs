use axum::{
    extract::{Query, State},
    Extension,
};

use crate::middleware::{require_role, ApiResponse, ApiResult, CurrentUser};
use crate::services::user_service::{SearchParams, SearchResult, UserService};
use crate::state::AppState;
use crate::types::Role;

/// GET /api/users/members/search?role=&query=&limit= - Members of one role
/// matching the query, plus the total number of users holding that role
pub async fn search_get(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResult> {
    require_role(&viewer, &[Role::Teacher, Role::Admin])?;
    let result = UserService::new(&state).search(&viewer, &params).await?;
    Ok(ApiResponse::success(result))
}
