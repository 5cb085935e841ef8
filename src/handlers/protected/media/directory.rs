use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{media_service, require_writer, NameBody};
use crate::database::models::{Directory, DirectoryListing};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

/// GET /api/media/course/:course - Root listing of a course, created on first access
pub async fn course_get(State(state): State<AppState>, Path(course): Path<String>) -> ApiResult<DirectoryListing> {
    let listing = media_service(&state).course_root(&course).await?;
    Ok(ApiResponse::success(listing))
}

/// GET /api/media/directory/:id
pub async fn directory_get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<DirectoryListing> {
    let listing = media_service(&state).listing(id).await?;
    Ok(ApiResponse::success(listing))
}

/// POST /api/media/directory/:parent - Create a subdirectory
pub async fn directory_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(parent): Path<Uuid>,
    Json(body): Json<NameBody>,
) -> ApiResult<Directory> {
    require_writer(&user)?;
    let directory = media_service(&state).create_directory(parent, &body.name).await?;
    Ok(ApiResponse::created(directory))
}

/// PUT /api/media/directory/:id - Rename
pub async fn directory_put(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<NameBody>,
) -> ApiResult<Directory> {
    require_writer(&user)?;
    let directory = media_service(&state).rename_directory(id, &body.name).await?;
    Ok(ApiResponse::success(directory))
}

/// DELETE /api/media/directory/:id - Remove a directory with everything below it
pub async fn directory_delete(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    require_writer(&user)?;
    let removed_files = media_service(&state).delete_directory(id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true, "files": removed_files })))
}
