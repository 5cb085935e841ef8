use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{media_service, require_writer, NameBody};
use crate::database::models::MediaFile;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::media_service::IncomingFile;
use crate::state::AppState;

/// POST /api/media/file/:directory - Upload one or more `file` fields
pub async fn file_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(directory): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Vec<MediaFile>> {
    require_writer(&user)?;

    let mut incoming = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        incoming.push(IncomingFile {
            name,
            mime_type,
            bytes: bytes.to_vec(),
        });
    }

    let files = media_service(&state).upload(directory, incoming).await?;
    tracing::info!("User {} uploaded {} file(s) to {}", user.id, files.len(), directory);
    Ok(ApiResponse::created(files))
}

/// PUT /api/media/file/:id - Rename
pub async fn file_put(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<NameBody>,
) -> ApiResult<MediaFile> {
    require_writer(&user)?;
    let file = media_service(&state).rename_file(id, &body.name).await?;
    Ok(ApiResponse::success(file))
}

/// DELETE /api/media/file/:id
pub async fn file_delete(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    require_writer(&user)?;
    media_service(&state).delete_file(id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
