// handlers/protected/media/mod.rs - /api/media handlers
//
// Any authenticated user may browse; changes need a non-student role.

use serde::Deserialize;

use crate::database::models::User;
use crate::error::ApiError;
use crate::services::media_service::MediaService;
use crate::state::AppState;

pub mod directory;
pub mod file;

pub use directory::{course_get, directory_delete, directory_get, directory_post, directory_put};
pub use file::{file_delete, file_post, file_put};

/// Body of create and rename requests
#[derive(Debug, Deserialize)]
pub struct NameBody {
    pub name: String,
}

fn media_service(state: &AppState) -> MediaService<'_> {
    MediaService::new(state.media.as_ref(), state.uploads.as_ref())
}

fn require_writer(user: &User) -> Result<(), ApiError> {
    if user.role.is_elevated() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Students cannot modify course media"))
    }
}
