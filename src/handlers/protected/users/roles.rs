use crate::middleware::{ApiResponse, ApiResult};
use crate::types::Role;

/// GET /api/users/roles/ - Every assignable role, for any authenticated caller
pub async fn roles_get() -> ApiResult<Vec<Role>> {
    Ok(ApiResponse::success(Role::ALL.to_vec()))
}
