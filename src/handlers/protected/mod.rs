// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here runs behind jwt_auth_middleware and
// validate_user_middleware, so handlers receive the acting user as an
// `Extension<CurrentUser>`. Role checks happen per handler.

pub mod auth;
pub mod media;
pub mod users;
