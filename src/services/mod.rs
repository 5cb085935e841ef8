pub mod auth_service;
pub mod media_service;
pub mod user_service;

pub use media_service::{MediaError, MediaService};
pub use user_service::{UpdateRejection, UserService};
