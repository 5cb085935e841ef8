pub mod auth;
pub mod media;
pub mod users;
