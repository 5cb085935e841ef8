// handlers/public/auth/mod.rs - Public authentication handlers

pub mod login; // POST /api/auth/login - authenticate and get JWT
pub mod register; // POST /api/auth/register - create a student account

pub use login::login_post;
pub use register::register_post;
