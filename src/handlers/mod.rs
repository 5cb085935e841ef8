// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (JWT auth + current user loaded from the store)

pub mod protected; // JWT authentication required (/api/*)
pub mod public; // No authentication required (/api/auth/login, /api/auth/register)
