// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition and self-service sign-up. Inputs come from anonymous
// callers, so every field is validated by the service layer.

pub mod auth;
