use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;
pub mod types;
pub mod uploads;

use config::SecurityConfig;
use middleware::{jwt_auth_middleware, validate_user_middleware};
use state::AppState;

/// Full application router
pub fn app(state: AppState) -> Router {
    let max_body = state.config.api.max_request_size_bytes;
    let uploads_dir = state.uploads.root().to_path_buf();
    let cors = cors_layer(&state.config.security);

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected_routes(state.clone()))
        // Stored uploads, read-only
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use handlers::public::auth;

    Router::new()
        .route("/api/auth/login", post(auth::login_post))
        .route("/api/auth/register", post(auth::register_post))
}

/// Routes behind JWT validation and current-user loading. The layer added
/// last runs first, so the token is checked before the user is loaded.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(user_routes())
        .merge(media_routes())
        .route_layer(from_fn_with_state(state.clone(), validate_user_middleware))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn auth_routes() -> Router<AppState> {
    use handlers::protected::auth;

    Router::new().route("/api/auth/whoami", get(auth::whoami_get))
}

fn user_routes() -> Router<AppState> {
    use handlers::protected::users;

    Router::new()
        .route("/api/users", get(users::users_list))
        .route("/api/users/members/search", get(users::search_get))
        .route("/api/users/roles", get(users::roles_get))
        .route("/api/users/roles/", get(users::roles_get))
        .route("/api/users/picture/:id", post(users::picture_post))
        .route(
            "/api/users/:id",
            get(users::user_get).put(users::user_put).delete(users::user_delete),
        )
}

fn media_routes() -> Router<AppState> {
    use handlers::protected::media;

    Router::new()
        .route("/api/media/course/:course", get(media::course_get))
        .route(
            "/api/media/directory/:id",
            get(media::directory_get)
                .post(media::directory_post)
                .put(media::directory_put)
                .delete(media::directory_delete),
        )
        .route(
            "/api/media/file/:id",
            post(media::file_post).put(media::file_put).delete(media::file_delete),
        )
}

/// A layer without allowed origins adds no CORS headers.
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "LMS API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Users, course media and directory-service authentication",
            "endpoints": {
                "auth": "/api/auth/login, /api/auth/register (public), /api/auth/whoami",
                "users": "/api/users[/:id], /api/users/members/search, /api/users/roles/, /api/users/picture/:id",
                "media": "/api/media/course/:course, /api/media/directory/:id, /api/media/file/:id",
                "uploads": "/uploads/* (public, read-only)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.users.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
