use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub mod auth;
pub mod documents;
pub mod health;
pub mod policies;
pub mod profiles;

/// Multipart framing and text fields on top of the largest accepted file.
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

pub fn create_router(state: AppState) -> AppResult<Router<()>> {
    let allow_origin = match state.config.cors_allowed_origin.as_deref() {
        Some(origins) => {
            let headers = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| {
                    value.parse::<HeaderValue>().map_err(|err| {
                        AppError::internal(format!("invalid CORS allowed origin {value}: {err}"))
                    })
                })
                .collect::<AppResult<Vec<_>>>()?;
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/session", get(auth::session));

    let profile_routes = Router::new()
        .route("/", get(profiles::get_profile).patch(profiles::update_profile))
        .route("/picture", post(profiles::upload_picture));

    let employee_routes = Router::new()
        .route("/", get(profiles::list_employees))
        .route("/:id", delete(profiles::delete_employee));

    let documents_routes = Router::new()
        .route("/", get(documents::list_documents).post(documents::upload_document))
        .route("/:id", get(documents::get_document).delete(documents::delete_document))
        .route("/:id/view", get(documents::view_document))
        .route("/:id/download", get(documents::download_document))
        .route("/:id/review", post(documents::review_document))
        .route("/:id/approve", post(documents::quick_approve))
        .route("/:id/reject", post(documents::quick_reject));

    let review_routes = Router::new().route("/", get(documents::review_queue));

    let policy_routes = Router::new()
        .route("/", get(policies::list_policies).post(policies::create_policy))
        .route("/:id", delete(policies::delete_policy))
        .route("/:id/view", get(policies::view_policy))
        .route("/:id/download", get(policies::download_policy));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/profile", profile_routes)
        .nest("/api/employees", employee_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/reviews", review_routes)
        .nest("/api/policies", policy_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    let body_limit = state.config.max_upload_bytes + BODY_LIMIT_HEADROOM;

    Ok(Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}
