//! API routes

pub mod admin;
pub mod auth;
pub mod health;
pub mod password_reset;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::Request,
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};

use crate::{
    auth::{anti_forgery, optional_session, require_admin, require_session},
    security::security_headers_middleware,
    state::AppState,
};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public routes (no session, no anti-forgery check)
    let public_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/password-strength", post(auth::check_password_strength))
        .route("/password-reset/request", post(password_reset::request_reset))
        .route("/password-reset/verify", post(password_reset::verify_reset))
        .route("/password-reset/consume", patch(password_reset::consume_reset));

    // Logout works with or without a live session; anti-forgery applies when there is one
    let logout_routes = Router::new()
        .route("/logout", post(auth::logout))
        .layer(middleware::from_fn_with_state(state.clone(), anti_forgery))
        .layer(middleware::from_fn_with_state(state.clone(), optional_session));

    let admin_routes = Router::new()
        .route("/admin/sessions", get(admin::list_sessions))
        .route_layer(middleware::from_fn(require_admin));

    // Session required. Layers run bottom-up: session check, then anti-forgery.
    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), anti_forgery))
        .layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(health_routes)
        .merge(public_routes)
        .merge(logout_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
