use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, middleware_layer::csrf::CSRF_HEADER, state::AppState};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::COOKIE,
            HeaderName::from_static(CSRF_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Builds the application router.
///
/// Outermost to innermost: CORS, cookie manager, anti-forgery issuance,
/// session resolution, tracing. State-changing API routes verify the anti-forgery
/// token; `/dashboard` and `/profile` require a signed-in session.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/signup", post(handlers::auth::sign_up))
        .route("/api/signin", post(handlers::auth::sign_in))
        .route("/api/signout", post(handlers::auth::sign_out))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::csrf::verify_csrf,
        ))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/dashboard", get(handlers::auth::dashboard))
        .route("/profile", get(handlers::auth::profile))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    let cors = cors_layer(&state.config.cors_allowed_origins);
    let public_routes = Router::new().route("/health", get(handlers::auth::health));

    Router::new()
        .merge(api_routes)
        .merge(protected_routes)
        .merge(public_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::resolve_session,
        ))
        .layer(from_fn_with_state(
            state,
            middleware_layer::csrf::issue_csrf,
        ))
        .layer(CookieManagerLayer::new())
        .layer(cors)
}
