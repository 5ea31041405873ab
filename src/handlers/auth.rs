use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    crypto::csrf::generate_csrf_token,
    error::Result,
    middleware_layer::{
        auth::{CurrentUser, SIGNIN_PATH},
        csrf::csrf_cookie,
    },
    models::{
        session::Session,
        user::{SignInParams, SignUpParams},
    },
    response::{ApiResponse, RedirectData},
    services::auth as auth_service,
    session::manager::ClientMeta,
    state::AppState,
};

/// Where a signed-in user lands when no other destination was remembered.
pub const DEFAULT_LANDING: &str = "/dashboard";

/// The public view of a newly registered user.
#[derive(Serialize)]
pub struct SignUpData {
    pub id: Uuid,
    pub email: String,
}

/// The identity shown by protected pages.
#[derive(Serialize)]
pub struct UserData {
    pub user_id: String,
}

/// Handles user registration.
#[axum::debug_handler]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(params): Json<SignUpParams>,
) -> Result<Response> {
    tracing::info!("📝 Sign-up attempt for: {}", params.email);

    let user = auth_service::sign_up(state.users.as_ref(), &state.hasher, &params).await?;

    let response = ApiResponse::with_data(
        "Sign up successful!",
        SignUpData {
            id: user.id,
            email: user.email,
        },
    );

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles user sign-in.
///
/// The pre-login session is destroyed and a fresh one bound to the user
/// replaces it, so a planted session ID never becomes authenticated. The
/// anti-forgery token is re-issued too; it keeps its own expiry.
#[axum::debug_handler]
pub async fn sign_in(
    State(state): State<AppState>,
    cookies: Cookies,
    session: Option<Extension<Session>>,
    meta: Option<Extension<ClientMeta>>,
    Json(params): Json<SignInParams>,
) -> Result<Response> {
    tracing::info!("🔐 Sign-in attempt for: {}", params.email);

    let user_id = auth_service::sign_in(state.users.as_ref(), &state.hasher, &params).await?;

    let meta = meta.map(|Extension(m)| m).unwrap_or_default();
    let (session, intended_url) = state
        .sessions
        .rotate(session.map(|Extension(s)| s), &meta, &user_id)
        .await?;
    cookies.add(state.sessions.session_cookie(&session));
    cookies.add(csrf_cookie(state.sessions.config(), generate_csrf_token()?));

    let redirect_path = intended_url.unwrap_or_else(|| DEFAULT_LANDING.to_string());
    tracing::debug!("Post sign-in redirect: {}", redirect_path);

    let response = ApiResponse::with_data("Logged in.", RedirectData { redirect_path });
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user sign-out.
#[axum::debug_handler]
pub async fn sign_out(
    State(state): State<AppState>,
    cookies: Cookies,
    session: Option<Extension<Session>>,
) -> Result<Response> {
    if let Some(Extension(session)) = session {
        state.sessions.destroy(session.id()).await?;
        if let Some(user_id) = session.user_id() {
            tracing::info!("👋 User signed out: {}", user_id);
        }
    }
    cookies.remove(state.sessions.removal_cookie());

    let response = ApiResponse::with_data(
        "Signed out.",
        RedirectData {
            redirect_path: SIGNIN_PATH.to_string(),
        },
    );
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// The signed-in landing page.
pub async fn dashboard(Extension(CurrentUser(user_id)): Extension<CurrentUser>) -> Response {
    Json(ApiResponse::with_data(
        "Welcome to your dashboard.",
        UserData { user_id },
    ))
    .into_response()
}

pub async fn profile(Extension(CurrentUser(user_id)): Extension<CurrentUser>) -> Response {
    Json(ApiResponse::with_data("Your profile.", UserData { user_id })).into_response()
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
