use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::net::SocketAddr;
use tower_cookies::Cookies;

use crate::{
    models::session::{INTENDED_URL_KEY, Session},
    response::{ApiResponse, RedirectData, wants_json},
    session::manager::ClientMeta,
    state::AppState,
};

/// Where unauthenticated visitors are sent.
pub const SIGNIN_PATH: &str = "/signin";

/// The authenticated user's ID, present in request extensions only when
/// the session carries one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser(pub String);

/// Authentication state resolved for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    /// Neither a usable session nor a way to create one.
    NoSession,
    Anonymous,
    Authenticated(String),
}

impl AuthState {
    fn of(session: Option<&Session>) -> Self {
        match session {
            None => AuthState::NoSession,
            Some(session) => match session.user_id() {
                Some(user_id) => AuthState::Authenticated(user_id.to_string()),
                None => AuthState::Anonymous,
            },
        }
    }
}

/// Extracts the client address and user agent from the request.
///
/// The IP comes from `X-Real-IP`, then the first `X-Forwarded-For` entry,
/// then the peer address.
pub fn client_meta(req: &Request<Body>) -> ClientMeta {
    let headers = req.headers();
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let ip_address = header_str("x-real-ip")
        .or_else(|| {
            header_str("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_string)
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    ClientMeta {
        ip_address,
        user_agent,
    }
}

/// Resolves the request's session, creating an anonymous one when needed.
///
/// Lookup failures fall back to a fresh anonymous session rather than
/// rejecting the request. The resolved [`Session`], the [`ClientMeta`] and,
/// when signed in, the [`CurrentUser`] are inserted into request extensions.
pub async fn resolve_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let existing = match state.sessions.fetch(&cookies).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("❌ Unable to retrieve session, starting a new one: {}", e);
            None
        }
    };

    let meta = client_meta(&request);
    let session = match existing {
        Some(session) => Some(session),
        None => {
            tracing::debug!("No valid session cookie. Starting a new session.");
            match state.sessions.start(&meta).await {
                Ok(session) => {
                    cookies.add(state.sessions.session_cookie(&session));
                    Some(session)
                }
                Err(e) => {
                    tracing::error!("❌ Unable to start a session: {}", e);
                    None
                }
            }
        }
    };

    let auth_state = AuthState::of(session.as_ref());
    tracing::debug!(?auth_state, "Session resolved");

    if let AuthState::Authenticated(user_id) = auth_state {
        request.extensions_mut().insert(CurrentUser(user_id));
    }
    if let Some(session) = session {
        request.extensions_mut().insert(session);
    }
    request.extensions_mut().insert(meta);

    next.run(request).await
}

/// Lets only authenticated requests through.
///
/// JSON clients get a `302` with a body naming the sign-in path; browsers
/// are redirected there after the requested path is stored as the
/// `intendedUrl` flash.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.extensions().get::<CurrentUser>().is_some() {
        return next.run(request).await;
    }

    tracing::debug!("🔐 Login required for {}", request.uri().path());

    if wants_json(request.headers()) {
        let body = ApiResponse::with_data(
            "Login is required to access this resource.",
            RedirectData {
                redirect_path: SIGNIN_PATH.to_string(),
            },
        );
        return (StatusCode::FOUND, Json(body)).into_response();
    }

    if let Some(mut session) = request.extensions().get::<Session>().cloned() {
        let intended = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        let remembered = match session.set(INTENDED_URL_KEY, intended) {
            Ok(()) => state.sessions.flush(&session).await,
            Err(e) => Err(e),
        };
        if let Err(e) = remembered {
            tracing::warn!("Unable to remember intended URL: {}", e);
        }
    }

    Redirect::to(SIGNIN_PATH).into_response()
}
