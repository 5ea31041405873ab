use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tower_cookies::{Cookie, Cookies, cookie::time::OffsetDateTime};

use crate::{
    config::SessionConfig,
    crypto::csrf::{generate_csrf_token, tokens_match},
    error::AppError,
    state::AppState,
};

/// The header that must echo the anti-forgery cookie.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Builds the anti-forgery cookie. Scripts must read it, so it is not
/// HttpOnly.
pub fn csrf_cookie(config: &SessionConfig, token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(config.csrf_name.clone(), token);
    cookie.set_http_only(false);
    cookie.set_secure(config.secure_cookies);
    cookie.set_same_site(config.same_site);
    cookie.set_path("/");

    let expires = (Utc::now() + config.csrf_duration).timestamp();
    if let Ok(expires) = OffsetDateTime::from_unix_timestamp(expires) {
        cookie.set_expires(expires);
    }
    cookie
}

/// A middleware that hands out an anti-forgery token when the client has none.
///
/// The token lives in its own cookie with its own expiry and is not bound to
/// the session.
pub async fn issue_csrf(
    State(state): State<AppState>,
    cookies: Cookies,
    req: Request<Body>,
    next: Next,
) -> Response {
    let config = state.sessions.config();

    if cookies.get(&config.csrf_name).is_none() {
        match generate_csrf_token() {
            Ok(token) => {
                cookies.add(csrf_cookie(config, token));
                tracing::debug!("🛡️ CSRF token issued");
            }
            Err(e) => return e.into_response(),
        }
    }

    next.run(req).await
}

/// A middleware that verifies the CSRF token.
///
/// Safe methods pass. Everything else must carry an `X-CSRF-Token` header
/// equal to the anti-forgery cookie.
pub async fn verify_csrf(
    State(state): State<AppState>,
    cookies: Cookies,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::GET
        || req.method() == Method::HEAD
        || req.method() == Method::OPTIONS
    {
        tracing::debug!("✅ CSRF exemption: {} request", req.method());
        return next.run(req).await;
    }

    let Some(cookie_token) = cookies
        .get(&state.sessions.config().csrf_name)
        .map(|c| c.value().to_string())
    else {
        return AppError::CsrfRejected("missing CSRF cookie".to_string()).into_response();
    };

    let header_token = match req.headers().get(CSRF_HEADER).map(|v| v.to_str()) {
        Some(Ok(token)) => token,
        Some(Err(_)) => {
            return AppError::CsrfRejected("invalid CSRF header".to_string()).into_response();
        }
        None => {
            return AppError::CsrfRejected("missing CSRF header".to_string()).into_response();
        }
    };

    if !tokens_match(&cookie_token, header_token) {
        return AppError::CsrfRejected("CSRF token mismatch".to_string()).into_response();
    }

    next.run(req).await
}
