use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_cookies::{Cookie, Cookies, cookie::time::OffsetDateTime};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::models::session::{INTENDED_URL_KEY, Session, SessionId};
use crate::session::store::SessionStore;

/// Where a new session comes from, captured for auditing only.
#[derive(Clone, Debug, Default)]
pub struct ClientMeta {
    pub ip_address: String,
    pub user_agent: String,
}

/// Orchestrates session lifecycle on top of a [`SessionStore`].
///
/// Sessions do not point back at their store; every operation that persists
/// a mutation goes through the manager.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    /// Creates a new `SessionManager`.
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Creates an anonymous session and pins its lifetime.
    ///
    /// The caller must send [`SessionManager::session_cookie`] for it.
    pub async fn start(&self, meta: &ClientMeta) -> Result<Session> {
        let mut session = self
            .store
            .create(&meta.ip_address, &meta.user_agent)
            .await?;
        self.set_expiry(&mut session, self.config.session_duration)
            .await?;
        tracing::debug!("Session started: {:?}", session.id());
        Ok(session)
    }

    /// Loads the session named by the request cookie.
    ///
    /// No cookie, an undecodable cookie, or an unknown/expired ID all give
    /// `Ok(None)`.
    pub async fn fetch(&self, cookies: &Cookies) -> Result<Option<Session>> {
        let Some(cookie) = cookies.get(&self.config.session_name) else {
            return Ok(None);
        };

        let Some(id) = SessionId::decode(cookie.value()) else {
            tracing::debug!("Ignoring undecodable session cookie");
            return Ok(None);
        };

        self.store.get(&id).await
    }

    /// Deletes a session; used on sign-out and ID rotation.
    pub async fn destroy(&self, id: &SessionId) -> Result<()> {
        self.store.delete(id).await?;
        tracing::debug!("Session destroyed: {:?}", id);
        Ok(())
    }

    /// Removes every expired session.
    pub async fn gc(&self) -> Result<()> {
        self.store.cleanup().await
    }

    /// Persists the in-memory session value.
    pub async fn flush(&self, session: &Session) -> Result<()> {
        self.store.save(session).await
    }

    /// Binds a user to the session and flushes it.
    pub async fn set_user_id(
        &self,
        session: &mut Session,
        user_id: impl Into<String>,
    ) -> Result<()> {
        session.set_user_id(Some(user_id.into()));
        self.flush(session).await
    }

    /// Sets `expiry = now + lifetime` and flushes.
    pub async fn set_expiry(&self, session: &mut Session, lifetime: Duration) -> Result<()> {
        session.set_expiry(Utc::now() + lifetime);
        self.flush(session).await
    }

    /// Replaces `previous` with a fresh session bound to `user_id`.
    ///
    /// Returns the new session and the `intendedUrl` flash value read from
    /// the previous one, if any.
    pub async fn rotate(
        &self,
        previous: Option<Session>,
        meta: &ClientMeta,
        user_id: &str,
    ) -> Result<(Session, Option<String>)> {
        let mut intended_url = None;
        if let Some(mut previous) = previous {
            intended_url = previous.flash::<String>(INTENDED_URL_KEY);
            self.destroy(previous.id()).await?;
        }

        let mut session = self.start(meta).await?;
        self.set_user_id(&mut session, user_id).await?;
        tracing::info!("✅ Session bound to user: {}", user_id);
        Ok((session, intended_url))
    }

    /// Runs [`SessionManager::gc`] every `interval` until `shutdown` fires.
    pub fn spawn_gc(
        &self,
        interval: std::time::Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = manager.gc().await {
                            tracing::error!("❌ Session GC failed: {}", e);
                        }
                    }
                }
            }
            tracing::debug!("Session GC task stopped");
        })
    }

    /// The Set-Cookie value carrying this session's ID.
    pub fn session_cookie(&self, session: &Session) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.config.session_name.clone(), session.id().encode());
        cookie.set_http_only(true);
        cookie.set_secure(self.config.secure_cookies);
        cookie.set_same_site(self.config.same_site);
        cookie.set_path("/");
        if let Ok(expires) = OffsetDateTime::from_unix_timestamp(session.expiry().timestamp()) {
            cookie.set_expires(expires);
        }
        cookie
    }

    /// A cookie that clears the session cookie in the browser.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.config.session_name.clone(), "");
        cookie.set_path("/");
        cookie
    }
}
