#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, Response, header},
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tower::ServiceExt;
use uuid::Uuid;

use warden::{
    config::{Config, SessionBackend, SessionConfig},
    crypto::password::PasswordHasher,
    error::{AppError, Result},
    models::{
        session::{Session, SessionId},
        user::{Credential, User},
    },
    repositories::user::UserRepository,
    router::build_router,
    session::{manager::SessionManager, memory::MemorySessionStore, store::SessionStore},
    state::AppState,
};

/// User repository kept in a vector, counting every call.
#[derive(Default)]
pub struct InMemoryUsers {
    rows: Mutex<Vec<(User, String)>>,
    calls: AtomicUsize,
}

impl InMemoryUsers {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_credential_by_email(&self, email: &str) -> Result<Option<Credential>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|(user, _)| user.email == email)
            .map(|(user, hash)| Credential {
                user_id: user.id.to_string(),
                password_hash: hash.clone(),
            }))
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|(user, _)| user.email == email) {
            return Err(AppError::DuplicateEmail(email.to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: now,
            updated_at: now,
        };
        rows.push((user.clone(), password_hash.to_string()));
        Ok(user)
    }
}

/// Session store whose reads and writes can be switched to fail.
pub struct FlakyStore {
    inner: MemorySessionStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemorySessionStore) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn create(&self, ip_address: &str, user_agent: &str) -> Result<Session> {
        self.inner.create(ip_address, user_agent).await
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::StorageTimeout);
        }
        self.inner.get(id).await
    }

    async fn save(&self, session: &Session) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal(
                "connection reset by sessions.example.internal".to_string(),
            ));
        }
        self.inner.save(session).await
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn cleanup(&self) -> Result<()> {
        self.inner.cleanup().await
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<InMemoryUsers>,
    pub store: MemorySessionStore,
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        shutdown_timeout: std::time::Duration::from_secs(1),
        database_url: String::new(),
        db_pool_max_size: 1,
        session_backend: SessionBackend::Memory,
        session: SessionConfig::default(),
        cors_allowed_origins: vec!["http://localhost:3000".to_string()],
    }
}

/// The full router over an in-memory session store and user repository,
/// with cheap hashing costs.
pub fn test_app() -> TestApp {
    let store = MemorySessionStore::new(test_config().session.session_duration);
    app_over(Arc::new(store.clone()), store)
}

/// Like [`test_app`], with sessions behind a [`FlakyStore`].
pub fn flaky_app() -> (TestApp, Arc<FlakyStore>) {
    let store = MemorySessionStore::new(test_config().session.session_duration);
    let flaky = Arc::new(FlakyStore::new(store.clone()));
    (app_over(flaky.clone(), store), flaky)
}

fn app_over(sessions: Arc<dyn SessionStore>, store: MemorySessionStore) -> TestApp {
    let config = test_config();
    let users = Arc::new(InMemoryUsers::default());
    let sessions = SessionManager::new(sessions, config.session.clone());

    let state = AppState::new(
        config,
        sessions,
        users.clone(),
        PasswordHasher::with_costs(8, 1, 1),
    );

    TestApp {
        router: build_router(state),
        users,
        store,
    }
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The raw `Set-Cookie` line for `name`, if the response sets it.
pub fn set_cookie_line(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(headers)
        .into_iter()
        .find(|line| line.starts_with(&prefix))
}

/// The value the response assigns to cookie `name`.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let line = set_cookie_line(headers, name)?;
    let pair = line.split(';').next()?;
    pair.split_once('=').map(|(_, value)| value.to_string())
}

/// Cookies a client holds between requests.
#[derive(Clone, Debug, Default)]
pub struct Client {
    pub sid: Option<String>,
    pub xsrf: Option<String>,
}

impl Client {
    /// Picks up whatever cookies the response sets.
    pub fn absorb(&mut self, headers: &HeaderMap) {
        if let Some(sid) = cookie_value(headers, "sid") {
            self.sid = Some(sid).filter(|v| !v.is_empty());
        }
        if let Some(xsrf) = cookie_value(headers, "xsrf") {
            self.xsrf = Some(xsrf);
        }
    }

    pub fn cookie_header(&self) -> String {
        let mut pairs = Vec::new();
        if let Some(sid) = &self.sid {
            pairs.push(format!("sid={}", sid));
        }
        if let Some(xsrf) = &self.xsrf {
            pairs.push(format!("xsrf={}", xsrf));
        }
        pairs.join("; ")
    }

    /// A browser-style GET.
    pub fn get(&self, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, self.cookie_header())
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap()
    }

    /// A GET negotiating JSON.
    pub fn get_json(&self, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, self.cookie_header())
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap()
    }

    /// A JSON POST echoing the anti-forgery cookie in the header.
    pub fn post_json(&self, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, self.cookie_header())
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-csrf-token", self.xsrf.clone().unwrap_or_default())
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}

/// A client that has made one request and holds fresh cookies.
pub async fn fresh_client(app: &TestApp) -> Client {
    let mut client = Client::default();
    let response = send(app, client.get("/health")).await;
    client.absorb(response.headers());
    assert!(client.sid.is_some() && client.xsrf.is_some());
    client
}
