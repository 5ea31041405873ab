use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::session::{Session, SessionId};
use crate::session::store::SessionStore;

/// A stored session plus the last time it was saved.
#[derive(Clone)]
struct Entry {
    session: Session,
    last_activity: DateTime<Utc>,
}

/// Process-local session store.
///
/// One reader/writer lock guards the whole map, so all operations on a given
/// ID are serialized.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Entry>>>,
    lifetime: Duration,
}

impl MemorySessionStore {
    /// Creates a new `MemorySessionStore`.
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            lifetime,
        }
    }

    /// Spawns the eviction task.
    ///
    /// It wakes every `interval`, evicts expired entries under the write lock
    /// and returns once `shutdown` is cancelled. Await the handle before the
    /// process exits.
    pub fn spawn_cleanup(
        &self,
        interval: std::time::Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Session cleanup task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = store.evict_expired(Utc::now()).await;
                        if removed > 0 {
                            tracing::info!("🧹 Evicted {} expired sessions", removed);
                        }
                    }
                }
            }
        })
    }

    /// Number of records currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Last save time of a record, regardless of expiry.
    pub async fn last_activity(&self, id: &SessionId) -> Option<DateTime<Utc>> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|entry| entry.last_activity)
    }

    async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.session.is_expired_at(now));
        before - sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, ip_address: &str, user_agent: &str) -> Result<Session> {
        let session = Session::new(
            SessionId::generate()?,
            ip_address,
            user_agent,
            Utc::now() + self.lifetime,
        );
        self.save(&session).await?;
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                None => return Ok(None),
                Some(entry) if !entry.session.is_expired_at(now) => {
                    return Ok(Some(entry.session.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, a concurrent save may have
        // extended it in between.
        let mut sessions = self.sessions.write().await;
        let expired = sessions
            .get(id)
            .map(|entry| entry.session.is_expired_at(now));
        match expired {
            Some(true) => {
                sessions.remove(id);
                tracing::debug!("Deleted expired session {:?}", id);
                Ok(None)
            }
            Some(false) => Ok(sessions.get(id).map(|entry| entry.session.clone())),
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let entry = Entry {
            session: session.clone(),
            last_activity: Utc::now(),
        };
        self.sessions
            .write()
            .await
            .insert(session.id().clone(), entry);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        let removed = self.evict_expired(Utc::now()).await;
        tracing::debug!("Session cleanup removed {} records", removed);
        Ok(())
    }
}
