use async_trait::async_trait;

use crate::error::Result;
use crate::models::session::{Session, SessionId};

/// Persistence contract shared by every session backend.
///
/// Cancellation is the caller's: dropping a returned future abandons the
/// call. Implementations never retry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists and returns a new anonymous session with empty data and
    /// `expiry = now + lifetime`.
    async fn create(&self, ip_address: &str, user_agent: &str) -> Result<Session>;

    /// `Ok(None)` when the ID is unknown or expired; an expired record is
    /// deleted before returning.
    async fn get(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Insert-or-overwrite of `user_id`, `data` and `expiry`; refreshes the
    /// last-activity marker.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Idempotent.
    async fn delete(&self, id: &SessionId) -> Result<()>;

    /// Removes every expired record.
    async fn cleanup(&self) -> Result<()>;
}
