use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use deadpool_postgres::{Client, Pool};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tokio_postgres::types::Json;

use crate::error::{AppError, Result};
use crate::models::session::{Session, SessionId};
use crate::session::store::SessionStore;

const SELECT_QUERY: &str = r#"
    SELECT user_id, ip_address, user_agent, data, expiry_time
    FROM sessions
    WHERE id = $1
"#;

// Conflicting writers to one ID resolve last-writer-wins at row level.
const UPSERT_QUERY: &str = r#"
    INSERT INTO sessions (id, user_id, ip_address, user_agent, data, expiry_time, last_activity)
    VALUES ($1, $2, $3, $4, $5, $6, NOW())
    ON CONFLICT (id) DO UPDATE
    SET user_id = EXCLUDED.user_id,
        data = EXCLUDED.data,
        expiry_time = EXCLUDED.expiry_time,
        last_activity = NOW()
"#;

const DELETE_QUERY: &str = "DELETE FROM sessions WHERE id = $1";

const CLEANUP_QUERY: &str = "DELETE FROM sessions WHERE expiry_time <= NOW()";

/// PostgreSQL-backed session store.
///
/// `data` is a JSONB column; `expiry_time` and `last_activity` are plain
/// columns so cleanup is a single bulk delete.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: Pool,
    lifetime: Duration,
    timeout: std::time::Duration,
}

impl PgSessionStore {
    /// Creates a new `PgSessionStore`.
    ///
    /// # Arguments
    ///
    /// * `pool` - The database connection pool.
    /// * `lifetime` - Lifetime given to newly created sessions.
    /// * `timeout` - Deadline applied to every store call.
    pub fn new(pool: Pool, lifetime: Duration, timeout: std::time::Duration) -> Self {
        Self {
            pool,
            lifetime,
            timeout,
        }
    }

    async fn bounded<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| AppError::StorageTimeout)?
    }

    async fn delete_by_id(client: &Client, id: &SessionId) -> Result<u64> {
        let statement = client.prepare_cached(DELETE_QUERY).await?;
        let deleted = client.execute(&statement, &[&id.as_bytes()]).await?;
        Ok(deleted)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, ip_address: &str, user_agent: &str) -> Result<Session> {
        let session = Session::new(
            SessionId::generate()?,
            ip_address,
            user_agent,
            Utc::now() + self.lifetime,
        );
        self.save(&session).await?;
        tracing::debug!("Session created: {:?}", session.id());
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        self.bounded(async {
            let client = self.pool.get().await?;
            let statement = client.prepare_cached(SELECT_QUERY).await?;
            let Some(row) = client.query_opt(&statement, &[&id.as_bytes()]).await? else {
                return Ok(None);
            };

            let expiry: DateTime<Utc> = row.try_get("expiry_time")?;
            if expiry <= Utc::now() {
                Self::delete_by_id(&client, id).await?;
                tracing::debug!("Deleted expired session {:?}", id);
                return Ok(None);
            }

            let Json(data): Json<HashMap<String, Value>> = row.try_get("data")?;
            Ok(Some(Session::restore(
                id.clone(),
                row.try_get("user_id")?,
                data,
                row.try_get("ip_address")?,
                row.try_get("user_agent")?,
                expiry,
            )))
        })
        .await
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.bounded(async {
            let client = self.pool.get().await?;
            let statement = client.prepare_cached(UPSERT_QUERY).await?;
            let user_id = session.user_id();
            let expiry = session.expiry();
            client
                .execute(
                    &statement,
                    &[
                        &session.id().as_bytes(),
                        &user_id,
                        &session.ip_address(),
                        &session.user_agent(),
                        &Json(session.data()),
                        &expiry,
                    ],
                )
                .await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        self.bounded(async {
            let client = self.pool.get().await?;
            Self::delete_by_id(&client, id).await?;
            Ok(())
        })
        .await
    }

    async fn cleanup(&self) -> Result<()> {
        self.bounded(async {
            let client = self.pool.get().await?;
            let statement = client.prepare_cached(CLEANUP_QUERY).await?;
            let removed = client.execute(&statement, &[]).await?;
            tracing::info!("🧹 Removed {} expired sessions", removed);
            Ok(())
        })
        .await
    }
}
