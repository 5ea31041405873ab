use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::{Row, error::SqlState};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::{Credential, User},
};

/// Storage of user records, as seen by the sign-up and sign-in flows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// The user ID and password hash for `email`, `None` when unknown.
    async fn find_credential_by_email(&self, email: &str) -> Result<Option<Credential>>;

    /// Inserts a user; `AppError::DuplicateEmail` when the email is taken.
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User>;
}

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgreSQL implementation of [`UserRepository`].
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_credential_by_email(&self, email: &str) -> Result<Option<Credential>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                SELECT id, password_hash
                FROM users
                WHERE email = $1
                "#,
            )
            .await?;
        let row = client.query_opt(&statement, &[&email]).await?;

        row.map(|r| -> Result<Credential> {
            let id: Uuid = r.try_get("id")?;
            Ok(Credential {
                user_id: id.to_string(),
                password_hash: r.try_get("password_hash")?,
            })
        })
        .transpose()
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                INSERT INTO users (id, email, password_hash)
                VALUES ($1, $2, $3)
                RETURNING id, email, created_at, updated_at
                "#,
            )
            .await?;

        let row = client
            .query_one(&statement, &[&Uuid::new_v4(), &email, &password_hash])
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::DuplicateEmail(email.to_string())
                } else {
                    AppError::from(e)
                }
            })?;

        let user = row_to_user(&row)?;
        tracing::info!("✅ User created with ID: {}", user.id);
        Ok(user)
    }
}
