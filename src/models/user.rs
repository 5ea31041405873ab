use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Represents a user in the system.
#[derive(Clone, Debug, Serialize)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's email address.
    pub email: String,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// The stored credential looked up at sign-in.
#[derive(Clone, Debug)]
pub struct Credential {
    pub user_id: String,
    pub password_hash: String,
}

/// The request payload for sign-up.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SignUpParams {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

/// The request payload for sign-in.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SignInParams {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}
