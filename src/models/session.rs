use chrono::{DateTime, SubsecRound, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::crypto::token;
use crate::error::Result;

/// Number of random bytes in a session ID.
pub const SESSION_ID_BYTES: usize = 32;

/// Flash key holding the path an anonymous visitor originally asked for.
pub const INTENDED_URL_KEY: &str = "intendedUrl";

/// Opaque, random session identifier.
///
/// Stored as raw bytes; travels base64url-encoded (unpadded) in cookies.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Vec<u8>);

impl SessionId {
    /// Generates a fresh identifier from the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        token::random_bytes(SESSION_ID_BYTES).map(SessionId)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        SessionId(bytes)
    }

    /// Decodes a cookie value; `None` when it is not valid base64url.
    pub fn decode(value: &str) -> Option<Self> {
        token::decode(value)
            .filter(|bytes| !bytes.is_empty())
            .map(SessionId)
    }

    pub fn encode(&self) -> String {
        token::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Keep raw IDs out of logs.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.encode();
        write!(f, "SessionId({}…)", &encoded[..encoded.len().min(8)])
    }
}

/// One browser-bound authentication context.
///
/// The value is owned by the request handling it; changes reach storage only
/// through the session manager (`flush`, `set_user_id`, `set_expiry`).
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    user_id: Option<String>,
    data: HashMap<String, Value>,
    ip_address: String,
    user_agent: String,
    expiry: DateTime<Utc>,
}

impl Session {
    /// A new anonymous session with empty data.
    pub fn new(
        id: SessionId,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id: None,
            data: HashMap::new(),
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
            expiry: storage_precision(expiry),
        }
    }

    /// Rebuilds a session read back from storage.
    pub fn restore(
        id: SessionId,
        user_id: Option<String>,
        data: HashMap<String, Value>,
        ip_address: String,
        user_agent: String,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            data,
            ip_address,
            user_agent,
            expiry,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    /// A session is invalid at or after its expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Reads a value, `None` when absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        self.data.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Read-then-delete. The entry is gone afterwards even if it did not
    /// deserialize as `T`.
    pub fn flash<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        self.data
            .remove(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub(crate) fn set_user_id(&mut self, user_id: Option<String>) {
        self.user_id = user_id;
    }

    pub(crate) fn set_expiry(&mut self, expiry: DateTime<Utc>) {
        self.expiry = storage_precision(expiry);
    }
}

/// Expiries are kept at microsecond precision, the resolution of
/// `TIMESTAMPTZ`, so a saved session reads back unchanged.
fn storage_precision(expiry: DateTime<Utc>) -> DateTime<Utc> {
    expiry.trunc_subsecs(6)
}
