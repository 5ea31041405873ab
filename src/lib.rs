//! Session-backed authentication for axum services.
//!
//! Passwords are stored as Argon2id hashes, sessions live in PostgreSQL or
//! in memory behind one [`session::store::SessionStore`] contract, and a pair
//! of middlewares binds an anonymous or authenticated identity to each
//! request.

pub mod config;
pub mod db;
pub mod error;
pub mod response;
pub mod router;
pub mod state;

pub mod crypto {
    pub mod csrf;
    pub mod password;
    pub mod token;
}

pub mod models {
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod user;
}

pub mod services {
    pub mod auth;
}

pub mod handlers {
    pub mod auth;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod csrf;
}

pub mod session {
    pub mod manager;
    pub mod memory;
    pub mod postgres;
    pub mod store;
}

pub mod validation {
    pub mod auth;
    pub mod form;
}
