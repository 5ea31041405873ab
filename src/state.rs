use std::sync::Arc;

use crate::config::Config;
use crate::crypto::password::PasswordHasher;
use crate::repositories::user::UserRepository;
use crate::session::manager::SessionManager;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// Session lifecycle on top of the selected store.
    pub sessions: SessionManager,
    /// The user repository.
    pub users: Arc<dyn UserRepository>,
    /// The password hasher.
    pub hasher: PasswordHasher,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    /// * `sessions` - The session manager.
    /// * `users` - The user repository.
    /// * `hasher` - The password hasher.
    pub fn new(
        config: Config,
        sessions: SessionManager,
        users: Arc<dyn UserRepository>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
            users,
            hasher,
        }
    }
}
