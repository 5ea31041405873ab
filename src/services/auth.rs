use zeroize::Zeroizing;

use crate::crypto::password::PasswordHasher;
use crate::error::{AppError, Result};
use crate::models::user::{SignInParams, SignUpParams, User};
use crate::repositories::user::UserRepository;
use crate::validation::auth::{validate_sign_in, validate_sign_up};

/// Runs the memory-hard hash off the async workers.
async fn hash_blocking(hasher: &PasswordHasher, password: &str) -> Result<String> {
    let hasher = hasher.clone();
    let password = Zeroizing::new(password.to_string());
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

async fn verify_blocking(hasher: &PasswordHasher, password: &str, encoded: String) -> Result<bool> {
    let hasher = hasher.clone();
    let password = Zeroizing::new(password.to_string());
    tokio::task::spawn_blocking(move || hasher.verify(&password, &encoded))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
}

/// Registers a new user.
///
/// Validation runs before any I/O; a taken email surfaces as
/// `AppError::DuplicateEmail`.
///
/// # Arguments
///
/// * `users` - The user repository.
/// * `hasher` - The password hasher.
/// * `params` - The sign-up form.
///
/// # Returns
///
/// A `Result` containing the created `User`.
pub async fn sign_up(
    users: &dyn UserRepository,
    hasher: &PasswordHasher,
    params: &SignUpParams,
) -> Result<User> {
    validate_sign_up(params)?;

    let password_hash = hash_blocking(hasher, &params.password).await?;
    let user = users.create_user(&params.email, &password_hash).await?;

    tracing::info!("✅ User registered: {}", user.id);
    Ok(user)
}

/// Checks a user's credentials.
///
/// Unknown emails and wrong passwords both give
/// `AppError::InvalidCredentials`.
///
/// # Returns
///
/// A `Result` containing the authenticated user's ID.
pub async fn sign_in(
    users: &dyn UserRepository,
    hasher: &PasswordHasher,
    params: &SignInParams,
) -> Result<String> {
    validate_sign_in(params)?;

    let Some(credential) = users.find_credential_by_email(&params.email).await? else {
        // Unknown emails cost one hash, like a wrong password.
        hash_blocking(hasher, &params.password).await?;
        tracing::debug!("Sign-in for unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_blocking(hasher, &params.password, credential.password_hash).await? {
        tracing::debug!("Password mismatch for user {}", credential.user_id);
        return Err(AppError::InvalidCredentials);
    }

    tracing::info!("✅ User signed in: {}", credential.user_id);
    Ok(credential.user_id)
}
