use crate::error::{AppError, Result};
use crate::models::user::{SignInParams, SignUpParams};
use crate::validation::form::Form;

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum password length accepted at sign-up.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Validates a sign-up form.
///
/// # Arguments
///
/// * `params` - The submitted sign-up form.
///
/// # Returns
///
/// `Ok(())` or `AppError::Validation` listing every failing field.
pub fn validate_sign_up(params: &SignUpParams) -> Result<()> {
    let mut form = Form::new();
    form.required(&[
        ("email", params.email.as_str()),
        ("password", params.password.as_str()),
        ("password_confirmation", params.password_confirmation.as_str()),
    ])
    .email("email", &params.email)
    .length(
        "password",
        &params.password,
        MIN_PASSWORD_LENGTH,
        MAX_PASSWORD_LENGTH,
    )
    .passwords_match("password", &params.password, &params.password_confirmation);

    if form.is_valid() {
        Ok(())
    } else {
        Err(AppError::Validation(form.into_errors()))
    }
}

/// Validates a sign-in form.
pub fn validate_sign_in(params: &SignInParams) -> Result<()> {
    let mut form = Form::new();
    form.required(&[
        ("email", params.email.as_str()),
        ("password", params.password.as_str()),
    ])
    .email("email", &params.email);

    if form.is_valid() {
        Ok(())
    } else {
        Err(AppError::Validation(form.into_errors()))
    }
}
