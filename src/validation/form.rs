use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$",
    )
    .expect("email regex is valid")
});

/// Field name to the list of messages for that field.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Accumulates field errors for one submitted form.
#[derive(Debug, Default)]
pub struct Form {
    errors: FieldErrors,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each `(field, value)` must be non-blank.
    pub fn required(&mut self, fields: &[(&str, &str)]) -> &mut Self {
        for (field, value) in fields {
            if value.trim().is_empty() {
                self.errors.add(field, "This field is required.");
            }
        }
        self
    }

    /// Only reported when both values are present; blanks are `required`'s job.
    pub fn passwords_match(
        &mut self,
        field: &str,
        password: &str,
        confirmation: &str,
    ) -> &mut Self {
        if !password.is_empty() && !confirmation.is_empty() && password != confirmation {
            self.errors.add(field, "Passwords do not match.");
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.trim().is_empty() && !is_valid_email(value) {
            self.errors.add(field, "Email is not a valid email address.");
        }
        self
    }

    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.chars().count();
        if len > 0 && (len < min || len > max) {
            self.errors.add(
                field,
                format!("Must be between {} and {} characters long.", min, max),
            );
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}
