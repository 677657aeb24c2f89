use thiserror::Error;

use super::slug::SlugError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("`{field}` is invalid: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error(transparent)]
    Slug(#[from] SlugError),
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Name of the offending input, when the error is tied to one.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Validation { field, .. } => field,
            Self::Slug(_) => "slug",
        }
    }
}
