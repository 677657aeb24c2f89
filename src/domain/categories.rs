//! Category field constraints.

use super::error::DomainError;

pub const NAME_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

pub fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("name", "Name is required"));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(DomainError::validation("name", "Name too long"));
    }
    Ok(())
}

pub fn validate_description(description: Option<&str>) -> Result<(), DomainError> {
    match description {
        Some(text) if text.chars().count() > DESCRIPTION_MAX_CHARS => Err(
            DomainError::validation("description", "Description too long"),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_must_be_present_and_bounded() {
        assert!(validate_name("Rust").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(NAME_MAX_CHARS + 1)).is_err());
    }

    #[test]
    fn description_is_optional_but_bounded() {
        assert!(validate_description(None).is_ok());
        assert!(validate_description(Some("")).is_ok());
        assert!(validate_description(Some(&"x".repeat(DESCRIPTION_MAX_CHARS))).is_ok());
        assert!(validate_description(Some(&"x".repeat(DESCRIPTION_MAX_CHARS + 1))).is_err());
    }
}
