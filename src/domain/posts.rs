//! Post field constraints.

use super::error::DomainError;

pub const TITLE_MAX_CHARS: usize = 255;

pub fn validate_title(title: &str) -> Result<(), DomainError> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("title", "Title is required"));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(DomainError::validation("title", "Title too long"));
    }
    Ok(())
}

pub fn validate_content(content: &str) -> Result<(), DomainError> {
    if content.trim().is_empty() {
        return Err(DomainError::validation("content", "Content is required"));
    }
    Ok(())
}

pub fn validate_id(field: &'static str, id: i64) -> Result<(), DomainError> {
    if id <= 0 {
        return Err(DomainError::validation(field, "must be a positive integer"));
    }
    Ok(())
}

/// Every category id must be positive. Duplicates are removed, first occurrence wins.
pub fn normalize_category_ids(ids: &[i64]) -> Result<Vec<i64>, DomainError> {
    let mut normalized = Vec::with_capacity(ids.len());
    for &id in ids {
        validate_id("categoryIds", id)?;
        if !normalized.contains(&id) {
            normalized.push(id);
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_bounds_are_counted_in_characters() {
        assert!(validate_title("a").is_ok());
        assert!(validate_title(&"é".repeat(TITLE_MAX_CHARS)).is_ok());
        assert!(validate_title(&"a".repeat(TITLE_MAX_CHARS + 1)).is_err());
        assert_eq!(
            validate_title("  ").map_err(|err| err.field()),
            Err("title")
        );
    }

    #[test]
    fn content_must_not_be_blank() {
        assert!(validate_content("# heading").is_ok());
        assert!(validate_content("\n\t").is_err());
    }

    #[test]
    fn category_ids_are_deduplicated_and_checked() {
        assert_eq!(normalize_category_ids(&[3, 1, 3]).expect("ids"), vec![3, 1]);
        assert!(normalize_category_ids(&[1, 0]).is_err());
        assert!(normalize_category_ids(&[-4]).is_err());
    }
}
