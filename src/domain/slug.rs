//! Slug derivation shared by posts and categories.
//!
//! A slug is the lowercase form of a human-readable name where every run of
//! non-alphanumeric characters becomes a single hyphen and edge hyphens are
//! dropped. Non-ASCII letters are transliterated by the `slug` crate first, so
//! "Crème brûlée" becomes `creme-brulee`.

use slug::slugify;
use thiserror::Error;

/// Errors that can occur while generating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Returns true when `value` already has slug shape (`[a-z0-9]+(-[a-z0-9]+)*`).
pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.contains("--")
        && value
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        assert_eq!(derive_slug("Hello World").expect("slug"), "hello-world");
    }

    #[test]
    fn derive_slug_strips_punctuation_runs() {
        let slug = derive_slug("C++ vs Rust: Which is Better?").expect("slug");
        assert!(is_slug(&slug), "unexpected slug `{slug}`");
        for forbidden in [' ', ':', '?', '+'] {
            assert!(!slug.contains(forbidden));
        }
        assert_eq!(slug, "c-vs-rust-which-is-better");
    }

    #[test]
    fn derive_slug_trims_edge_separators() {
        assert_eq!(derive_slug("  --Rust!!  ").expect("slug"), "rust");
    }

    #[test]
    fn derive_slug_transliterates_accents() {
        assert_eq!(derive_slug("Crème brûlée").expect("slug"), "creme-brulee");
    }

    #[test]
    fn derive_slug_rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn derive_slug_rejects_symbol_only_input() {
        assert!(matches!(
            derive_slug("?!"),
            Err(SlugError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn is_slug_rejects_malformed_values() {
        assert!(is_slug("a-b-1"));
        assert!(!is_slug("A-b"));
        assert!(!is_slug("a--b"));
        assert!(!is_slug("-a"));
        assert!(!is_slug(""));
    }
}
