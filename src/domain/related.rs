//! Content-similarity ranking for "related posts".
//!
//! Scores are additive:
//! - sharing at least one category adds 10;
//! - every title word longer than 3 characters that also appears in the
//!   other title adds 2;
//! - every word longer than 4 characters from the first 500 characters of
//!   content that also appears in the other post's opening adds 0.5.

use std::cmp::Ordering;

use super::entities::{PostRecord, PostWithCategories};

const CATEGORY_MATCH_SCORE: f64 = 10.0;
const TITLE_WORD_SCORE: f64 = 2.0;
const CONTENT_WORD_SCORE: f64 = 0.5;
const TITLE_WORD_MIN_CHARS: usize = 3;
const CONTENT_WORD_MIN_CHARS: usize = 4;
const CONTENT_PREFIX_CHARS: usize = 500;

pub const DEFAULT_RELATED_LIMIT: usize = 3;

pub fn similarity(current: &PostWithCategories, other: &PostWithCategories) -> f64 {
    let mut score = 0.0;

    let shares_category = current
        .categories
        .iter()
        .any(|a| other.categories.iter().any(|b| a.id == b.id));
    if shares_category {
        score += CATEGORY_MATCH_SCORE;
    }

    let title_a = lowercase_words(&current.post.title);
    let title_b = lowercase_words(&other.post.title);
    score += common_words(&title_a, &title_b, TITLE_WORD_MIN_CHARS) as f64 * TITLE_WORD_SCORE;

    let content_a = lowercase_words(&content_prefix(&current.post.content));
    let content_b = lowercase_words(&content_prefix(&other.post.content));
    score +=
        common_words(&content_a, &content_b, CONTENT_WORD_MIN_CHARS) as f64 * CONTENT_WORD_SCORE;

    score
}

/// Rank published candidates other than `current` by similarity, highest first.
///
/// Equal scores keep the candidates' incoming order.
pub fn rank_related(
    current: &PostWithCategories,
    candidates: Vec<PostWithCategories>,
    limit: usize,
) -> Vec<PostRecord> {
    let mut scored: Vec<(f64, PostWithCategories)> = candidates
        .into_iter()
        .filter(|candidate| candidate.post.id != current.post.id && candidate.post.published)
        .map(|candidate| (similarity(current, &candidate), candidate))
        .collect();

    scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    scored
        .into_iter()
        .take(limit)
        .map(|(_, candidate)| candidate.post)
        .collect()
}

fn content_prefix(content: &str) -> String {
    content.chars().take(CONTENT_PREFIX_CHARS).collect()
}

fn lowercase_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

// Repeated words on the left count once per occurrence.
fn common_words(left: &[String], right: &[String], min_chars: usize) -> usize {
    left.iter()
        .filter(|word| word.chars().count() > min_chars && right.contains(word))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CategoryRecord;
    use time::macros::datetime;

    fn post(id: i64, title: &str, content: &str, published: bool, cats: &[i64]) -> PostWithCategories {
        let at = datetime!(2024-01-01 00:00 UTC);
        PostWithCategories {
            post: PostRecord {
                id,
                title: title.to_string(),
                content: content.to_string(),
                slug: format!("post-{id}"),
                published,
                created_at: at,
                updated_at: at,
            },
            categories: cats
                .iter()
                .map(|&cid| CategoryRecord {
                    id: cid,
                    name: format!("Category {cid}"),
                    description: None,
                    slug: format!("category-{cid}"),
                    created_at: at,
                    updated_at: at,
                })
                .collect(),
        }
    }

    #[test]
    fn shared_category_dominates_score() {
        let current = post(1, "Async Rust", "tokio", true, &[5]);
        let same_cat = post(2, "Gardening", "soil", true, &[5]);
        let other_cat = post(3, "Gardening", "soil", true, &[6]);
        assert_eq!(similarity(&current, &same_cat), 10.0);
        assert_eq!(similarity(&current, &other_cat), 0.0);
    }

    #[test]
    fn short_title_words_are_ignored() {
        let current = post(1, "Rust for the Web", "", true, &[]);
        let other = post(2, "The Rust Web Book", "", true, &[]);
        // only "rust" (4 chars) qualifies; "the", "web", "for" are too short
        assert_eq!(similarity(&current, &other), 2.0);
    }

    #[test]
    fn content_words_score_half_point() {
        let current = post(1, "A", "ownership borrowing lifetimes", true, &[]);
        let other = post(2, "B", "borrowing and lifetimes explained", true, &[]);
        assert_eq!(similarity(&current, &other), 1.0);
    }

    #[test]
    fn rank_excludes_self_and_drafts_and_respects_limit() {
        let current = post(1, "Async Rust Patterns", "", true, &[1]);
        let candidates = vec![
            post(1, "Async Rust Patterns", "", true, &[1]),
            post(2, "Unrelated", "", true, &[]),
            post(3, "Rust Patterns", "", true, &[1]),
            post(4, "Async Rust Patterns draft", "", false, &[1]),
            post(5, "Async Rust", "", true, &[]),
        ];

        let ranked: Vec<i64> = rank_related(&current, candidates, 2)
            .into_iter()
            .map(|p| p.id)
            .collect();

        assert_eq!(ranked, vec![3, 5]);
    }
}
