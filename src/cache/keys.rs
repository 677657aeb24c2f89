//! Cache key derivation.
//!
//! Listing keys are built from labeled segments in a fixed order so that two
//! equivalent queries always land on the same entry:
//!
//! ```text
//! posts:list[:cat:{id}][:pub:{bool}][:search:{term}]:limit:{n}:offset:{n}
//! ```

use std::fmt::Write as _;

use crate::application::listing::PostListParams;

pub const POST_LIST_PREFIX: &str = "posts:list";
pub const POST_LIST_PATTERN: &str = "posts:list:*";
pub const POST_PATTERN: &str = "post:*";
pub const CATEGORIES_ALL_KEY: &str = "categories:all";
pub const CATEGORIES_PATTERN: &str = "categories:*";

/// Key for one page of a filtered listing.
pub fn post_list_key(params: &PostListParams) -> String {
    let mut key = String::from(POST_LIST_PREFIX);
    if let Some(category_id) = params.category_id {
        let _ = write!(key, ":cat:{category_id}");
    }
    if let Some(published) = params.published {
        let _ = write!(key, ":pub:{published}");
    }
    if let Some(search) = params.search.as_deref().filter(|term| !term.is_empty()) {
        let _ = write!(key, ":search:{search}");
    }
    let _ = write!(key, ":limit:{}:offset:{}", params.limit, params.offset);
    key
}

/// Key for a single post looked up by slug.
pub fn post_key(slug: &str) -> String {
    format!("post:{slug}")
}

/// Glob match supporting `*` (any run, including empty) and `?` (one char),
/// the subset of Redis `MATCH` syntax the invalidation patterns use.
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, k));
                p += 1;
            }
            Some('?') => {
                p += 1;
                k += 1;
            }
            Some(&ch) if ch == key[k] => {
                p += 1;
                k += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    k = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|ch| *ch == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PostListParams {
        PostListParams {
            category_id: None,
            published: None,
            search: None,
            limit: 20,
            offset: 0,
        }
    }

    #[test]
    fn bare_listing_key_carries_only_window() {
        assert_eq!(post_list_key(&params()), "posts:list:limit:20:offset:0");
    }

    #[test]
    fn segments_follow_fixed_order() {
        let key = post_list_key(&PostListParams {
            category_id: Some(3),
            published: Some(true),
            search: Some("rust".to_string()),
            limit: 10,
            offset: 30,
        });
        assert_eq!(
            key,
            "posts:list:cat:3:pub:true:search:rust:limit:10:offset:30"
        );
    }

    #[test]
    fn distinct_parameters_give_distinct_keys() {
        let variants = [
            params(),
            PostListParams {
                category_id: Some(1),
                ..params()
            },
            PostListParams {
                published: Some(false),
                ..params()
            },
            PostListParams {
                published: Some(true),
                ..params()
            },
            PostListParams {
                search: Some("a".to_string()),
                ..params()
            },
            PostListParams {
                limit: 21,
                ..params()
            },
            PostListParams {
                offset: 20,
                ..params()
            },
        ];
        let keys: std::collections::HashSet<String> = variants.iter().map(post_list_key).collect();
        assert_eq!(keys.len(), variants.len());
        assert_eq!(post_list_key(&params()), post_list_key(&params()));
    }

    #[test]
    fn empty_search_is_omitted() {
        let key = post_list_key(&PostListParams {
            search: Some(String::new()),
            ..params()
        });
        assert_eq!(key, post_list_key(&params()));
    }

    #[test]
    fn invalidation_patterns_do_not_overlap() {
        let listing = post_list_key(&params());
        let single = post_key("hello-world");

        assert!(pattern_matches(POST_LIST_PATTERN, &listing));
        assert!(!pattern_matches(POST_LIST_PATTERN, &single));
        assert!(pattern_matches(POST_PATTERN, &single));
        assert!(!pattern_matches(POST_PATTERN, &listing));
        assert!(pattern_matches(CATEGORIES_PATTERN, CATEGORIES_ALL_KEY));
    }

    #[test]
    fn glob_handles_inner_wildcards() {
        assert!(pattern_matches("posts:*:offset:0", "posts:list:limit:20:offset:0"));
        assert!(!pattern_matches("posts:*:offset:0", "posts:list:limit:20:offset:20"));
        assert!(pattern_matches("post:?", "post:a"));
        assert!(!pattern_matches("post:?", "post:ab"));
        assert!(pattern_matches("*", ""));
        assert!(!pattern_matches("", "x"));
    }
}
