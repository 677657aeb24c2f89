//! BlogHub: a blogging backend with cached post and category listings,
//! RSS and sitemap syndication, and sliding-window API rate limiting.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
