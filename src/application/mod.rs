//! Application services: listing, post and category use cases, syndication.

pub mod categories;
pub mod error;
pub mod listing;
pub mod posts;
pub mod repos;
pub mod sitemap;
pub mod syndication;
