//! RSS 2.0 feed of recently published posts.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;

use crate::application::listing::{PageWindow, PostFilter};
use crate::application::repos::{PostsRepo, RepoError};

pub const FEED_ITEM_LIMIT: u32 = 50;
const DESCRIPTION_CHARS: usize = 200;
const CHANNEL_TITLE: &str = "BlogHub - Modern Blogging Platform";
const CHANNEL_DESCRIPTION: &str =
    "Professional blogging platform with markdown support and real-time previews";

#[derive(Debug, Error)]
pub enum SyndicationError {
    #[error("failed to list posts: {0}")]
    Posts(#[from] RepoError),
}

#[derive(Clone)]
pub struct SyndicationService {
    posts: Arc<dyn PostsRepo>,
    site_url: String,
}

impl SyndicationService {
    pub fn new(posts: Arc<dyn PostsRepo>, site_url: impl Into<String>) -> Self {
        Self {
            posts,
            site_url: site_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Up to [`FEED_ITEM_LIMIT`] published posts, newest first.
    pub async fn rss_feed(&self) -> Result<String, SyndicationError> {
        let filter = PostFilter::builder().published(Some(true)).build();
        let posts = self
            .posts
            .list_posts(&filter, PageWindow::first(FEED_ITEM_LIMIT))
            .await?;

        let now = OffsetDateTime::now_utc();
        let build_date = rfc2822(now);
        let base = &self.site_url;

        let mut items = String::new();
        for post in posts {
            let link = format!("{base}/blog/{}", post.slug);
            items.push_str(&format!(
                "    <item>\n      <title>{}</title>\n      <link>{}</link>\n      <guid isPermaLink=\"true\">{}</guid>\n      <description>{}</description>\n      <pubDate>{}</pubDate>\n    </item>\n",
                cdata(&post.title),
                xml_escape(&link),
                xml_escape(&link),
                cdata(&format!("{}...", summarize(&post.content))),
                rfc2822(post.created_at),
            ));
        }

        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\">\n  <channel>\n    <title>{}</title>\n    <link>{}</link>\n    <description>{}</description>\n    <language>en-us</language>\n    <lastBuildDate>{}</lastBuildDate>\n    <atom:link href=\"{}/feed.xml\" rel=\"self\" type=\"application/rss+xml\"/>\n{}  </channel>\n</rss>\n",
            CHANNEL_TITLE,
            xml_escape(base),
            CHANNEL_DESCRIPTION,
            build_date,
            xml_escape(base),
            items
        ))
    }

    /// Served with a 500 when the store cannot be read.
    pub fn unavailable_feed(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n  <channel>\n    <title>BlogHub</title>\n    <link>{}</link>\n    <description>Blog feed temporarily unavailable</description>\n  </channel>\n</rss>\n",
            xml_escape(&self.site_url)
        )
    }
}

fn rfc2822(at: OffsetDateTime) -> String {
    at.format(&Rfc2822).unwrap_or_else(|_| at.to_string())
}

/// First characters of the body with markup tags removed.
fn summarize(content: &str) -> String {
    let prefix: String = content.chars().take(DESCRIPTION_CHARS).collect();
    strip_tags(&prefix)
}

fn strip_tags(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        output.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    output.push_str(rest);
    output
}

/// CDATA section; an embedded terminator is split across two sections.
fn cdata(input: &str) -> String {
    format!("<![CDATA[{}]]>", input.replace("]]>", "]]]]><![CDATA[>"))
}

pub(crate) fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
