//! sitemap.xml generation.

use std::sync::Arc;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::application::listing::{PageWindow, PostFilter};
use crate::application::repos::{PostsRepo, RepoError};
use crate::application::syndication::xml_escape;
use crate::domain::entities::PostRecord;

const POST_BATCH: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFrequency {
    Daily,
    Weekly,
}

impl ChangeFrequency {
    fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

struct StaticRoute {
    path: &'static str,
    changefreq: ChangeFrequency,
    priority: &'static str,
}

const STATIC_ROUTES: &[StaticRoute] = &[
    StaticRoute {
        path: "/",
        changefreq: ChangeFrequency::Daily,
        priority: "1.0",
    },
    StaticRoute {
        path: "/blog",
        changefreq: ChangeFrequency::Daily,
        priority: "0.9",
    },
    StaticRoute {
        path: "/dashboard",
        changefreq: ChangeFrequency::Weekly,
        priority: "0.5",
    },
    StaticRoute {
        path: "/categories",
        changefreq: ChangeFrequency::Weekly,
        priority: "0.6",
    },
];

const POST_CHANGEFREQ: ChangeFrequency = ChangeFrequency::Weekly;
const POST_PRIORITY: &str = "0.8";

#[derive(Clone)]
pub struct SitemapService {
    posts: Arc<dyn PostsRepo>,
    site_url: String,
}

impl SitemapService {
    pub fn new(posts: Arc<dyn PostsRepo>, site_url: impl Into<String>) -> Self {
        Self {
            posts,
            site_url: site_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Never fails: when posts cannot be listed only the static routes are emitted.
    pub async fn sitemap_xml(&self) -> String {
        let now = OffsetDateTime::now_utc();
        let mut entries: Vec<String> = STATIC_ROUTES
            .iter()
            .map(|route| self.entry(route.path, now, route.changefreq, route.priority))
            .collect();

        match self.published_posts().await {
            Ok(posts) => entries.extend(posts.iter().map(|post| {
                self.entry(
                    &format!("/blog/{}", post.slug),
                    post.updated_at,
                    POST_CHANGEFREQ,
                    POST_PRIORITY,
                )
            })),
            Err(err) => warn!(
                target: "bloghub::application::sitemap",
                error = %err,
                "Post store unavailable; sitemap limited to static routes"
            ),
        }

        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
        );
        for entry in entries {
            xml.push_str(&entry);
        }
        xml.push_str("</urlset>\n");
        xml
    }

    async fn published_posts(&self) -> Result<Vec<PostRecord>, RepoError> {
        let filter = PostFilter::builder().published(Some(true)).build();
        let mut window = PageWindow::first(POST_BATCH);
        let mut posts = Vec::new();
        loop {
            let batch = self.posts.list_posts(&filter, window).await?;
            let exhausted = batch.len() < POST_BATCH as usize;
            posts.extend(batch);
            if exhausted {
                return Ok(posts);
            }
            window = window.next();
        }
    }

    fn entry(
        &self,
        path: &str,
        lastmod: OffsetDateTime,
        changefreq: ChangeFrequency,
        priority: &str,
    ) -> String {
        let loc = if path == "/" {
            self.site_url.clone()
        } else {
            format!("{}{path}", self.site_url)
        };
        let lastmod = lastmod
            .format(&Rfc3339)
            .unwrap_or_else(|_| lastmod.to_string());
        format!(
            "  <url><loc>{}</loc><lastmod>{lastmod}</lastmod><changefreq>{}</changefreq><priority>{priority}</priority></url>\n",
            xml_escape(&loc),
            changefreq.as_str(),
        )
    }
}
