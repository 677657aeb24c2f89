use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::{
    error::ErrorReport, repos::StoreHealth, sitemap::SitemapService,
    syndication::SyndicationService,
};

use super::{RouterState, db_health_response};

const XML_CONTENT_TYPE: &str = "application/xml";
const FEED_CACHE_CONTROL: &str = "public, s-maxage=3600, stale-while-revalidate=86400";

#[derive(Clone)]
pub struct HttpState {
    pub syndication: Arc<SyndicationService>,
    pub sitemap: Arc<SitemapService>,
    pub health: Arc<dyn StoreHealth>,
}

pub fn build_router(state: RouterState) -> Router<RouterState> {
    Router::new()
        .route("/feed.xml", get(rss_feed))
        .route("/sitemap.xml", get(sitemap))
        .route("/_health/db", get(public_health))
        .with_state(state)
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn sitemap(State(state): State<HttpState>) -> Response {
    xml_response(StatusCode::OK, state.sitemap.sitemap_xml().await)
}

async fn rss_feed(State(state): State<HttpState>) -> Response {
    match state.syndication.rss_feed().await {
        Ok(body) => {
            let mut response = xml_response(StatusCode::OK, body);
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static(FEED_CACHE_CONTROL));
            response
        }
        Err(err) => {
            let mut response = xml_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                state.syndication.unavailable_feed(),
            );
            ErrorReport::from_error(
                "infra::http::public::rss",
                StatusCode::INTERNAL_SERVER_ERROR,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Only a successful feed is cacheable downstream.
fn xml_response(status: StatusCode, body: String) -> Response {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, XML_CONTENT_TYPE)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::application::listing::{PageWindow, PostFilter};
    use crate::application::repos::{PostsRepo, RepoError};
    use crate::domain::entities::{CategoryRecord, PostRecord};
    use crate::infra::memory::InMemoryRepositories;

    struct DownPosts;

    #[async_trait]
    impl PostsRepo for DownPosts {
        async fn post_ids_for_category(&self, _category_id: i64) -> Result<Vec<i64>, RepoError> {
            Err(RepoError::Timeout)
        }

        async fn count_posts(&self, _filter: &PostFilter) -> Result<u64, RepoError> {
            Err(RepoError::Timeout)
        }

        async fn list_posts(
            &self,
            _filter: &PostFilter,
            _window: PageWindow,
        ) -> Result<Vec<PostRecord>, RepoError> {
            Err(RepoError::Timeout)
        }

        async fn find_post_by_slug(&self, _slug: &str) -> Result<Option<PostRecord>, RepoError> {
            Err(RepoError::Timeout)
        }

        async fn find_post_by_id(&self, _id: i64) -> Result<Option<PostRecord>, RepoError> {
            Err(RepoError::Timeout)
        }

        async fn categories_for_post(
            &self,
            _post_id: i64,
        ) -> Result<Vec<CategoryRecord>, RepoError> {
            Err(RepoError::Timeout)
        }

        async fn categories_for_posts(
            &self,
            _post_ids: &[i64],
        ) -> Result<Vec<(i64, CategoryRecord)>, RepoError> {
            Err(RepoError::Timeout)
        }

        async fn list_posts_in_category(
            &self,
            _category_id: i64,
            _limit: Option<u32>,
        ) -> Result<Vec<PostRecord>, RepoError> {
            Err(RepoError::Timeout)
        }
    }

    fn state(posts: Arc<dyn PostsRepo>) -> HttpState {
        HttpState {
            syndication: Arc::new(SyndicationService::new(posts.clone(), "https://bloghub.test")),
            sitemap: Arc::new(SitemapService::new(posts, "https://bloghub.test")),
            health: Arc::new(InMemoryRepositories::new()),
        }
    }

    #[tokio::test]
    async fn degraded_feed_is_not_cacheable() {
        let response = rss_feed(State(state(Arc::new(DownPosts)))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONTENT_TYPE], XML_CONTENT_TYPE);
        assert!(response.headers().get(CACHE_CONTROL).is_none());
    }

    #[tokio::test]
    async fn healthy_feed_is_cacheable_and_sitemap_is_not() {
        let state = state(Arc::new(InMemoryRepositories::new()));

        let feed = rss_feed(State(state.clone())).await;
        assert_eq!(feed.status(), StatusCode::OK);
        assert_eq!(feed.headers()[CACHE_CONTROL], FEED_CACHE_CONTROL);

        let site_map = sitemap(State(state)).await;
        assert_eq!(site_map.status(), StatusCode::OK);
        assert!(site_map.headers().get(CACHE_CONTROL).is_none());
    }
}
