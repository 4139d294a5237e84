use super::{store::PostsCache, store::PostsCacheStats, types::*};
use crate::error::ContentError;
use crate::pagination::{self, PaginationState};
use crate::render;
use crate::source::{Cursor, DynContentSource, Predicate, QueryOptions, QueryPage};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Builds the served list and detail pages from a content source.
///
/// Cached pages go through the [`PostsCache`] it was constructed with.
/// "Load more" continuations always hit the source.
pub struct PageAssembler {
    config: PostsConfig,
    source: DynContentSource,
    cache: Arc<PostsCache>,
    prebuilt: Arc<RwLock<HashSet<String>>>,
}

impl PageAssembler {
    pub fn new(config: PostsConfig, source: DynContentSource, cache: Arc<PostsCache>) -> Self {
        Self {
            config,
            source,
            cache,
            prebuilt: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn get_config(&self) -> &PostsConfig {
        &self.config
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// The first list page for `page_size`, served through the list cache.
    pub async fn get_list_page(
        &self,
        page_size: usize,
    ) -> Result<Arc<PaginationState>, ContentError> {
        let page_size = page_size.max(1);
        let source = self.source.clone();
        let document_type = self.config.document_type.clone();

        self.cache
            .lists
            .get(page_size, move || async move {
                let page = source
                    .query(
                        &[Predicate::document_type(&document_type)],
                        QueryOptions::first_page(page_size),
                    )
                    .await?;
                debug!(
                    "Built list page of {} posts (more: {})",
                    page.results.len(),
                    page.next_cursor.is_some()
                );
                PaginationState::from_page(page).map(Arc::new)
            })
            .await
    }

    /// Fetches the page after `cursor` with the configured page size.
    pub async fn load_more(&self, cursor: Cursor) -> Result<PaginationState, ContentError> {
        self.load_more_with(cursor, self.config.page_size).await
    }

    /// Fetches the page after `cursor` live from the source. The result is a
    /// fragment to be merged into the caller's own state.
    pub async fn load_more_with(
        &self,
        cursor: Cursor,
        page_size: usize,
    ) -> Result<PaginationState, ContentError> {
        let page = self.fetch_after(cursor, page_size).await?;
        PaginationState::from_page(page)
    }

    /// Extends `state` with the next page, or returns it unchanged when it has
    /// no cursor. On failure `state` is left as it was.
    pub async fn load_more_into(
        &self,
        state: &PaginationState,
    ) -> Result<PaginationState, ContentError> {
        let Some(cursor) = state.cursor.clone() else {
            return Ok(state.clone());
        };

        let page = self.fetch_after(cursor, self.config.page_size).await?;
        pagination::merge(state, page)
    }

    async fn fetch_after(&self, cursor: Cursor, page_size: usize) -> Result<QueryPage, ContentError> {
        debug!("Loading more posts after cursor {}", cursor);
        self.source
            .query(
                &[Predicate::document_type(&self.config.document_type)],
                QueryOptions {
                    page_size: page_size.max(1),
                    cursor: Some(cursor),
                },
            )
            .await
    }

    /// The rendered detail page for `uid`, served through the post cache.
    ///
    /// A uid outside the prebuilt set is fetched on demand unless fallback is
    /// disabled, in which case it is `NotFound`.
    pub async fn get_post(&self, uid: &str) -> Result<Arc<RenderedPost>, ContentError> {
        if self.config.fallback == FallbackMode::Disabled && !self.is_prebuilt(uid).await {
            debug!("Post {} is not prebuilt and fallback is disabled", uid);
            return Err(ContentError::NotFound(uid.to_string()));
        }

        let source = self.source.clone();
        let document_type = self.config.document_type.clone();
        let words_per_minute = self.config.words_per_minute;
        let key = uid.to_string();

        let post = self
            .cache
            .posts
            .get(key.clone(), move || async move {
                let detail = source.get_by_uid(&document_type, &key).await?;
                Ok::<_, ContentError>(Arc::new(render_post(detail, words_per_minute)))
            })
            .await?;

        let mut prebuilt = self.prebuilt.write().await;
        if prebuilt.insert(uid.to_string()) {
            info!("Post {} built on demand", uid);
        }

        Ok(post)
    }

    /// Renders the first `prerender_count` posts into the cache and records
    /// them as prebuilt. Returns how many were built.
    ///
    /// Only the listing query can fail; a post that fails to build is logged
    /// and skipped.
    pub async fn prebuild(&self) -> Result<usize, ContentError> {
        if self.config.prerender_count == 0 {
            return Ok(0);
        }

        let page = self
            .source
            .query(
                &[Predicate::document_type(&self.config.document_type)],
                QueryOptions::first_page(self.config.prerender_count),
            )
            .await?;

        let uids: Vec<String> = page
            .results
            .into_iter()
            .take(self.config.prerender_count)
            .map(|summary| summary.id)
            .collect();

        self.prebuilt.write().await.extend(uids.iter().cloned());

        let mut built = 0;
        for uid in &uids {
            match self.get_post(uid).await {
                Ok(_) => {
                    debug!("Prebuilt post: {}", uid);
                    built += 1;
                }
                Err(e) => {
                    warn!("Failed to prebuild post {}: {}", uid, e);
                }
            }
        }

        info!("Prebuilt {} of {} posts", built, uids.len());
        Ok(built)
    }

    pub async fn is_prebuilt(&self, uid: &str) -> bool {
        self.prebuilt.read().await.contains(uid)
    }

    pub async fn prebuilt_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.prebuilt.read().await.iter().cloned().collect();
        paths.sort();
        paths
    }

    /// Drops the cached detail page for `uid`; the next request rebuilds it.
    pub async fn invalidate_post(&self, uid: &str) -> bool {
        self.cache.posts.invalidate(&uid.to_string()).await
    }

    pub async fn invalidate_lists(&self) -> usize {
        self.cache.lists.invalidate_all().await
    }

    pub async fn stats(&self) -> PostsCacheStats {
        self.cache.stats().await
    }
}

/// Renders a fetched post into its cached form.
pub fn render_post(detail: PostDetail, words_per_minute: u32) -> RenderedPost {
    let reading_time_minutes = render::estimate_minutes_at(&detail.content, words_per_minute);
    let sections = render::render_sections(&detail.content);

    RenderedPost {
        id: detail.id,
        published_at: detail.published_at,
        title: detail.title,
        subtitle: detail.subtitle,
        author: detail.author,
        banner_url: detail.banner_url,
        reading_time_minutes,
        sections,
    }
}
